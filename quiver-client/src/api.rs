use crate::error::Result;
use crate::models::{
    ClusterInfo, ClusterOperation, CollectionClusterInfo, CollectionInfo, UpdateAck,
};
use async_trait::async_trait;

/// Cluster management operations consumed by shard rebalancing
///
/// Implemented by [`crate::QuiverClient`] over HTTP; tests substitute
/// in-memory clusters.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Names of every collection in the cluster
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Collection parameters, used for the configured replication factor
    async fn get_collection_info(&self, collection: &str) -> Result<CollectionInfo>;

    /// Shard placement of a collection as seen by the serving peer
    async fn get_collection_cluster_info(&self, collection: &str)
        -> Result<CollectionClusterInfo>;

    /// Issue a replicate or move command
    ///
    /// A command the server answers with `result: false` comes back as an
    /// [`UpdateAck`] that is not accepted, carrying the envelope status.
    async fn update_collection_cluster_setup(
        &self,
        collection: &str,
        operation: &ClusterOperation,
    ) -> Result<UpdateAck>;

    /// Peer table of the cluster
    async fn get_cluster_info(&self) -> Result<ClusterInfo>;
}

#[async_trait]
impl<T: ClusterApi + ?Sized> ClusterApi for std::sync::Arc<T> {
    async fn list_collections(&self) -> Result<Vec<String>> {
        (**self).list_collections().await
    }

    async fn get_collection_info(&self, collection: &str) -> Result<CollectionInfo> {
        (**self).get_collection_info(collection).await
    }

    async fn get_collection_cluster_info(
        &self,
        collection: &str,
    ) -> Result<CollectionClusterInfo> {
        (**self).get_collection_cluster_info(collection).await
    }

    async fn update_collection_cluster_setup(
        &self,
        collection: &str,
        operation: &ClusterOperation,
    ) -> Result<UpdateAck> {
        (**self)
            .update_collection_cluster_setup(collection, operation)
            .await
    }

    async fn get_cluster_info(&self) -> Result<ClusterInfo> {
        (**self).get_cluster_info().await
    }
}
