//! Quiver Client - typed access to a vector search cluster's management API
//!
//! Covers the endpoints needed to inspect and change shard placement:
//!
//! - `GET /collections` and `GET /collections/{name}`
//! - `GET /collections/{name}/cluster` (shard placement)
//! - `POST /collections/{name}/cluster` (replicate / move shard)
//! - `GET /cluster` (peer table)
//!
//! The [`ClusterApi`] trait is the seam consumed by `quiver-cluster`;
//! [`QuiverClient`] implements it over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod models;

mod client;

pub use api::ClusterApi;
pub use client::QuiverClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use models::*;
