pub mod peers;
pub mod rebalance;

pub use peers::{run_is_empty, run_peer, run_peers};
pub use rebalance::{run_drain, run_equalize, run_replicate};
