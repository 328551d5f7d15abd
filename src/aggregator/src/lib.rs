//! Aggregator access for the token wallet.
//!
//! [`AggregatorClient`] is the seam the wallet talks through. Two
//! implementations are provided: [`JsonRpcAggregatorClient`] for a remote
//! service and [`InMemoryAggregator`] for local use and tests.

pub mod client;
pub mod errors;
pub mod memory;
pub mod rpc;
pub mod smt;
pub mod types;

pub use client::AggregatorClient;
pub use errors::AggregatorError;
pub use memory::InMemoryAggregator;
pub use rpc::JsonRpcAggregatorClient;
pub use smt::RadixTree;
pub use types::{SubmitCommitmentRequest, SubmitCommitmentResponse, SubmitStatus};
