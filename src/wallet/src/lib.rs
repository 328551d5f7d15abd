//! Wallet-side flows: minting, offline transfer and confirmed submission.
//!
//! Every operation takes its signer, trust anchor and aggregator client as
//! arguments; nothing is held globally.

pub mod config;
pub mod errors;
pub mod identity;
pub mod mint;
pub mod submission;
pub mod transfer;

pub use config::{MinterConfig, RetryPolicy, WalletConfig};
pub use errors::WalletError;
pub use identity::ReceiverIdentity;
pub use mint::{mint_token, prepare_mint, MintRequest};
pub use transfer::{
    finalize, package, prepare, prepare_with, receive, submit, PendingTransfer, TransferOutcome,
    TransferPackage, TransferStatus,
};
