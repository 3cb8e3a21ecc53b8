//! Storage provider implementations.
//!
//! - `local` - filesystem + git working tree
//! - `cloud` - blob store + pending-change ledger overlay

mod cloud;
mod local;

pub use cloud::CloudStorageProvider;
pub use local::LocalStorageProvider;
