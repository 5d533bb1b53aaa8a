// Application layer - ledger use cases over the repository.
// Clients (CLI, HTTP handlers, tests) talk to LedgerService only.

pub mod error;
pub mod retry;
pub mod service;

pub use error::*;
pub use retry::{ledger_backoff, with_retry};
pub use service::*;
