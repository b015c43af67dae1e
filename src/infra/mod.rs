//! Infrastructure adapters for the work-queue store.

pub mod queue;

pub use queue::{InMemoryWorkQueue, MySqlWorkQueue};
