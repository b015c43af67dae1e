//! Work-queue backends.

pub mod memory;
pub mod mysql;

pub use memory::InMemoryWorkQueue;
pub use mysql::MySqlWorkQueue;
