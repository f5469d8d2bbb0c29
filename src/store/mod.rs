//! Persistence layer — profile documents keyed by user id.

pub mod libsql_backend;
pub mod memory;
pub mod traits;

pub use libsql_backend::LibSqlProfileStore;
pub use memory::MemoryProfileStore;
pub use traits::ProfileStore;
