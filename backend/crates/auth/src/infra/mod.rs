//! Infrastructure Layer
//!
//! Document store implementations and the repositories built on them.

pub mod document;
pub mod memory;
pub mod postgres;

pub use document::DocumentRepository;
pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;
