pub mod cdn;
pub mod client_storage;
pub mod db;

pub use cdn::CloudinaryCdn;
pub use client_storage::{FileClientStorage, MemoryClientStorage};
pub use db::SqliteDocumentStore;
