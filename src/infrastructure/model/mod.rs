//! Concrete `DomainModel` adapters

pub mod filesystem;
pub mod memory;

pub use filesystem::FileSystemModel;
pub use memory::InMemoryModel;
