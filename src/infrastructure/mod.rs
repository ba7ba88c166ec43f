//! Infrastructure layer: I/O implementations and DI container
//!
//! This layer implements I/O boundary traits, the change feed and the
//! domain model adapters, and wires up services.

pub mod di;
pub mod document;
pub mod error;
pub mod feed;
pub mod model;
pub mod traits;

pub use error::{InfraError, InfraResult};
pub use feed::ChangeFeed;
