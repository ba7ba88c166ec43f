//! Application layer: descriptions and services
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod description;
pub mod error;
pub mod error_ext;
pub mod services;

pub use description::{DescriptionRegistry, TreeDescription};
pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::{IoResultExt, ResultExt};
