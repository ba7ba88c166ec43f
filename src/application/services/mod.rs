//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services reach the domain graph only through the `DomainModel` boundary
//! trait, but are themselves concrete structs, not traits.

pub mod dispatcher;
pub mod materializer;
pub mod path_resolver;
pub mod session;
pub mod tree_service;

pub use dispatcher::SubscriptionDispatcher;
pub use materializer::{materialize, TreeMaterializer};
pub use path_resolver::{expand_subtree, path_to};
pub use session::{SessionKey, Subscription, TreeEvent};
pub use tree_service::{DescriptionInfo, TreeService};
