//! Query contract consumed by a transport layer

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::application::description::{DescriptionRegistry, TreeDescription};
use crate::application::services::dispatcher::SubscriptionDispatcher;
use crate::application::services::materializer::materialize;
use crate::application::services::path_resolver::{expand_subtree, path_to};
use crate::application::services::session::Subscription;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{DomainError, ExpansionSet, RepresentationIdentifier, Tree};

/// Answer of `get_description`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionInfo {
    pub message: String,
    pub tree_description_id: String,
}

pub struct TreeService {
    registry: Arc<DescriptionRegistry>,
    dispatcher: SubscriptionDispatcher,
    scheme: String,
    expand_subtree_max_depth: usize,
}

impl TreeService {
    pub fn new(
        registry: Arc<DescriptionRegistry>,
        dispatcher: SubscriptionDispatcher,
        scheme: impl Into<String>,
        expand_subtree_max_depth: usize,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            scheme: scheme.into(),
            expand_subtree_max_depth,
        }
    }

    pub fn registry(&self) -> &DescriptionRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &SubscriptionDispatcher {
        &self.dispatcher
    }

    fn description_for(&self, representation_id: &str) -> ApplicationResult<(RepresentationIdentifier, Arc<TreeDescription>)> {
        let representation = RepresentationIdentifier::decode(representation_id);
        let description = self.registry.get(&representation.description_id)?;
        Ok((representation, description))
    }

    /// Message and id of the description behind a representation.
    ///
    /// `target_object_id` overrides the root target the identifier names.
    #[instrument(level = "debug", skip(self))]
    pub fn get_description(
        &self,
        editing_context_id: &str,
        representation_id: &str,
        target_object_id: Option<&str>,
    ) -> ApplicationResult<DescriptionInfo> {
        let (representation, description) = self.description_for(representation_id)?;
        let model = description.model();
        if !model.contains_context(editing_context_id) {
            return Err(DomainError::EditingContextNotFound(editing_context_id.to_string()).into());
        }
        let target = target_object_id.unwrap_or(&representation.target_object_id);
        description.check_target(editing_context_id, target)?;
        debug!("Describing '{}' for target '{}'", description.name(), target);
        Ok(DescriptionInfo {
            message: description.message().to_string(),
            tree_description_id: description.id().to_string(),
        })
    }

    /// Live stream of snapshots for a representation.
    pub fn subscribe(&self, editing_context_id: &str, representation_id: &str) -> ApplicationResult<Subscription> {
        let representation = RepresentationIdentifier::decode(representation_id);
        self.dispatcher.subscribe(editing_context_id, representation)
    }

    /// Ancestor ids revealing `tree_item_id`, root-first.
    ///
    /// An unknown or unreachable item yields an empty path.
    #[instrument(level = "debug", skip(self))]
    pub fn expand_all_path(
        &self,
        editing_context_id: &str,
        representation_id: &str,
        tree_item_id: &str,
    ) -> ApplicationResult<Vec<String>> {
        let (representation, description) = self.description_for(representation_id)?;
        let result = path_to(
            &description,
            &representation.target_object_id,
            tree_item_id,
            editing_context_id,
        );
        empty_when_unresolved(result, tree_item_id)
    }

    /// Ids that expand `tree_item_id` and its subtree, bounded by the configured depth.
    #[instrument(level = "debug", skip(self))]
    pub fn expand_subtree(
        &self,
        editing_context_id: &str,
        representation_id: &str,
        tree_item_id: &str,
    ) -> ApplicationResult<Vec<String>> {
        let (representation, description) = self.description_for(representation_id)?;
        let result = expand_subtree(
            &description,
            &representation.target_object_id,
            tree_item_id,
            editing_context_id,
            self.expand_subtree_max_depth,
        );
        empty_when_unresolved(result, tree_item_id)
    }

    /// Ask the live session of a representation to re-materialize.
    pub fn refresh(&self, editing_context_id: &str, representation_id: &str) -> ApplicationResult<()> {
        let representation = RepresentationIdentifier::decode(representation_id);
        self.dispatcher.refresh(editing_context_id, &representation)
    }

    /// One-off snapshot without a session.
    pub fn materialize(&self, editing_context_id: &str, representation_id: &str) -> ApplicationResult<Tree> {
        let (representation, description) = self.description_for(representation_id)?;
        materialize(
            &description,
            &representation.target_object_id,
            &representation.expanded,
            editing_context_id,
        )
    }

    /// Encode a representation identifier with the configured scheme.
    pub fn representation_id(
        &self,
        description_id: &str,
        target_object_id: &str,
        expanded: ExpansionSet,
    ) -> String {
        RepresentationIdentifier::new(description_id, target_object_id, expanded).encode(&self.scheme)
    }
}

fn empty_when_unresolved(result: ApplicationResult<Vec<String>>, tree_item_id: &str) -> ApplicationResult<Vec<String>> {
    match result {
        Err(ApplicationError::Domain(
            e @ (DomainError::UnknownTreeItem(_) | DomainError::UnreachableTarget { .. }),
        )) => {
            warn!("No path to {}: {}", tree_item_id, e);
            Ok(Vec::new())
        }
        other => other,
    }
}
