//! Service container for dependency injection
//!
//! Wires up the change feed, the domain model adapters, the description
//! registry and the tree service.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::services::{SubscriptionDispatcher, TreeService};
use crate::application::{ApplicationError, DescriptionRegistry, TreeDescription};
use crate::config::Settings;
use crate::infrastructure::document::load_document;
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::feed::ChangeFeed;
use crate::infrastructure::model::{FileSystemModel, InMemoryModel};
use crate::infrastructure::traits::{FileSystem, RealFileSystem};

/// Editing context and description a loaded source is viewed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub editing_context_id: String,
    pub description_id: String,
}

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    pub feed: ChangeFeed,
    pub memory_model: Arc<InMemoryModel>,
    pub fs_model: Arc<FileSystemModel>,
    pub registry: Arc<DescriptionRegistry>,
    pub tree_service: TreeService,

    explorer_id: String,
    files_id: String,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        let settings = Arc::new(settings);
        let codec = settings.codec();
        let feed = ChangeFeed::new(settings.change_feed_capacity);

        let memory_model = Arc::new(InMemoryModel::new(codec, feed.clone()));
        let fs_model = Arc::new(FileSystemModel::new(Arc::clone(&fs), codec));

        let registry = Arc::new(DescriptionRegistry::new());
        let explorer_id = registry.register(TreeDescription::explorer(memory_model.clone()));
        let files_id = registry.register(TreeDescription::filesystem(fs_model.clone()));

        let dispatcher = SubscriptionDispatcher::new(
            Arc::clone(&registry),
            feed.clone(),
            settings.session.clone(),
        );
        let tree_service = TreeService::new(
            Arc::clone(&registry),
            dispatcher,
            settings.scheme.clone(),
            settings.expand_subtree_max_depth,
        );

        Self {
            settings,
            fs,
            feed,
            memory_model,
            fs_model,
            registry,
            tree_service,
            explorer_id,
            files_id,
        }
    }

    /// Load a TOML document into the in-memory model, or mount a directory.
    #[instrument(level = "debug", skip(self))]
    pub fn load_source(&self, source: &Path) -> InfraResult<LoadedSource> {
        if !self.fs.exists(source) {
            return Err(InfraError::io(
                format!("source not found: {}", source.display()),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }

        if self.fs.is_dir(source) {
            let editing_context_id = source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "root".to_string());
            self.fs_model
                .mount(&editing_context_id, source)
                .map_err(ApplicationError::from)?;
            debug!("Viewing directory {} as '{}'", source.display(), editing_context_id);
            return Ok(LoadedSource {
                editing_context_id,
                description_id: self.files_id.clone(),
            });
        }

        let document = load_document(self.fs.as_ref(), source)?;
        let editing_context_id = document.editing_context.clone();
        self.memory_model.load(document);
        Ok(LoadedSource {
            editing_context_id,
            description_id: self.explorer_id.clone(),
        })
    }
}
