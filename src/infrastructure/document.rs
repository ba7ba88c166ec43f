//! Loading TOML domain documents from disk

use std::path::Path;

use tracing::{debug, instrument};

use crate::application::IoResultExt;
use crate::domain::{BuiltDocument, DomainError, DomainGraphBuilder};
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::traits::FileSystem;

#[instrument(level = "debug", skip(fs))]
pub fn load_document(fs: &dyn FileSystem, path: &Path) -> InfraResult<BuiltDocument> {
    let source = fs
        .read_to_string(path)
        .with_path_context("read document", path)?;

    let built = DomainGraphBuilder::from_toml(&source).map_err(|e| match e {
        DomainError::InvalidDocument { message } => InfraError::Document {
            path: path.to_path_buf(),
            message,
        },
        other => InfraError::Document {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    })?;

    debug!(
        "Loaded {} objects into '{}'",
        built.graph.len(),
        built.editing_context
    );
    Ok(built)
}
