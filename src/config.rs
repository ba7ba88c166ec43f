//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/treeview/treeview.toml`
//! 3. Local config: `<dir>/.treeview.toml`
//! 4. Environment variables: `TREEVIEW_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::ApplicationError;
use crate::domain::{IdentityCodec, DEFAULT_SCHEME};

pub const ENV_PREFIX: &str = "TREEVIEW";

/// Channel sizes of representation sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionSettings {
    /// Bounded queue of explicit refresh commands per session
    pub command_capacity: usize,
    /// Broadcast buffer per session; slow subscribers skip to the latest
    pub event_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            command_capacity: 32,
            event_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSessionSettings {
    pub command_capacity: Option<usize>,
    pub event_capacity: Option<usize>,
}

/// Raw settings for intermediate parsing.
///
/// `None` means "not specified, inherit from the lower layer".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub scheme: Option<String>,
    pub identity_namespace: Option<Uuid>,
    pub change_feed_capacity: Option<usize>,
    pub expand_subtree_max_depth: Option<usize>,
    pub document: Option<PathBuf>,
    pub session: RawSessionSettings,
}

/// Unified configuration for treeview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// URI scheme of encoded representation identifiers
    pub scheme: String,
    /// Namespace of content-derived ids; compiled default when unset
    pub identity_namespace: Option<Uuid>,
    pub change_feed_capacity: usize,
    /// Levels below the target that `expand` reveals
    pub expand_subtree_max_depth: usize,
    /// Default document or directory to view
    pub document: Option<PathBuf>,
    pub session: SessionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            identity_namespace: None,
            change_feed_capacity: 256,
            expand_subtree_max_depth: 8,
            document: None,
            session: SessionSettings::default(),
        }
    }
}

/// Get the XDG config directory for treeview.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "treeview").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("treeview.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".treeview.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Identity codec for the configured namespace.
    pub fn codec(&self) -> IdentityCodec {
        self.identity_namespace
            .map(IdentityCodec::new)
            .unwrap_or_default()
    }

    /// Expand `~`, `$VAR` and `${VAR}` in path-like fields.
    fn expand_paths(&mut self) {
        if let Some(document) = &self.document {
            let raw = document.to_string_lossy();
            let expanded = shellexpand::full(&raw)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            self.document = Some(PathBuf::from(expanded));
        }
    }

    /// Overlay wins wherever it specifies a value.
    pub fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            scheme: overlay.scheme.clone().unwrap_or_else(|| self.scheme.clone()),
            identity_namespace: overlay.identity_namespace.or(self.identity_namespace),
            change_feed_capacity: overlay
                .change_feed_capacity
                .unwrap_or(self.change_feed_capacity),
            expand_subtree_max_depth: overlay
                .expand_subtree_max_depth
                .unwrap_or(self.expand_subtree_max_depth),
            document: overlay.document.clone().or_else(|| self.document.clone()),
            session: SessionSettings {
                command_capacity: overlay
                    .session
                    .command_capacity
                    .unwrap_or(self.session.command_capacity),
                event_capacity: overlay
                    .session
                    .event_capacity
                    .unwrap_or(self.session.event_capacity),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional directory holding a `.treeview.toml`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;

        Ok(current)
    }

    /// Apply TREEVIEW_* environment variables as explicit overrides.
    fn apply_env_overrides(settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;

        let raw = RawSettings {
            scheme: config.get_string("scheme").ok(),
            identity_namespace: match config.get_string("identity_namespace") {
                Ok(val) => Some(Uuid::parse_str(&val).map_err(|e| ApplicationError::Config {
                    message: format!("identity_namespace: {e}"),
                })?),
                Err(_) => None,
            },
            change_feed_capacity: config.get::<usize>("change_feed_capacity").ok(),
            expand_subtree_max_depth: config.get::<usize>("expand_subtree_max_depth").ok(),
            document: config.get_string("document").ok().map(PathBuf::from),
            session: RawSessionSettings {
                command_capacity: config.get::<usize>("session.command_capacity").ok(),
                event_capacity: config.get::<usize>("session.event_capacity").ok(),
            },
        };

        Ok(settings.merge_with(&raw))
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        let scheme_ok = !self.scheme.is_empty()
            && self
                .scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_ok {
            return Err(ApplicationError::Config {
                message: format!("invalid scheme: '{}'", self.scheme),
            });
        }
        if self.change_feed_capacity == 0
            || self.session.command_capacity == 0
            || self.session.event_capacity == 0
        {
            return Err(ApplicationError::Config {
                message: "channel capacities must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_codec_then_uses_compiled_namespace() {
        let settings = Settings::default();
        assert_eq!(settings.codec(), IdentityCodec::default());
        assert_eq!(settings.scheme, DEFAULT_SCHEME);
    }

    #[test]
    fn given_overlay_when_merge_then_only_specified_fields_change() {
        let base = Settings::default();
        let overlay = RawSettings {
            scheme: Some("view".into()),
            session: RawSessionSettings {
                event_capacity: Some(8),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = base.merge_with(&overlay);

        assert_eq!(merged.scheme, "view");
        assert_eq!(merged.session.event_capacity, 8);
        assert_eq!(merged.session.command_capacity, base.session.command_capacity);
        assert_eq!(merged.change_feed_capacity, base.change_feed_capacity);
    }

    #[test]
    fn given_tilde_in_document_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            document: Some(PathBuf::from("~/model.toml")),
            ..Default::default()
        };

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let document = settings.document.unwrap();
        assert!(document.to_string_lossy().starts_with(&home));
    }

    #[test]
    fn given_invalid_scheme_when_validate_then_config_error() {
        let settings = Settings {
            scheme: "not a scheme".into(),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ApplicationError::Config { .. })
        ));
    }
}
