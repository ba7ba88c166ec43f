//! Command dispatch and handlers

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::CommandFactory;
use tracing::{debug, instrument};

use crate::application::services::TreeEvent;
use crate::cli::args::{Cli, Commands, ConfigCommands, ReprCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{ExpansionSet, RepresentationIdentifier, Tree};
use crate::infrastructure::di::{LoadedSource, ServiceContainer};
use crate::infrastructure::InfraError;

/// Execute the CLI command.
pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| InfraError::io("current directory", e))?,
    };

    match &cli.command {
        Some(Commands::Render {
            source,
            target,
            expanded,
            representation,
            ids,
            json,
        }) => {
            let view = View::open(&dir, source.as_deref())?;
            let representation = match representation {
                Some(representation) => representation.clone(),
                None => view.representation_id(target.as_deref(), expanded.iter().cloned())?,
            };
            cmd_render(&view, &representation, *ids, *json)
        }
        Some(Commands::Path {
            source,
            item,
            target,
            show,
        }) => {
            let view = View::open(&dir, source.as_deref())?;
            cmd_path(&view, item, target.as_deref(), *show)
        }
        Some(Commands::Expand {
            source,
            item,
            target,
        }) => {
            let view = View::open(&dir, source.as_deref())?;
            cmd_expand(&view, item, target.as_deref())
        }
        Some(Commands::Repr { command }) => execute_repr(&dir, command),
        Some(Commands::Config { command }) => execute_config(&dir, command),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "treeview", &mut io::stdout());
            Ok(())
        }
        None => {
            Cli::command()
                .print_help()
                .map_err(|e| InfraError::io("print help", e))?;
            Ok(())
        }
    }
}

/// A loaded source together with the services viewing it.
struct View {
    container: ServiceContainer,
    loaded: LoadedSource,
}

impl View {
    fn open(dir: &Path, source: Option<&Path>) -> CliResult<Self> {
        let settings = Settings::load(Some(dir))?;
        let source = resolve_source(source, &settings)?;
        let container = ServiceContainer::new(settings);
        let loaded = container.load_source(&source)?;
        debug!(
            "Loaded {} as '{}' with description {}",
            source.display(),
            loaded.editing_context_id,
            loaded.description_id
        );
        Ok(Self { container, loaded })
    }

    fn editing_context_id(&self) -> &str {
        &self.loaded.editing_context_id
    }

    fn representation_id<I>(&self, target: Option<&str>, expanded: I) -> CliResult<String>
    where
        I: IntoIterator<Item = String>,
    {
        let target = target.unwrap_or(&self.loaded.editing_context_id);
        Ok(self.container.tree_service.representation_id(
            &self.loaded.description_id,
            target,
            ExpansionSet::new().merged(expanded),
        ))
    }

    fn title(&self, representation_id: &str) -> CliResult<String> {
        let info = self.container.tree_service.get_description(
            self.editing_context_id(),
            representation_id,
            None,
        )?;
        let description = self.container.registry.get(&info.tree_description_id)?;
        Ok(format!("{} ({})", description.name(), self.editing_context_id()))
    }

    /// First snapshot of a live subscription.
    fn snapshot(&self, representation_id: &str) -> CliResult<Arc<Tree>> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| InfraError::io("start runtime", e))?;
        let tree_service = &self.container.tree_service;
        let editing_context_id = self.editing_context_id();

        runtime.block_on(async {
            let mut subscription = tree_service.subscribe(editing_context_id, representation_id)?;
            match subscription.next().await {
                Some(TreeEvent::Refreshed(tree)) => Ok(tree),
                Some(TreeEvent::Terminated { reason }) => Err(CliError::Terminated(reason)),
                None => Err(CliError::Terminated("session closed".to_string())),
            }
        })
    }
}

fn resolve_source(source: Option<&Path>, settings: &Settings) -> CliResult<PathBuf> {
    source
        .map(Path::to_path_buf)
        .or_else(|| settings.document.clone())
        .ok_or_else(|| {
            CliError::Usage(
                "no source given and no `document` configured (see `treeview config path`)"
                    .to_string(),
            )
        })
}

#[instrument(skip(view))]
fn cmd_render(view: &View, representation_id: &str, show_ids: bool, json: bool) -> CliResult<()> {
    let tree = view.snapshot(representation_id)?;
    if json {
        let rendered = serde_json::to_string_pretty(tree.as_ref())
            .map_err(|e| CliError::InvalidArgs(format!("cannot serialize tree: {e}")))?;
        output::info(&rendered);
        return Ok(());
    }
    let title = view.title(representation_id)?;
    output::info(&output::render_tree(&title, &tree, show_ids));
    Ok(())
}

#[instrument(skip(view))]
fn cmd_path(view: &View, item: &str, target: Option<&str>, show: bool) -> CliResult<()> {
    let representation_id = view.representation_id(target, std::iter::empty())?;
    let path = view.container.tree_service.expand_all_path(
        view.editing_context_id(),
        &representation_id,
        item,
    )?;
    if path.is_empty() {
        output::warning(&format!("no path to {item}"));
    }
    if !show {
        for id in &path {
            output::info(id);
        }
        return Ok(());
    }

    let revealed = view.representation_id(target, path)?;
    cmd_render(view, &revealed, true, false)
}

#[instrument(skip(view))]
fn cmd_expand(view: &View, item: &str, target: Option<&str>) -> CliResult<()> {
    let representation_id = view.representation_id(target, std::iter::empty())?;
    let ids = view.container.tree_service.expand_subtree(
        view.editing_context_id(),
        &representation_id,
        item,
    )?;
    for id in &ids {
        output::info(id);
    }
    Ok(())
}

fn execute_repr(dir: &Path, command: &ReprCommands) -> CliResult<()> {
    match command {
        ReprCommands::Encode {
            description,
            target,
            expanded,
        } => {
            let settings = Settings::load(Some(dir))?;
            let representation = RepresentationIdentifier::new(
                description.as_str(),
                target.as_str(),
                ExpansionSet::new().merged(expanded.iter().cloned()),
            );
            output::info(&representation.encode(&settings.scheme));
            Ok(())
        }
        ReprCommands::Decode { representation } => {
            let decoded = RepresentationIdentifier::decode(representation);
            output::field("description", &decoded.description_id);
            output::field("target", &decoded.target_object_id);
            output::field("expanded", &decoded.expanded.len());
            for id in decoded.expanded.iter() {
                output::detail(&id);
            }
            Ok(())
        }
    }
}

fn execute_config(dir: &Path, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(Some(dir))?;
            output::header("Effective configuration");
            output::info(&settings.to_toml()?);
            Ok(())
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::field("global", &path.display()),
                None => output::field("global", "(no config directory)"),
            }
            output::field("local", &local_config_path(dir).display());
            Ok(())
        }
    }
}
