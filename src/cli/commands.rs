//! Command dispatch for the `memtree` binary.

use std::path::{Path, PathBuf};

use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::{Source, SourceKind, Tree};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{NodeId, Payload, PathLookup, Snapshot};
use crate::infrastructure::di::ServiceContainer;
use crate::tree_traits::{subtree_to_tree_string, TreeNodeConvert};

/// Loaded record file plus the tree built from it.
struct Session {
    container: ServiceContainer,
    file: PathBuf,
    source: Box<dyn Source>,
    tree: Tree,
}

impl Session {
    fn open(cli: &Cli) -> CliResult<Self> {
        let container = ServiceContainer::new(load_settings(cli.file.as_deref())?);
        let file = container.record_file(cli.file.as_deref());
        let mut source = container.source(SourceKind::Toml, &file)?;
        let tree = container.load_tree(source.as_mut())?;
        debug!(file = %file.display(), nodes = tree.navigator().len(), "session opened");
        Ok(Self {
            container,
            file,
            source,
            tree,
        })
    }

    fn settings(&self) -> &Settings {
        &self.container.settings
    }

    fn view(&self) -> &Snapshot {
        self.tree.navigator()
    }

    fn save(&mut self) -> CliResult<()> {
        self.source.store(&self.tree.records())?;
        debug!(file = %self.file.display(), "records written");
        Ok(())
    }
}

/// Settings for the directory holding `file`.
fn load_settings(file: Option<&Path>) -> CliResult<Settings> {
    let dir = file
        .and_then(Path::parent)
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(Settings::load(Some(dir))?)
}

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Tree { id }) => cmd_tree(cli, *id),
        Some(Commands::Show { id }) => cmd_show(cli, *id),
        Some(Commands::Path { path, start, field }) => cmd_path(cli, path, *start, field.as_deref()),
        Some(Commands::Walk { start, depth }) => cmd_walk(cli, *start, *depth),
        Some(Commands::Children { id, depth }) => cmd_children(cli, *id, *depth),
        Some(Commands::Add {
            name,
            parent,
            after,
            fields,
        }) => cmd_add(cli, name, *parent, *after, fields),
        Some(Commands::Remove { id, recursive }) => cmd_remove(cli, *id, *recursive),
        Some(Commands::Move { ids, parent, after }) => cmd_move(cli, ids, *parent, *after),
        Some(Commands::Rename { id, name }) => cmd_rename(cli, *id, name),
        Some(Commands::Copy { src, dest }) => cmd_copy(cli, *src, *dest),
        Some(Commands::Config { command }) => cmd_config(cli, command),
        None => Ok(()),
    }
}

#[instrument(skip(cli))]
fn cmd_tree(cli: &Cli, id: Option<NodeId>) -> CliResult<()> {
    let session = Session::open(cli)?;
    let rendered = match id {
        Some(id) => subtree_to_tree_string(session.view(), id)?,
        None => session.view().to_tree_string(),
    };
    output::info(&rendered);
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_show(cli: &Cli, id: NodeId) -> CliResult<()> {
    let session = Session::open(cli)?;
    let view = session.view();
    let settings = session.settings();
    let node = view.get(id)?;
    let rel = view.relations(id)?;
    let show = |link: Option<NodeId>| link.map_or_else(|| "-".to_string(), |id| id.to_string());

    output::header(node);
    output::action(
        "path",
        &view.path_string(id, &settings.name_field, &settings.separator)?,
    );
    output::action("level", &rel.level);
    output::action("parent", &show(rel.parent));
    output::action("previous", &show(rel.previous));
    output::action("next", &show(rel.next));
    output::action("children", &rel.children.iter().join(", "));
    for (field, value) in node.payload.iter() {
        output::detail(&format!("{field} = {value}"));
    }
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_path(cli: &Cli, path: &str, start: Option<NodeId>, field: Option<&str>) -> CliResult<()> {
    let session = Session::open(cli)?;
    let mut lookup: PathLookup = session.settings().path_lookup();
    if let Some(start) = start {
        lookup = lookup.starting_at(start);
    }
    if let Some(field) = field {
        lookup = lookup.field(field);
    }
    match session.view().id_by_path_with(path, &lookup)? {
        Some(id) => {
            output::info(&id);
            Ok(())
        }
        None => Err(CliError::InvalidArgs(format!("no node at path '{path}'"))),
    }
}

#[instrument(skip(cli))]
fn cmd_walk(cli: &Cli, start: Option<NodeId>, depth: usize) -> CliResult<()> {
    let session = Session::open(cli)?;
    let view = session.view();
    let base = match start {
        Some(id) => view.level(id)?,
        None => 0,
    };
    let lines = view.walk(start, depth, |node, level| {
        Some(format!("{}{}", "  ".repeat(level - base), node))
    })?;
    for line in lines {
        output::info(&line);
    }
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_children(cli: &Cli, id: NodeId, depth: usize) -> CliResult<()> {
    let session = Session::open(cli)?;
    for node in session.view().children(id, depth)? {
        output::info(node);
    }
    Ok(())
}

#[instrument(skip(cli, fields))]
fn cmd_add(
    cli: &Cli,
    name: &str,
    parent: NodeId,
    after: Option<NodeId>,
    fields: &[(String, String)],
) -> CliResult<()> {
    let mut session = Session::open(cli)?;
    let name_field = session.settings().name_field.clone();
    let payload = fields
        .iter()
        .fold(Payload::new().with(name_field, name), |payload, (key, value)| {
            payload.with(key.as_str(), value.as_str())
        });

    let after = after
        .or_else(|| session.view().last_child(parent))
        .unwrap_or(NodeId::ROOT);

    let id = session.tree.add(payload, parent, after)?;
    session.save()?;
    output::success(&format!("added {id}"));
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_remove(cli: &Cli, id: NodeId, recursive: bool) -> CliResult<()> {
    let mut session = Session::open(cli)?;
    let removed = session.tree.remove(id, recursive.then_some(true))?;
    session.save()?;
    output::success(&format!("removed {}", removed.iter().join(", ")));
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_move(cli: &Cli, ids: &[NodeId], parent: NodeId, after: NodeId) -> CliResult<()> {
    let mut session = Session::open(cli)?;
    let report = session.tree.move_nodes(ids, parent, after)?;
    if !report.moved.is_empty() {
        session.save()?;
        output::success(&format!("moved {}", report.moved.iter().join(", ")));
    }
    for (id, err) in &report.failed {
        output::failure(&format!("{id}: {err}"));
    }
    if report.is_complete() {
        Ok(())
    } else {
        Err(CliError::PartialMove {
            failed: report.failed.len(),
            total: ids.len(),
        })
    }
}

#[instrument(skip(cli))]
fn cmd_rename(cli: &Cli, id: NodeId, name: &str) -> CliResult<()> {
    let mut session = Session::open(cli)?;
    let mut payload = session.view().get(id)?.payload.clone();
    payload.set(session.settings().name_field.clone(), name);
    session.tree.update(id, payload)?;
    session.save()?;
    output::success(&format!("renamed {id} to {name}"));
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_copy(cli: &Cli, src: NodeId, dest: NodeId) -> CliResult<()> {
    let mut session = Session::open(cli)?;
    let copied = session.tree.copy(src, dest)?;
    session.save()?;
    output::success(&format!("copied {src} as {}", copied.iter().join(", ")));
    Ok(())
}

fn cmd_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli.file.as_deref())?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::action("global", &path.display()),
                None => output::warning("no config directory on this platform"),
            }
            let dir = cli
                .file
                .as_deref()
                .and_then(Path::parent)
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            output::action("local", &local_config_path(dir).display());
        }
    }
    Ok(())
}
