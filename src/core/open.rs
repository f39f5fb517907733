//! `fw open`: find a local function and open its files in an editor.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::cli::{AppContext, OpenArgs};
use crate::core::{
    error::ForkError,
    matcher::{QueryMessages, resolve_query},
    project::{ProjectEnv, ProjectState},
    prompt::{self, Prompter, TerminalPrompter},
    source_index::{ArtifactKind, FunctionPath},
};
use crate::infra::{
    config::{EditorPreference, save_preferred_editor},
    utils::PathUtils,
};

/// Editors offered when none is configured, with display names.
pub const KNOWN_EDITORS: [(&str, &str); 7] = [
    ("code", "VS Code"),
    ("code-insiders", "VS Code Insiders"),
    ("cursor", "Cursor"),
    ("vim", "Vim"),
    ("emacs", "Emacs"),
    ("subl", "Sublime Text"),
    ("zed", "Zed"),
];

fn display_name(cmd: &str) -> &str {
    KNOWN_EDITORS
        .iter()
        .find(|(c, _)| *c == cmd)
        .map_or(cmd, |(_, name)| *name)
}

/// Which artifact kinds to open. Nothing selected means the source file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactSelection {
    pub source: bool,
    pub test: bool,
    pub type_test: bool,
    pub benchmark: bool,
    pub docs: bool,
    pub all: bool,
}

impl ArtifactSelection {
    pub fn kinds(&self) -> Vec<ArtifactKind> {
        if self.all {
            return ArtifactKind::ALL.to_vec();
        }

        let picked: Vec<ArtifactKind> = [
            (self.source, ArtifactKind::Source),
            (self.docs, ArtifactKind::Docs),
            (self.test, ArtifactKind::Tests),
            (self.type_test, ArtifactKind::TypeTests),
            (self.benchmark, ArtifactKind::Benchmarks),
        ]
        .into_iter()
        .filter_map(|(on, kind)| on.then_some(kind))
        .collect();

        if picked.is_empty() { vec![ArtifactKind::Source] } else { picked }
    }
}

/// Opens one file with an editor command.
pub trait EditorLauncher {
    fn open(&self, file: &Path, command: &str) -> Result<()>;
}

/// Spawns the editor command with the file appended, waiting for it to exit.
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl EditorLauncher for ProcessLauncher {
    fn open(&self, file: &Path, command: &str) -> Result<()> {
        let expanded = shellexpand::full(command)
            .with_context(|| format!("expand editor command `{command}`"))?;
        let mut parts = expanded.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty editor command"))?;

        crate::core::git::run_tool_inherited(Command::new(program).args(parts).arg(file))
    }
}

/// Decide which editor command to use, asking when the configuration allows
/// it. Answers that should stick are saved to the project config.
pub fn resolve_editor(
    env: &ProjectEnv,
    prompter: &dyn Prompter,
    editor_env: Option<&str>,
    is_installed: &dyn Fn(&str) -> bool,
) -> Result<Option<String>> {
    let configured = env.config.preferred_editor.clone().unwrap_or_default();

    match env.config.editor_preference(editor_env) {
        EditorPreference::Disabled => Ok(None),
        EditorPreference::Always(cmd) => Ok(Some(cmd)),

        EditorPreference::Preferred(cmd) => {
            let name = display_name(&cmd).to_string();
            let options = vec![format!("Open with {name}"), format!("Always open with {name}")];

            match prompt::choose(prompter, "How would you like to open the file?", &options)? {
                Some(1) => {
                    save_preferred_editor(&env.root, &format!("!{configured}"))?;
                }
                // Nobody to ask: the configured editor is the answer
                Some(_) | None => {}
            }
            Ok(Some(cmd))
        }

        EditorPreference::Unset => {
            // (label, value saved to config, command to run)
            let mut options: Vec<(String, String, String)> = Vec::new();

            if let Some(e) = editor_env.map(str::trim).filter(|e| !e.is_empty()) {
                options.push((format!("Open with $EDITOR ({e})"), "$EDITOR".into(), e.into()));
            }
            for (cmd, name) in KNOWN_EDITORS {
                if is_installed(cmd) {
                    options.push((format!("Open with {name}"), cmd.into(), cmd.into()));
                }
            }

            let labels: Vec<String> = options
                .iter()
                .map(|(label, ..)| label.clone())
                .chain(std::iter::once("Open with custom command".to_string()))
                .collect();

            let Some(i) = prompt::choose(prompter, "How would you like to open the file?", &labels)? else {
                debug!("no terminal; not opening an editor");
                return Ok(None);
            };

            let (saved, cmd) = match options.get(i) {
                Some((_, saved, cmd)) => (saved.clone(), cmd.clone()),
                None => {
                    let typed = prompt::text(prompter, "Enter the command to open the file:")?
                        .unwrap_or_default();
                    let typed = typed.trim().to_string();
                    if typed.is_empty() {
                        return Ok(None);
                    }
                    (typed.clone(), typed)
                }
            };

            save_preferred_editor(&env.root, &saved)?;
            Ok(Some(cmd))
        }
    }
}

/// Resolve `query` among the project's own and overridden functions.
fn resolve_local(query: &str, state: &ProjectState, prompter: &dyn Prompter) -> Result<FunctionPath> {
    let candidates: Vec<FunctionPath> = state.local_functions().into_iter().collect();

    if !query.trim().is_empty() {
        let messages = QueryMessages { choose: "Which function do you want to open?", ..QueryMessages::default() };
        return resolve_query(query, &candidates, false, prompter, &messages);
    }

    // No query: every local function is a candidate
    match candidates.len() {
        0 => Err(ForkError::NotFound { query: String::new() }.into()),
        1 => Ok(candidates[0].clone()),
        _ => {
            let options: Vec<String> = candidates.iter().map(ToString::to_string).collect();
            match prompt::choose(prompter, "Which function do you want to open?", &options)? {
                Some(i) => Ok(candidates[i].clone()),
                None => Err(ForkError::Ambiguous { query: String::new(), candidates: options }.into()),
            }
        }
    }
}

/// Existing files of `fp` for the selected kinds, own tree before overrides.
pub fn files_to_open(env: &ProjectEnv, fp: &FunctionPath, selection: ArtifactSelection) -> Vec<PathBuf> {
    let bases = [env.root.clone(), env.override_root()];

    selection
        .kinds()
        .into_iter()
        .flat_map(|kind| bases.iter().map(move |base| kind.path_for(base, fp)))
        .filter(|p| p.is_file())
        .collect()
}

/// Open the selected artifacts of the local function matching `query`.
/// Returns the files found; editor failures are logged, not raised.
pub fn open_function(
    env: &ProjectEnv,
    prompter: &dyn Prompter,
    launcher: &dyn EditorLauncher,
    query: &str,
    selection: ArtifactSelection,
) -> Result<Vec<PathBuf>> {
    let state = ProjectState::scan(env)?;
    let fp = resolve_local(query, &state, prompter)?;

    let files = files_to_open(env, &fp, selection);
    if files.is_empty() {
        return Ok(files);
    }

    let editor_env = std::env::var("EDITOR").ok();
    let installed = |cmd: &str| which::which(cmd).is_ok();
    let Some(editor) = resolve_editor(env, prompter, editor_env.as_deref(), &installed)? else {
        return Ok(files);
    };

    for file in &files {
        if let Err(e) = launcher.open(file, &editor) {
            warn!(file = %file.display(), editor = %editor, error = %e, "failed to open file");
        }
    }

    Ok(files)
}

pub fn run(args: OpenArgs, ctx: &AppContext) -> Result<()> {
    let cwd = std::env::current_dir().context("read current directory")?;
    let env = ProjectEnv::discover(&cwd)?;
    let selection = ArtifactSelection {
        source: args.source,
        test: args.test,
        type_test: args.type_test,
        benchmark: args.benchmark,
        docs: args.docs,
        all: args.all,
    };

    let files = open_function(&env, &TerminalPrompter::new(), &ProcessLauncher, &args.query, selection)?;

    if files.is_empty() {
        eprintln!("No files of the selected kinds exist for this function");
    } else if !ctx.quiet {
        for file in &files {
            println!("{}", PathUtils::relative(&env.root, file));
        }
    }
    Ok(())
}
