use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cli::{AppContext, InitArgs};

/// Config file names, first found wins
pub const CONFIG_FILES: [&str; 4] =
    ["forkwire.toml", "forkwire.yaml", "forkwire.json", ".forkwire.toml"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Bundle output directory, relative to the project root
    pub output_dir: PathBuf,

    /// Emit `.d.ts` files next to the bundles
    pub emit_type_declarations: bool,

    /// Bundle formats ("esm", "cjs"); see [`Config::formats`]
    pub bundle_formats: Vec<String>,

    /// Branch, tag or commit of the upstream library to track
    pub upstream_ref: String,

    /// Git URL of the upstream library
    pub upstream_url: String,

    /// Package identifier the upstream library is imported as
    pub base_package: String,

    /// Editor command; `$EDITOR`, `!` (never) and `!cmd` (always) are special
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_editor: Option<String>,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            output_dir: PathBuf::from("dist"),
            emit_type_declarations: true,
            bundle_formats: vec!["esm".to_string()],
            upstream_ref: "main".to_string(),
            upstream_url: "https://github.com/radashi-org/radashi.git".to_string(),
            base_package: "radashi".to_string(),
            preferred_editor: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleFormat
{
    Esm,
    Cjs,
}

impl BundleFormat
{
    pub fn parse(s: &str) -> Option<Self>
    {
        match s.trim().to_ascii_lowercase().as_str()
        {
            "esm" => Some(BundleFormat::Esm),
            "cjs" => Some(BundleFormat::Cjs),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str
    {
        match self
        {
            BundleFormat::Esm => "esm",
            BundleFormat::Cjs => "cjs",
        }
    }

    /// Bundle file extension
    pub fn extension(self) -> &'static str
    {
        match self
        {
            BundleFormat::Esm => ".js",
            BundleFormat::Cjs => ".cjs",
        }
    }
}

/// How the editor should be chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorPreference
{
    /// Nothing configured; ask
    Unset,
    /// `!`: never open an editor
    Disabled,
    /// A command offered as the default choice
    Preferred(String),
    /// `!cmd`: use without asking
    Always(String),
}

impl Config
{
    /// Recognized formats in configured order, without duplicates.
    /// Falls back to ESM when nothing usable is configured.
    pub fn formats(&self) -> Vec<BundleFormat>
    {
        let mut out: Vec<BundleFormat> = Vec::new();
        for raw in &self.bundle_formats
        {
            match BundleFormat::parse(raw)
            {
                Some(f) if !out.contains(&f) => out.push(f),
                Some(_) =>
                {}
                None => warn!(format = %raw, "unknown bundle format ignored"),
            }
        }

        if out.is_empty()
        {
            out.push(BundleFormat::Esm);
        }
        out
    }

    /// Interpret `preferred_editor`, expanding `$EDITOR` from `editor_env`.
    pub fn editor_preference(
        &self,
        editor_env: Option<&str>,
    ) -> EditorPreference
    {
        let Some(raw) = self
            .preferred_editor
            .as_deref()
            .map(str::trim)
        else
        {
            return EditorPreference::Unset;
        };

        let (always, cmd) = match raw.strip_prefix('!')
        {
            Some(rest) => (true, rest.trim()),
            None => (false, raw),
        };

        let cmd = if cmd == "$EDITOR" { editor_env.unwrap_or_default().trim() } else { cmd };

        match (always, cmd.is_empty())
        {
            (true, true) => EditorPreference::Disabled,
            (false, true) => EditorPreference::Unset,
            (true, false) => EditorPreference::Always(cmd.to_string()),
            (false, false) => EditorPreference::Preferred(cmd.to_string()),
        }
    }
}

/// First config file present in `root`.
pub fn config_file(root: &Path) -> Option<PathBuf>
{
    CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|p| p.is_file())
}

/// Load the project configuration: defaults, then the first config file in
/// `root`, then `FORKWIRE_*` environment variables.
pub fn load_config(root: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    if let Some(path) = config_file(root)
    {
        debug!(path = %path.display(), "config file");
        builder = builder.add_source(config::File::from(path));
    }

    // FORKWIRE_UPSTREAM_REF=v12, FORKWIRE_BUNDLE_FORMATS=esm,cjs
    builder = builder.add_source(
        config::Environment::with_prefix("FORKWIRE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("bundle_formats"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

/// Set `preferred_editor` in `<root>/forkwire.toml`, keeping other keys.
pub fn save_preferred_editor(
    root: &Path,
    value: &str,
) -> Result<PathBuf>
{
    let path = root.join(CONFIG_FILES[0]);

    let mut table: toml::Table = if path.is_file()
    {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))?
    }
    else
    {
        toml::Table::new()
    };

    table.insert("preferred_editor".to_string(), toml::Value::String(value.to_string()));

    let text = toml::to_string_pretty(&table).context("Failed to serialize config")?;
    crate::infra::io::write_atomic(&path, text.as_bytes())?;

    Ok(path)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;
    let ignored = ignore_mirror(&args.path)?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
        if ignored
        {
            println!("Added {MIRROR_IGNORE} to .gitignore");
        }
    }
    Ok(())
}

const MIRROR_IGNORE: &str = ".forkwire/";

/// Append the mirror directory to `<dir>/.gitignore` unless already listed.
/// Returns whether the file changed.
fn ignore_mirror(dir: &Path) -> Result<bool>
{
    let path = dir.join(".gitignore");
    let current = match std::fs::read_to_string(&path)
    {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };

    if current
        .lines()
        .any(|l| matches!(l.trim(), ".forkwire" | ".forkwire/" | "/.forkwire" | "/.forkwire/"))
    {
        return Ok(false);
    }

    let mut next = current;
    if !next.is_empty() && !next.ends_with('\n')
    {
        next.push('\n');
    }
    next.push_str(MIRROR_IGNORE);
    next.push('\n');

    crate::infra::io::write_atomic(&path, next.as_bytes())?;
    Ok(true)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn defaults_apply_without_a_file()
    {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = load_config(tmp.path()).unwrap();

        assert_eq!(cfg.output_dir, PathBuf::from("dist"));
        assert!(cfg.emit_type_declarations);
        assert_eq!(cfg.formats(), vec![BundleFormat::Esm]);
        assert_eq!(cfg.base_package, "radashi");
    }

    #[test]
    fn file_values_override_defaults()
    {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("forkwire.toml"),
            "upstream_ref = \"v12.2.0\"\nbundle_formats = [\"cjs\", \"umd\", \"esm\", \"cjs\"]\n",
        )
        .unwrap();

        let cfg = load_config(tmp.path()).unwrap();
        assert_eq!(cfg.upstream_ref, "v12.2.0");
        assert_eq!(cfg.formats(), vec![BundleFormat::Cjs, BundleFormat::Esm]);
    }

    #[test]
    fn empty_formats_fall_back_to_esm()
    {
        let cfg = Config { bundle_formats: vec!["amd".into()], ..Config::default() };
        assert_eq!(cfg.formats(), vec![BundleFormat::Esm]);
    }

    #[test]
    fn editor_preference_forms()
    {
        let with = |v: &str| Config { preferred_editor: Some(v.into()), ..Config::default() };

        assert_eq!(Config::default().editor_preference(None), EditorPreference::Unset);
        assert_eq!(with("!").editor_preference(None), EditorPreference::Disabled);
        assert_eq!(with("!code").editor_preference(None), EditorPreference::Always("code".into()));
        assert_eq!(with("vim").editor_preference(None), EditorPreference::Preferred("vim".into()));
        assert_eq!(
            with("$EDITOR").editor_preference(Some("nvim")),
            EditorPreference::Preferred("nvim".into())
        );
        assert_eq!(with("$EDITOR").editor_preference(None), EditorPreference::Unset);
    }

    #[test]
    fn saving_editor_keeps_other_keys()
    {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("forkwire.toml"), "upstream_ref = \"next\"\n").unwrap();

        save_preferred_editor(tmp.path(), "!code").unwrap();

        let cfg = load_config(tmp.path()).unwrap();
        assert_eq!(cfg.upstream_ref, "next");
        assert_eq!(cfg.preferred_editor.as_deref(), Some("!code"));
    }

    #[test]
    fn init_writes_config_and_ignores_mirror_once()
    {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join(".gitignore"), "node_modules").unwrap();
        let ctx = AppContext { quiet: true, ..AppContext::default() };
        let args = || InitArgs { path: tmp.path().to_path_buf(), force: true };

        init(args(), &ctx).unwrap();
        init(args(), &ctx).unwrap();

        assert_eq!(load_config(tmp.path()).unwrap(), Config::default());
        assert_eq!(
            std::fs::read_to_string(tmp.path().join(".gitignore")).unwrap(),
            "node_modules\n.forkwire/\n"
        );
        assert!(init(InitArgs { path: tmp.path().to_path_buf(), force: false }, &ctx).is_err());
    }
}
