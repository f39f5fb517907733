//! Display helpers for paths and colored terminal lines.

use std::path::Path;

use owo_colors::{OwoColorize, Stream};

/// Path display helpers
pub struct PathUtils;

impl PathUtils
{
    /// `path` relative to `root` when it lives inside it,
    /// else the path unchanged; always `/`-separated
    pub fn relative(
        root: &Path,
        path: &Path,
    ) -> String
    {
        let shown = path
            .strip_prefix(root)
            .unwrap_or(path);

        shown
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Colored user-facing lines on stdout
pub struct Paint;

impl Paint
{
    /// Apply the global `--no-color` switch, to our output and to the
    /// prompt and spinner themes
    pub fn init(no_color: bool)
    {
        if no_color
        {
            owo_colors::set_override(false);
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }
    }

    pub fn heading(text: &str) -> String
    {
        format!(
            "{}",
            text.if_supports_color(Stream::Stdout, |t| t.bold())
        )
    }

    pub fn added(text: &str) -> String
    {
        format!(
            "{}",
            text.if_supports_color(Stream::Stdout, |t| t.green())
        )
    }

    pub fn removed(text: &str) -> String
    {
        format!(
            "{}",
            text.if_supports_color(Stream::Stdout, |t| t.red())
        )
    }

    pub fn note(text: &str) -> String
    {
        format!(
            "{}",
            text.if_supports_color(Stream::Stdout, |t| t.dimmed())
        )
    }

    pub fn warn(text: &str) -> String
    {
        format!(
            "{}",
            text.if_supports_color(Stream::Stdout, |t| t.yellow())
        )
    }
}
