//! Filepath: src/core/imports.rs
//! ------------------------------------------------------------------
//! Top-level import/export analysis for TypeScript sources, built on
//! Tree-sitter 0.25.x with the TypeScript grammar.
//!
//! Only direct children of the program node are inspected; nested
//! scopes and dynamic `import()` expressions are never visited.
//!
//!   - `imported_symbols`: names a file imports from the base package,
//!     memoized per absolute path in a moka cache.
//!   - `exported_names`: value and type names a file exports, for the
//!     aggregated entry point.
//!   - `rewrite_base_specifiers`: retarget base-package specifiers, for
//!     generating shims.
//!
//! A syntax error anywhere in the file is fatal (`ForkError::ParseFailure`):
//! a skipped file would drop dependency edges.
//! ------------------------------------------------------------------

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use moka::sync::Cache;
use tracing::trace;
use tree_sitter::{Language, Node, Parser, Tree};

use crate::core::error::ForkError;

/// Upper bound on memoized summaries; far above any real library.
const SUMMARY_CACHE_CAPACITY: u64 = 16_384;

/// Names a file exports at top level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Functions, classes, constants, enums, namespaces
    pub values: BTreeSet<String>,
    /// Type aliases and interfaces, and `export type { .. }` clauses
    pub types: BTreeSet<String>,
}

impl ExportSummary {
    /// Every exported name regardless of kind.
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.values.iter().chain(self.types.iter())
    }
}

/// Parses TypeScript sources and answers import/export questions about them.
pub struct ImportAnalyzer {
    /// Package identifier whose imports are tracked (e.g. "radashi")
    base_package: String,
    /// TypeScript language handle for Tree-sitter
    language: Language,
    /// Per-file import summaries for the lifetime of this analyzer
    cache: Cache<PathBuf, Arc<BTreeSet<String>>>,
}

impl ImportAnalyzer {
    pub fn new(base_package: &str) -> Self {
        Self {
            base_package: base_package.to_string(),
            language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            cache: Cache::new(SUMMARY_CACHE_CAPACITY),
        }
    }

    pub fn base_package(&self) -> &str {
        &self.base_package
    }

    /// Symbols `file` imports from the base package. Cached per path.
    pub fn imported_symbols(&self, file: &Path) -> Result<Arc<BTreeSet<String>>> {
        if let Some(hit) = self.cache.get(file) {
            return Ok(hit);
        }

        let source =
            fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
        let summary = Arc::new(self.summarize_imports(&source, file)?);

        trace!(file = %file.display(), symbols = ?summary, "import summary");
        self.cache.insert(file.to_path_buf(), summary.clone());

        Ok(summary)
    }

    /// Uncached import analysis of in-memory `source`; `path` is for errors.
    pub fn summarize_imports(&self, source: &str, path: &Path) -> Result<BTreeSet<String>> {
        let tree = self.parse(source, path)?;
        let bytes = source.as_bytes();
        let root = tree.root_node();

        let mut out = BTreeSet::new();
        let mut cursor = root.walk();

        for stmt in root.named_children(&mut cursor) {
            let is_import = stmt.kind() == "import_statement";
            // `export { x } from 'base'` depends on the base package too
            let is_reexport = stmt.kind() == "export_statement";
            if !is_import && !is_reexport {
                continue;
            }
            if !self.sources_base(stmt, bytes) {
                continue;
            }

            if is_import {
                for clause in named_children_of_kind(stmt, "import_clause") {
                    collect_import_clause(clause, bytes, &mut out);
                }
            } else {
                for clause in named_children_of_kind(stmt, "export_clause") {
                    for spec in named_children_of_kind(clause, "export_specifier") {
                        if let Some(name) = field_text(spec, "name", bytes) {
                            out.insert(name);
                        }
                    }
                }
            }
        }

        Ok(out)
    }

    /// Names exported at top level by `file`. `export default` is ignored.
    pub fn exported_names(&self, file: &Path) -> Result<ExportSummary> {
        let source =
            fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
        self.summarize_exports(&source, file)
    }

    pub fn summarize_exports(&self, source: &str, path: &Path) -> Result<ExportSummary> {
        let tree = self.parse(source, path)?;
        let bytes = source.as_bytes();
        let root = tree.root_node();

        let mut out = ExportSummary::default();
        let mut cursor = root.walk();

        for stmt in root.named_children(&mut cursor) {
            if stmt.kind() != "export_statement" || has_token(stmt, "default") {
                continue;
            }

            if let Some(decl) = stmt.child_by_field_name("declaration") {
                collect_declaration(decl, bytes, &mut out);
                continue;
            }

            // `export type { A, B }` marks the whole clause
            let clause_is_type = has_token(stmt, "type");
            for clause in named_children_of_kind(stmt, "export_clause") {
                for spec in named_children_of_kind(clause, "export_specifier") {
                    // Exported under the alias when there is one
                    let name = field_text(spec, "alias", bytes)
                        .or_else(|| field_text(spec, "name", bytes));
                    let Some(name) = name else { continue };

                    if clause_is_type || has_token(spec, "type") {
                        out.types.insert(name);
                    } else {
                        out.values.insert(name);
                    }
                }
            }
        }

        Ok(out)
    }

    /// Replace the module specifier of every top-level import or re-export
    /// of the base package with `replacement`, keeping the original quotes.
    pub fn rewrite_base_specifiers(
        &self,
        source: &str,
        path: &Path,
        replacement: &str,
    ) -> Result<String> {
        let tree = self.parse(source, path)?;
        let bytes = source.as_bytes();
        let root = tree.root_node();

        // Byte ranges of the string literals to replace, in source order
        let mut spans = Vec::new();
        let mut cursor = root.walk();
        for stmt in root.named_children(&mut cursor) {
            if !matches!(stmt.kind(), "import_statement" | "export_statement") {
                continue;
            }
            if let Some(src) = stmt.child_by_field_name("source")
                && string_value(src, bytes) == Some(self.base_package.as_str())
            {
                spans.push((src.start_byte(), src.end_byte()));
            }
        }

        let mut out = String::with_capacity(source.len() + spans.len() * replacement.len());
        let mut last = 0;
        for (start, end) in spans {
            let quote = source[start..].chars().next().unwrap_or('\'');
            out.push_str(&source[last..start]);
            out.push(quote);
            out.push_str(replacement);
            out.push(quote);
            last = end;
        }
        out.push_str(&source[last..]);

        Ok(out)
    }

    /// Parse `source`, failing on any syntax error.
    fn parse(&self, source: &str, path: &Path) -> Result<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .context("set TypeScript language")?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("parser produced no tree for {}", path.display()))?;

        let root = tree.root_node();
        if root.has_error() {
            let line = first_error(root).map_or(1, |n| n.start_position().row + 1);
            return Err(ForkError::ParseFailure { path: path.to_path_buf(), line }.into());
        }

        Ok(tree)
    }

    /// Whether the statement's `source` field names the base package.
    fn sources_base(&self, stmt: Node, bytes: &[u8]) -> bool {
        stmt.child_by_field_name("source")
            .and_then(|s| string_value(s, bytes))
            .is_some_and(|s| s == self.base_package)
    }
}

/// `import a, * as ns, { x, y as z } from ..`
fn collect_import_clause(clause: Node, bytes: &[u8], out: &mut BTreeSet<String>) {
    let mut cursor = clause.walk();
    for part in clause.named_children(&mut cursor) {
        match part.kind() {
            // Default import: only the local binding is known
            "identifier" => {
                if let Ok(s) = part.utf8_text(bytes) {
                    out.insert(s.to_string());
                }
            }
            "namespace_import" => {
                if let Some(id) = named_children_of_kind(part, "identifier").first()
                    && let Ok(s) = id.utf8_text(bytes)
                {
                    out.insert(s.to_string());
                }
            }
            "named_imports" => {
                for spec in named_children_of_kind(part, "import_specifier") {
                    // The external name is what identifies the upstream function
                    if let Some(name) = field_text(spec, "name", bytes) {
                        out.insert(name);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Names introduced by `export <declaration>`.
fn collect_declaration(decl: Node, bytes: &[u8], out: &mut ExportSummary) {
    match decl.kind() {
        "function_declaration"
        | "generator_function_declaration"
        | "function_signature"
        | "class_declaration"
        | "abstract_class_declaration"
        | "enum_declaration"
        | "internal_module"
        | "module" => {
            if let Some(name) = field_text(decl, "name", bytes) {
                out.values.insert(name);
            }
        }
        "type_alias_declaration" | "interface_declaration" => {
            if let Some(name) = field_text(decl, "name", bytes) {
                out.types.insert(name);
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            for var in named_children_of_kind(decl, "variable_declarator") {
                // Destructuring patterns are not function exports
                if let Some(name_node) = var.child_by_field_name("name")
                    && name_node.kind() == "identifier"
                    && let Ok(s) = name_node.utf8_text(bytes)
                {
                    out.values.insert(s.to_string());
                }
            }
        }
        // `export declare ...`
        "ambient_declaration" => {
            let mut cursor = decl.walk();
            for inner in decl.named_children(&mut cursor) {
                collect_declaration(inner, bytes, out);
            }
        }
        _ => {}
    }
}

fn named_children_of_kind<'t>(node: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|n| n.kind() == kind)
        .collect()
}

/// Whether `node` has a direct anonymous child token `token`.
fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .any(|n| !n.is_named() && n.kind() == token)
}

fn field_text(node: Node, field: &str, bytes: &[u8]) -> Option<String> {
    let child = node.child_by_field_name(field)?;
    let text = child.utf8_text(bytes).ok()?;
    // Names may be string literals: `import { "a-b" as ab }`
    Some(text.trim_matches(['"', '\'']).to_string())
}

/// Contents of a string literal node without its quotes.
fn string_value<'b>(node: Node, bytes: &'b [u8]) -> Option<&'b str> {
    let text = node.utf8_text(bytes).ok()?;
    Some(text.trim_matches(['"', '\'']))
}

/// First ERROR or MISSING node in document order.
fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error)
}
