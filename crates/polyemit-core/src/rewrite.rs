//! Module specifier rewriting, applied after script emission.
//!
//! Rewrites every specifier-bearing construct — static imports, re-exports
//! with a specifier, dynamic `import(...)` calls, `require(...)` calls — to
//! the target extension, resolving directory references to an explicit
//! `/index<ext>` entry through the virtual file system. Decisions rest
//! solely on relative-path syntax and directory existence; there is no
//! semantic module resolution here.

use crate::error::{Error, Result};
use crate::host::{EmitTransform, FileSystem, SourceUnit};
use crate::policy::SCRIPT_SUFFIX;
use crate::tree::{KindTable, Node, NodeShape};
use crate::vfs::RewriteFs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Specifiers with this extension are hand-authored CommonJS references and
/// must never be rewritten.
pub const CJS_SUFFIX: &str = ".cjs";
/// JSON modules keep their extension when the host permits importing them.
pub const JSON_SUFFIX: &str = ".json";

/// Whether a specifier is a relative path reference.
///
/// A bare `".."` is deliberately not recognized here; the declaration
/// rewriter opts into that case explicitly.
#[must_use]
pub fn is_relative_specifier(text: &str) -> bool {
    text.starts_with("./") || text.starts_with("../")
}

/// Lexically resolve `spec` against `base` without touching the file system.
///
/// `canonicalize` would force every probed path to exist on the real disk,
/// which does not hold for virtual hosts; normalizing `.` and `..`
/// components is enough for directory probes.
pub(crate) fn lexical_join(base: &Path, spec: &str) -> PathBuf {
    let mut out: Vec<Component<'_>> = base.components().collect();
    for component in Path::new(spec).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.last(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out.into_iter().map(|c| c.as_os_str()).collect()
}

/// Shared per-specifier update rules, parameterized by the target extension
/// so the script and declaration rewriters stay in lockstep.
///
/// Returns the rewritten text, or `None` when the specifier is exempt and
/// must be left unchanged.
pub(crate) fn update_specifier<F: FileSystem>(
    fs: &RewriteFs<F>,
    ext: &str,
    resolve_json_module: bool,
    containing_dir: &Path,
    text: &str,
    bare_parent_is_relative: bool,
) -> Option<String> {
    if !is_relative_specifier(text) && !(bare_parent_is_relative && text == "..") {
        return None;
    }
    if text.ends_with(CJS_SUFFIX) {
        return None;
    }
    if fs.is_directory(&lexical_join(containing_dir, text)) {
        return Some(format!("{text}/index{ext}"));
    }
    if text.ends_with(JSON_SUFFIX) && resolve_json_module {
        return None;
    }
    if text.ends_with(ext) {
        // Already carries the target extension; stable fixed point.
        return None;
    }
    let base = text.strip_suffix(SCRIPT_SUFFIX).unwrap_or(text);
    Some(format!("{base}{ext}"))
}

/// Rewrites the four specifier-bearing shapes, handing every other child to
/// `recurse`. Returns `None` when `node` is not one of the shapes.
pub(crate) fn rewrite_specifier_shapes<F: FileSystem>(
    fs: &RewriteFs<F>,
    kinds: &KindTable,
    ext: &str,
    resolve_json_module: bool,
    dir: &Path,
    node: &Node,
    recurse: &mut dyn FnMut(&Node) -> Node,
) -> Option<Node> {
    let update = |text: &str| update_specifier(fs, ext, resolve_json_module, dir, text, false);

    match kinds.shape(node.kind)? {
        NodeShape::ImportDeclaration | NodeShape::ExportDeclaration => {
            // The module specifier is the declaration's string literal child;
            // everything else (clauses, attributes) is visited as usual.
            let mut specifier_seen = false;
            let children = node
                .children
                .iter()
                .map(|child| {
                    if !specifier_seen && kinds.shape(child.kind) == Some(NodeShape::StringLiteral) {
                        specifier_seen = true;
                        update_literal(child, &update)
                    } else {
                        recurse(child)
                    }
                })
                .collect();
            Some(Node {
                kind: node.kind,
                text: node.text.clone(),
                span: node.span,
                children,
            })
        }
        NodeShape::CallExpression => {
            let callee = node.children.first()?;
            if !is_module_callee(kinds, callee) {
                return None;
            }
            let children = node
                .children
                .iter()
                .enumerate()
                .map(|(i, child)| {
                    if i == 1 && kinds.shape(child.kind) == Some(NodeShape::StringLiteral) {
                        update_literal(child, &update)
                    } else {
                        recurse(child)
                    }
                })
                .collect();
            Some(Node {
                kind: node.kind,
                text: node.text.clone(),
                span: node.span,
                children,
            })
        }
        _ => None,
    }
}

fn update_literal(literal: &Node, update: &dyn Fn(&str) -> Option<String>) -> Node {
    match literal.text.as_deref().and_then(update) {
        Some(text) => literal.with_text(text),
        None => literal.clone(),
    }
}

/// Whether a call's callee makes its first argument a module specifier:
/// the `import` keyword (dynamic import) or a `require` identifier.
fn is_module_callee(kinds: &KindTable, callee: &Node) -> bool {
    match kinds.shape(callee.kind) {
        Some(NodeShape::ImportKeyword) => true,
        Some(NodeShape::Identifier) => callee.text.as_deref() == Some("require"),
        _ => false,
    }
}

/// Post-emit transform rewriting script specifiers to the target extension.
pub struct SpecifierRewriter<F: FileSystem> {
    fs: Arc<RewriteFs<F>>,
    kinds: &'static KindTable,
    ext: String,
    resolve_json_module: bool,
}

impl<F: FileSystem> SpecifierRewriter<F> {
    #[must_use]
    pub fn new(
        fs: Arc<RewriteFs<F>>,
        kinds: &'static KindTable,
        ext: impl Into<String>,
        resolve_json_module: bool,
    ) -> Self {
        Self {
            fs,
            kinds,
            ext: ext.into(),
            resolve_json_module,
        }
    }

    /// Rewrite every specifier in one emitted unit.
    ///
    /// The returned tree is structurally equivalent to the input; only
    /// specifier literal texts change.
    pub fn rewrite_unit(&self, unit: &SourceUnit) -> Result<SourceUnit> {
        if self.kinds.shape(unit.root.kind) != Some(NodeShape::SourceFile) {
            return Err(Error::UnsupportedTreeRoot {
                path: unit.path.clone(),
                kind: unit.root.kind,
            });
        }
        let dir = unit.dir().to_path_buf();
        Ok(SourceUnit {
            path: unit.path.clone(),
            root: self.rewrite_node(&unit.root, &dir),
        })
    }

    /// Depth-first, full-tree rewrite. Nodes outside the four shapes are
    /// reconstructed unchanged and their subtrees are still visited, since
    /// specifiers can appear at arbitrary nesting depth.
    fn rewrite_node(&self, node: &Node, dir: &Path) -> Node {
        let mut recurse = |child: &Node| self.rewrite_node(child, dir);
        if let Some(rewritten) = rewrite_specifier_shapes(
            &self.fs,
            self.kinds,
            &self.ext,
            self.resolve_json_module,
            dir,
            node,
            &mut recurse,
        ) {
            return rewritten;
        }
        Node {
            kind: node.kind,
            text: node.text.clone(),
            span: node.span,
            children: node.children.iter().map(|c| self.rewrite_node(c, dir)).collect(),
        }
    }
}

impl<F: FileSystem> EmitTransform for SpecifierRewriter<F> {
    fn transform(&self, unit: &SourceUnit) -> Result<SourceUnit> {
        self.rewrite_unit(unit)
    }
}
