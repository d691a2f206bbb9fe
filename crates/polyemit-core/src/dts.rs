//! Module specifier rewriting for declaration output.
//!
//! Applies the same four shape rules as the script rewriter, parameterized
//! by the declaration extension, plus one extra detection pass: the
//! declaration emitter can embed a literal module reference inside a type
//! expression (an inline `import("<module>").SomeType` nested in a mapped or
//! template-literal type position) without producing the ordinary
//! dynamic-import call shape. Those literals are recognized by the kinds of
//! the nodes visited just before them, tracked in a bounded window; the kind
//! predicate itself lives in [`KindTable`] so a host version bump touches
//! one table.

use crate::error::{Error, Result};
use crate::host::{EmitTransform, FileSystem, SourceUnit};
use crate::rewrite::{rewrite_specifier_shapes, update_specifier};
use crate::tree::{KindTable, KindWindow, Node, NodeShape};
use crate::vfs::RewriteFs;
use std::path::Path;
use std::sync::Arc;

/// Post-declaration-emit transform.
pub struct DeclarationRewriter<F: FileSystem> {
    fs: Arc<RewriteFs<F>>,
    kinds: &'static KindTable,
    ext: String,
    resolve_json_module: bool,
}

impl<F: FileSystem> DeclarationRewriter<F> {
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

    /// Rewrite every specifier in one emitted declaration unit.
    ///
    /// Aggregate/bundle roots are not supported: the window heuristic is
    /// only meaningful within a single file's traversal, so a bundle root
    /// is a fatal error for that input.
    pub fn rewrite_unit(&self, unit: &SourceUnit) -> Result<SourceUnit> {
        if self.kinds.shape(unit.root.kind) != Some(NodeShape::SourceFile) {
            return Err(Error::UnsupportedTreeRoot {
                path: unit.path.clone(),
                kind: unit.root.kind,
            });
        }
        let dir = unit.dir().to_path_buf();
        let mut window = KindWindow::new();
        Ok(SourceUnit {
            path: unit.path.clone(),
            root: self.visit(&unit.root, &dir, &mut window),
        })
    }

    fn visit(&self, node: &Node, dir: &Path, window: &mut KindWindow) -> Node {
        // Heuristic pass: a string literal sitting right after the
        // (mapped type, template literal type span) pair is an embedded
        // module reference the ordinary shapes cannot see.
        if self.kinds.looks_like_embedded_module_ref(window) {
            if self.kinds.shape(node.kind) == Some(NodeShape::StringLiteral) {
                window.push(node.kind);
                return self.update_embedded_literal(node, dir);
            }
            // The emitter's shape has drifted; leave the node alone and
            // flag it instead of guessing.
            tracing::warn!(
                kind = node.kind,
                "expected embedded module reference literal after mapped-type/template-span pair"
            );
        }

        window.push(node.kind);

        let mut recurse = |child: &Node| self.visit(child, dir, window);
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
        let children = node
            .children
            .iter()
            .map(|child| self.visit(child, dir, window))
            .collect();
        Node {
            kind: node.kind,
            text: node.text.clone(),
            span: node.span,
            children,
        }
    }

    /// Same rules and exemptions as the ordinary path, except a bare `".."`
    /// is treated as relative here: the declaration emitter produces it for
    /// parent-directory type references.
    fn update_embedded_literal(&self, literal: &Node, dir: &Path) -> Node {
        let updated = literal.text.as_deref().and_then(|text| {
            update_specifier(&self.fs, &self.ext, self.resolve_json_module, dir, text, true)
        });
        match updated {
            Some(text) => literal.with_text(text),
            None => literal.clone(),
        }
    }
}

impl<F: FileSystem> EmitTransform for DeclarationRewriter<F> {
    fn transform(&self, unit: &SourceUnit) -> Result<SourceUnit> {
        self.rewrite_unit(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryFileSystem;
    use crate::policy::ExtensionPolicy;
    use crate::tree::CompilerRelease;

    fn kinds() -> &'static KindTable {
        CompilerRelease::V5.kind_table()
    }

    fn rewriter() -> DeclarationRewriter<MemoryFileSystem> {
        let fs = MemoryFileSystem::new();
        fs.add_directory("/out/models");
        fs.add_directory("/");
        let fs = Arc::new(RewriteFs::new(
            fs,
            ExtensionPolicy::new(Some(".mjs".into()), Some(".d.mts".into())),
        ));
        DeclarationRewriter::new(fs, kinds(), ".d.mts", false)
    }

    /// The shape the declaration emitter produces for inline type
    /// references: a mapped type construct whose template literal type span
    /// carries the module path as a plain string literal.
    fn embedded_ref(spec: &str) -> Node {
        Node::with_children(
            kinds().mapped_type,
            vec![Node::with_children(
                kinds().template_literal_type_span,
                vec![Node::token(kinds().string_literal, spec)],
            )],
        )
    }

    fn unit_of(children: Vec<Node>) -> SourceUnit {
        SourceUnit::new(
            "/out/main.d.ts",
            Node::with_children(kinds().source_file, children),
        )
    }

    fn literals(unit: &SourceUnit) -> Vec<String> {
        fn walk(node: &Node, out: &mut Vec<String>) {
            if node.kind == CompilerRelease::V5.kind_table().string_literal {
                out.push(node.text.clone().unwrap_or_default());
            }
            for child in &node.children {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        walk(&unit.root, &mut out);
        out
    }

    #[test]
    fn test_ordinary_import_uses_declaration_extension() {
        let node = Node::with_children(
            kinds().import_declaration,
            vec![Node::token(kinds().string_literal, "./types")],
        );
        let out = rewriter().rewrite_unit(&unit_of(vec![node])).unwrap();
        assert_eq!(literals(&out), vec!["./types.d.mts"]);
    }

    #[test]
    fn test_embedded_type_reference_is_rewritten() {
        let out = rewriter()
            .rewrite_unit(&unit_of(vec![embedded_ref("./widget")]))
            .unwrap();
        assert_eq!(literals(&out), vec!["./widget.d.mts"]);
    }

    #[test]
    fn test_embedded_bare_parent_is_relative() {
        // ".." fails the general relative check but is explicitly relative
        // in the embedded position; as a directory it gains an index entry.
        let out = rewriter()
            .rewrite_unit(&unit_of(vec![embedded_ref("..")]))
            .unwrap();
        assert_eq!(literals(&out), vec!["../index.d.mts"]);
    }

    #[test]
    fn test_embedded_keeps_ordinary_exemptions() {
        let out = rewriter()
            .rewrite_unit(&unit_of(vec![
                embedded_ref("./legacy.cjs"),
                embedded_ref("pkg/inner"),
            ]))
            .unwrap();
        assert_eq!(literals(&out), vec!["./legacy.cjs", "pkg/inner"]);
    }

    #[test]
    fn test_embedded_directory_gains_index() {
        let out = rewriter()
            .rewrite_unit(&unit_of(vec![embedded_ref("./models")]))
            .unwrap();
        assert_eq!(literals(&out), vec!["./models/index.d.mts"]);
    }

    #[test]
    fn test_literal_outside_window_pattern_untouched() {
        // A string literal that is not preceded by the pair must not be
        // treated as a module reference.
        let stray = Node::with_children(9000, vec![Node::token(kinds().string_literal, "./free")]);
        let out = rewriter().rewrite_unit(&unit_of(vec![stray])).unwrap();
        assert_eq!(literals(&out), vec!["./free"]);
    }

    #[test]
    fn test_absent_shape_does_not_rewrite() {
        // The pair followed by a non-literal is a drifted emitter shape;
        // the traversal flags it and leaves the subtree's literal alone.
        let drifted = Node::with_children(
            kinds().mapped_type,
            vec![Node::with_children(
                kinds().template_literal_type_span,
                vec![Node::with_children(
                    9000,
                    vec![Node::token(kinds().string_literal, "./inner")],
                )],
            )],
        );
        let out = rewriter().rewrite_unit(&unit_of(vec![drifted])).unwrap();
        assert_eq!(literals(&out), vec!["./inner"]);
    }

    #[test]
    fn test_rewrite_is_fixed_point() {
        let rewriter = rewriter();
        let unit = unit_of(vec![embedded_ref("./widget.js")]);
        let once = rewriter.rewrite_unit(&unit).unwrap();
        let twice = rewriter.rewrite_unit(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_bundle_root_is_fatal() {
        let unit = SourceUnit::new("/out/all.d.ts", Node::new(kinds().bundle));
        let err = rewriter().rewrite_unit(&unit).unwrap_err();
        assert!(matches!(err, Error::UnsupportedTreeRoot { .. }));
    }
}
