//! Syntax tree model.
//!
//! The host compiler owns the real tree; what crosses the boundary is a
//! kind-tagged rose tree. Kinds are raw `u16` identifiers owned by the host
//! and they shift between host releases, so every kind comparison in the
//! engine goes through a [`KindTable`] selected by [`CompilerRelease`].
//! Upgrading the host means adding one table here plus a regression fixture,
//! not re-auditing the traversals.

use serde::{Deserialize, Serialize};

/// Byte range of a token in the emitted text. Carried on literal tokens so
/// structural patches can be spliced back into the serialized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A node of the externally-defined syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Raw node kind, owned by the host compiler.
    pub kind: u16,
    /// Token text, present on literals and keywords.
    pub text: Option<String>,
    /// Byte range in the emitted text, when known.
    pub span: Option<Span>,
    pub children: Vec<Node>,
}

impl Node {
    #[must_use]
    pub fn new(kind: u16) -> Self {
        Self {
            kind,
            text: None,
            span: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn token(kind: u16, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: Some(text.into()),
            span: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn token_at(kind: u16, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: Some(text.into()),
            span: Some(span),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_children(kind: u16, children: Vec<Node>) -> Self {
        Self {
            kind,
            text: None,
            span: None,
            children,
        }
    }

    /// Copy of this node with new text, keeping kind and span.
    #[must_use]
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            kind: self.kind,
            text: Some(text.into()),
            span: self.span,
            children: self.children.clone(),
        }
    }
}

/// Semantic shape of a node, independent of the host release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    SourceFile,
    Bundle,
    StringLiteral,
    Identifier,
    ImportKeyword,
    CallExpression,
    ImportDeclaration,
    ExportDeclaration,
    MappedType,
    TemplateLiteralTypeSpan,
}

/// Host compiler release series, selecting the matching [`KindTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerRelease {
    V4,
    #[default]
    V5,
}

impl CompilerRelease {
    #[must_use]
    pub fn kind_table(self) -> &'static KindTable {
        KindTable::for_release(self)
    }
}

/// Raw kind identifiers for every node shape the engine inspects, keyed by
/// host release. These values are the only place the host's numbering is
/// written down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindTable {
    pub source_file: u16,
    pub bundle: u16,
    pub string_literal: u16,
    pub identifier: u16,
    pub import_keyword: u16,
    pub call_expression: u16,
    pub import_declaration: u16,
    pub export_declaration: u16,
    pub mapped_type: u16,
    pub template_literal_type_span: u16,
}

static KINDS_V4: KindTable = KindTable {
    source_file: 308,
    bundle: 309,
    string_literal: 10,
    identifier: 79,
    import_keyword: 100,
    call_expression: 210,
    import_declaration: 269,
    export_declaration: 275,
    mapped_type: 197,
    template_literal_type_span: 201,
};

static KINDS_V5: KindTable = KindTable {
    source_file: 312,
    bundle: 313,
    string_literal: 11,
    identifier: 80,
    import_keyword: 102,
    call_expression: 213,
    import_declaration: 272,
    export_declaration: 278,
    mapped_type: 200,
    template_literal_type_span: 204,
};

impl KindTable {
    #[must_use]
    pub fn for_release(release: CompilerRelease) -> &'static Self {
        match release {
            CompilerRelease::V4 => &KINDS_V4,
            CompilerRelease::V5 => &KINDS_V5,
        }
    }

    /// Semantic shape of a raw kind, or `None` for kinds the engine does not
    /// inspect.
    #[must_use]
    pub fn shape(&self, kind: u16) -> Option<NodeShape> {
        if kind == self.source_file {
            Some(NodeShape::SourceFile)
        } else if kind == self.bundle {
            Some(NodeShape::Bundle)
        } else if kind == self.string_literal {
            Some(NodeShape::StringLiteral)
        } else if kind == self.identifier {
            Some(NodeShape::Identifier)
        } else if kind == self.import_keyword {
            Some(NodeShape::ImportKeyword)
        } else if kind == self.call_expression {
            Some(NodeShape::CallExpression)
        } else if kind == self.import_declaration {
            Some(NodeShape::ImportDeclaration)
        } else if kind == self.export_declaration {
            Some(NodeShape::ExportDeclaration)
        } else if kind == self.mapped_type {
            Some(NodeShape::MappedType)
        } else if kind == self.template_literal_type_span {
            Some(NodeShape::TemplateLiteralTypeSpan)
        } else {
            None
        }
    }

    /// The single typed predicate for the declaration emitter's embedded
    /// module reference pattern: a literal whose two most recently visited
    /// ancestor/sibling kinds are a mapped type construct followed by a
    /// template literal type span.
    #[must_use]
    pub fn looks_like_embedded_module_ref(&self, window: &KindWindow) -> bool {
        window.prev(0) == Some(self.template_literal_type_span)
            && window.prev(1) == Some(self.mapped_type)
    }
}

/// Number of recently visited kinds retained during declaration traversal.
pub const KIND_WINDOW_LEN: usize = 3;

/// Bounded ring of the most recently visited node kinds.
#[derive(Debug, Clone, Default)]
pub struct KindWindow {
    kinds: [u16; KIND_WINDOW_LEN],
    len: usize,
    head: usize,
}

impl KindWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: u16) {
        self.kinds[self.head] = kind;
        self.head = (self.head + 1) % KIND_WINDOW_LEN;
        self.len = (self.len + 1).min(KIND_WINDOW_LEN);
    }

    /// Kind pushed `n` steps before the most recent one (`prev(0)` is the
    /// most recent).
    #[must_use]
    pub fn prev(&self, n: usize) -> Option<u16> {
        if n >= self.len {
            return None;
        }
        let idx = (self.head + KIND_WINDOW_LEN - 1 - n) % KIND_WINDOW_LEN;
        Some(self.kinds[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tables_differ_across_releases() {
        let v4 = CompilerRelease::V4.kind_table();
        let v5 = CompilerRelease::V5.kind_table();
        assert_ne!(v4.string_literal, v5.string_literal);
        assert_ne!(v4.import_declaration, v5.import_declaration);
    }

    #[test]
    fn test_shape_lookup() {
        let kinds = CompilerRelease::V5.kind_table();
        assert_eq!(kinds.shape(kinds.string_literal), Some(NodeShape::StringLiteral));
        assert_eq!(kinds.shape(kinds.bundle), Some(NodeShape::Bundle));
        assert_eq!(kinds.shape(9999), None);
    }

    #[test]
    fn test_window_push_and_prev() {
        let mut window = KindWindow::new();
        assert_eq!(window.prev(0), None);

        window.push(1);
        window.push(2);
        window.push(3);
        assert_eq!(window.prev(0), Some(3));
        assert_eq!(window.prev(1), Some(2));
        assert_eq!(window.prev(2), Some(1));
        assert_eq!(window.prev(3), None);

        // Bounded: pushing a fourth evicts the oldest.
        window.push(4);
        assert_eq!(window.prev(0), Some(4));
        assert_eq!(window.prev(2), Some(2));
        assert_eq!(window.prev(3), None);
    }

    #[test]
    fn test_embedded_module_ref_predicate() {
        let kinds = CompilerRelease::V5.kind_table();
        let mut window = KindWindow::new();
        window.push(kinds.source_file);
        window.push(kinds.mapped_type);
        window.push(kinds.template_literal_type_span);
        assert!(kinds.looks_like_embedded_module_ref(&window));

        // Order matters.
        let mut reversed = KindWindow::new();
        reversed.push(kinds.template_literal_type_span);
        reversed.push(kinds.mapped_type);
        assert!(!kinds.looks_like_embedded_module_ref(&reversed));
    }

    #[test]
    fn test_node_builders() {
        let kinds = CompilerRelease::V5.kind_table();
        let lit = Node::token_at(kinds.string_literal, "./foo", Span::new(10, 15));
        let updated = lit.with_text("./foo.mjs");
        assert_eq!(updated.kind, lit.kind);
        assert_eq!(updated.span, lit.span);
        assert_eq!(updated.text.as_deref(), Some("./foo.mjs"));
    }
}
