//! Emitted-output scanner.
//!
//! Lifts an already-serialized script or declaration file into the tree
//! model: every specifier-bearing construct becomes a node, with the byte
//! span of the specifier literal retained so rewrites can be spliced back
//! into the text. This is the in-repo tree producer for the patch pipeline;
//! hosts with a richer emitter hand in their own trees through the same
//! transform boundary.
//!
//! The walk is token-level, not a parse: comments and string bodies are
//! skipped, everything else is keyword matching. Good enough for emitted
//! output, which is machine-formatted.

use crate::host::SourceUnit;
use crate::tree::{KindTable, Node, Span};
use std::path::Path;

/// Cap on how far a single import/export statement is scanned for its
/// specifier, to bound pathological inputs.
const STATEMENT_SCAN_LIMIT: usize = 1000;

/// Scan emitted text into a source-file tree.
#[must_use]
pub fn scan_source_unit(path: &Path, text: &str, kinds: &'static KindTable) -> SourceUnit {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut children = Vec::new();
    let mut i = 0;

    while i < len {
        let b = bytes[i];

        // Line comments
        if b == b'/' && i + 1 < len && bytes[i + 1] == b'/' {
            while i < len && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        // Block comments
        if b == b'/' && i + 1 < len && bytes[i + 1] == b'*' {
            i += 2;
            while i + 1 < len && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                i += 1;
            }
            i = (i + 2).min(len);
            continue;
        }

        if matches_keyword(bytes, i, b"import") {
            if let Some((node, end)) = scan_import(text, bytes, i + 6, kinds) {
                children.push(node);
                i = end;
                continue;
            }
            i += 6;
            continue;
        }

        if matches_keyword(bytes, i, b"export") {
            if let Some((node, end)) = scan_export_from(text, bytes, i + 6, kinds) {
                children.push(node);
                i = end;
                continue;
            }
            i += 6;
            continue;
        }

        if matches_keyword(bytes, i, b"require") {
            if let Some((node, end)) = scan_require(text, bytes, i + 7, kinds) {
                children.push(node);
                i = end;
                continue;
            }
            i += 7;
            continue;
        }

        // Skip over unrelated string/template bodies so quoted text never
        // fakes a construct.
        if b == b'"' || b == b'\'' || b == b'`' {
            i = skip_string(bytes, i);
            continue;
        }

        i += 1;
    }

    SourceUnit::new(path, Node::with_children(kinds.source_file, children))
}

fn matches_keyword(bytes: &[u8], pos: usize, keyword: &[u8]) -> bool {
    if pos + keyword.len() > bytes.len() || &bytes[pos..pos + keyword.len()] != keyword {
        return false;
    }
    if pos > 0 && is_ident_byte(bytes[pos - 1]) {
        return false;
    }
    // Member access like `module.require(...)` still makes the first
    // argument a module specifier, so only a following identifier byte
    // breaks the match.
    if pos + keyword.len() < bytes.len() && is_ident_byte(bytes[pos + keyword.len()]) {
        return false;
    }
    true
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Advance past a quoted string starting at `i` (which holds the quote).
fn skip_string(bytes: &[u8], i: usize) -> usize {
    let quote = bytes[i];
    let mut j = i + 1;
    while j < bytes.len() {
        if bytes[j] == b'\\' {
            j += 2;
            continue;
        }
        if bytes[j] == quote {
            return j + 1;
        }
        j += 1;
    }
    j
}

/// Extract a quoted specifier starting at `i`. Returns (span, end) where the
/// span covers the text between the quotes.
fn scan_quoted(bytes: &[u8], i: usize) -> Option<(Span, usize)> {
    let quote = bytes.get(i)?;
    if *quote != b'"' && *quote != b'\'' && *quote != b'`' {
        return None;
    }
    let start = i + 1;
    let mut j = start;
    while j < bytes.len() {
        if bytes[j] == b'\\' {
            j += 2;
            continue;
        }
        if bytes[j] == *quote {
            return Some((Span::new(start, j), j + 1));
        }
        if bytes[j] == b'\n' {
            return None;
        }
        j += 1;
    }
    None
}

fn literal_node(text: &str, span: Span, kinds: &KindTable) -> Node {
    Node::token_at(kinds.string_literal, &text[span.start..span.end], span)
}

/// Scan past the `import` keyword: either a dynamic `import(...)` call or a
/// static declaration (`import ... from "..."` / side-effect `import "..."`).
fn scan_import(
    text: &str,
    bytes: &[u8],
    after_keyword: usize,
    kinds: &'static KindTable,
) -> Option<(Node, usize)> {
    let mut i = skip_ws(bytes, after_keyword);

    // Dynamic import: import("...")
    if bytes.get(i) == Some(&b'(') {
        i = skip_ws(bytes, i + 1);
        let (span, end) = scan_quoted(bytes, i)?;
        let node = Node::with_children(
            kinds.call_expression,
            vec![
                Node::token(kinds.import_keyword, "import"),
                literal_node(text, span, kinds),
            ],
        );
        return Some((node, end));
    }

    // `import.meta` and similar member accesses are not declarations.
    if bytes.get(i) == Some(&b'.') {
        return None;
    }

    // Side-effect import: import "..."
    if let Some((span, end)) = scan_quoted(bytes, i) {
        let node = Node::with_children(kinds.import_declaration, vec![literal_node(text, span, kinds)]);
        return Some((node, end));
    }

    // Static import with clause: scan ahead for `from "..."`.
    let limit = (i + STATEMENT_SCAN_LIMIT).min(bytes.len());
    while i < limit {
        if bytes[i] == b';' || bytes[i] == b'"' || bytes[i] == b'\'' {
            return None;
        }
        if matches_keyword(bytes, i, b"from") {
            let j = skip_ws(bytes, i + 4);
            let (span, end) = scan_quoted(bytes, j)?;
            let node =
                Node::with_children(kinds.import_declaration, vec![literal_node(text, span, kinds)]);
            return Some((node, end));
        }
        i += 1;
    }
    None
}

/// Scan past the `export` keyword for a re-export: `export ... from "..."`.
fn scan_export_from(
    text: &str,
    bytes: &[u8],
    after_keyword: usize,
    kinds: &'static KindTable,
) -> Option<(Node, usize)> {
    let mut i = after_keyword;
    let limit = (i + STATEMENT_SCAN_LIMIT).min(bytes.len());
    while i < limit {
        if bytes[i] == b';' || bytes[i] == b'"' || bytes[i] == b'\'' {
            return None;
        }
        if matches_keyword(bytes, i, b"from") {
            let j = skip_ws(bytes, i + 4);
            let (span, end) = scan_quoted(bytes, j)?;
            let node =
                Node::with_children(kinds.export_declaration, vec![literal_node(text, span, kinds)]);
            return Some((node, end));
        }
        i += 1;
    }
    None
}

/// Scan a `require("...")` call.
fn scan_require(
    text: &str,
    bytes: &[u8],
    after_keyword: usize,
    kinds: &'static KindTable,
) -> Option<(Node, usize)> {
    let mut i = skip_ws(bytes, after_keyword);
    if bytes.get(i) != Some(&b'(') {
        return None;
    }
    i = skip_ws(bytes, i + 1);
    let (span, end) = scan_quoted(bytes, i)?;
    let node = Node::with_children(
        kinds.call_expression,
        vec![
            Node::token(kinds.identifier, "require"),
            literal_node(text, span, kinds),
        ],
    );
    Some((node, end))
}
