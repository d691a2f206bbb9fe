//! Output path policy.
//!
//! Pure suffix-based classification of emitted artifacts and the rewrite
//! rules that map an output path to its per-target renamed path. No state,
//! no I/O; everything else in the engine builds on these functions.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Suffix of emitted script files.
pub const SCRIPT_SUFFIX: &str = ".js";
/// Suffix of emitted script source maps.
pub const SCRIPT_MAP_SUFFIX: &str = ".js.map";
/// Suffix of emitted declaration files.
pub const DECLARATION_SUFFIX: &str = ".d.ts";
/// Suffix of emitted declaration source maps.
pub const DECLARATION_MAP_SUFFIX: &str = ".d.ts.map";

const MAP_TAIL: &str = ".map";

/// Classification of an emitted artifact, derived purely from its suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputRole {
    Script,
    ScriptMap,
    Declaration,
    DeclarationMap,
}

impl OutputRole {
    /// Classify a path by its suffix.
    ///
    /// Longer suffixes are checked first so map files are never
    /// mis-classified as their non-map counterpart (`.d.ts.map` before
    /// `.d.ts`, `.js.map` before `.js`). Every path matches at most one
    /// role; anything else returns `None` and passes through unchanged.
    #[must_use]
    pub fn classify(path: &str) -> Option<Self> {
        if path.ends_with(DECLARATION_MAP_SUFFIX) {
            Some(Self::DeclarationMap)
        } else if path.ends_with(DECLARATION_SUFFIX) {
            Some(Self::Declaration)
        } else if path.ends_with(SCRIPT_MAP_SUFFIX) {
            Some(Self::ScriptMap)
        } else if path.ends_with(SCRIPT_SUFFIX) {
            Some(Self::Script)
        } else {
            None
        }
    }

    /// The role-specific suffix this role replaces.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Script => SCRIPT_SUFFIX,
            Self::ScriptMap => SCRIPT_MAP_SUFFIX,
            Self::Declaration => DECLARATION_SUFFIX,
            Self::DeclarationMap => DECLARATION_MAP_SUFFIX,
        }
    }

    /// Whether this role is a declaration artifact (declaration or its map).
    #[must_use]
    pub fn is_declaration(self) -> bool {
        matches!(self, Self::Declaration | Self::DeclarationMap)
    }

    /// Whether this role is a source map artifact.
    #[must_use]
    pub fn is_map(self) -> bool {
        matches!(self, Self::ScriptMap | Self::DeclarationMap)
    }
}

/// Per-target extension configuration.
///
/// An unset extension means "do not rewrite this artifact kind"; script and
/// declaration outputs are rewritten independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionPolicy {
    extname: Option<String>,
    declaration_extname: Option<String>,
}

impl ExtensionPolicy {
    #[must_use]
    pub fn new(extname: Option<String>, declaration_extname: Option<String>) -> Self {
        Self {
            extname,
            declaration_extname,
        }
    }

    /// The configured script extension (e.g. `.mjs`), if any.
    #[must_use]
    pub fn script_extname(&self) -> Option<&str> {
        self.extname.as_deref()
    }

    /// The configured declaration extension (e.g. `.d.mts`), if any.
    #[must_use]
    pub fn declaration_extname(&self) -> Option<&str> {
        self.declaration_extname.as_deref()
    }

    /// Whether this policy rewrites the given role at all.
    #[must_use]
    pub fn rewrites_role(&self, role: OutputRole) -> bool {
        if role.is_declaration() {
            self.declaration_extname.is_some()
        } else {
            self.extname.is_some()
        }
    }

    /// Rewrite an output path according to its role.
    ///
    /// `ignore_declarations` exempts declaration artifacts regardless of
    /// configuration; read paths use it so lookups against the host
    /// compiler's bundled standard-library declarations are never rewritten
    /// into paths that do not exist.
    #[must_use]
    pub fn rewrite_str<'a>(&self, path: &'a str, ignore_declarations: bool) -> Cow<'a, str> {
        match OutputRole::classify(path) {
            Some(OutputRole::Script) => swap_suffix(path, SCRIPT_SUFFIX, self.extname.as_deref(), ""),
            Some(OutputRole::ScriptMap) => {
                swap_suffix(path, SCRIPT_MAP_SUFFIX, self.extname.as_deref(), MAP_TAIL)
            }
            Some(OutputRole::Declaration) if !ignore_declarations => swap_suffix(
                path,
                DECLARATION_SUFFIX,
                self.declaration_extname.as_deref(),
                "",
            ),
            Some(OutputRole::DeclarationMap) if !ignore_declarations => swap_suffix(
                path,
                DECLARATION_MAP_SUFFIX,
                self.declaration_extname.as_deref(),
                MAP_TAIL,
            ),
            _ => Cow::Borrowed(path),
        }
    }

    /// [`Self::rewrite_str`] over `Path` values.
    #[must_use]
    pub fn rewrite_path(&self, path: &Path, ignore_declarations: bool) -> PathBuf {
        let s = path.to_string_lossy();
        PathBuf::from(self.rewrite_str(&s, ignore_declarations).into_owned())
    }
}

fn swap_suffix<'a>(path: &'a str, suffix: &str, ext: Option<&str>, tail: &str) -> Cow<'a, str> {
    match ext {
        None => Cow::Borrowed(path),
        Some(ext) => {
            let base = &path[..path.len() - suffix.len()];
            Cow::Owned(format!("{base}{ext}{tail}"))
        }
    }
}
