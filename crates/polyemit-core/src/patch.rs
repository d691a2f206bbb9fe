//! Output patch pipeline.
//!
//! The concrete emit pipeline for post-processing a host compiler's emitted
//! output directory: scan each script/declaration file into a tree, run the
//! registered rewriter hooks, splice the specifier edits back by byte span,
//! and push every artifact through the rewrite file system so renames,
//! `sourceMappingURL` comments, and map payloads change together. A
//! per-target metadata file keyed by content hash skips unchanged outputs
//! on re-runs.

use crate::error::{Error, Result};
use crate::host::{EmitPipeline, EmitTransform, FileSystem, SourceUnit};
use crate::policy::OutputRole;
use crate::scan::scan_source_unit;
use crate::tree::{KindTable, Node, NodeShape, Span};
use crate::vfs::RewriteFs;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Schema version for the per-target metadata payload.
pub const BUILD_INFO_SCHEMA_VERSION: u32 = 1;

/// Per-target incremental metadata: content hash per processed file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BuildInfo {
    schema_version: u32,
    files: BTreeMap<String, String>,
}

impl BuildInfo {
    fn load<F: FileSystem>(fs: &F, path: &Path) -> Self {
        let Some(content) = fs.read(path) else {
            return Self::empty();
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(info) if info.schema_version == BUILD_INFO_SCHEMA_VERSION => info,
            Ok(_) | Err(_) => {
                // A stale or corrupt cache only costs a full re-patch.
                tracing::warn!(path = %path.display(), "discarding unreadable build metadata");
                Self::empty()
            }
        }
    }

    fn empty() -> Self {
        Self {
            schema_version: BUILD_INFO_SCHEMA_VERSION,
            files: BTreeMap::new(),
        }
    }
}

/// Aggregate result of one patch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatchSummary {
    /// Output files considered.
    pub scanned: usize,
    /// Files whose content changed during patching.
    pub patched: usize,
    /// Files written under a new name.
    pub renamed: usize,
    /// Files skipped as up to date.
    pub skipped: usize,
    /// Files abandoned on a per-file tree-shape error.
    pub failed: usize,
}

enum FileOutcome {
    Done {
        patched: bool,
        renamed: bool,
        hash: String,
    },
    Skipped {
        hash: String,
    },
    Failed,
}

/// Emit pipeline that patches emitted output in place.
///
/// Hooks are installed by the build driver; `run` drives them over an
/// output directory.
#[derive(Default)]
pub struct OutputPatcher {
    after_emit: Vec<Box<dyn EmitTransform>>,
    after_declarations: Vec<Box<dyn EmitTransform>>,
    build_info_path: Option<PathBuf>,
}

impl OutputPatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn build_info_path(&self) -> Option<&Path> {
        self.build_info_path.as_deref()
    }

    /// Patch every classified output file under `out_dir`.
    ///
    /// Tree-shape failures are fatal for their file and logged; any other
    /// error aborts the run and propagates.
    pub fn run<F: FileSystem>(
        &self,
        fs: &RewriteFs<F>,
        out_dir: &Path,
        kinds: &'static KindTable,
    ) -> Result<PatchSummary> {
        let files = collect_output_files(out_dir);
        let prior = self
            .build_info_path
            .as_deref()
            .map(|path| BuildInfo::load(fs.inner(), path));

        let outcomes: Vec<(PathBuf, Result<FileOutcome>)> = files
            .par_iter()
            .map(|path| {
                let outcome = self.patch_file(fs, out_dir, path, kinds, prior.as_ref());
                (path.clone(), outcome)
            })
            .collect();

        let mut summary = PatchSummary {
            scanned: files.len(),
            ..PatchSummary::default()
        };
        let mut next = BuildInfo::empty();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(FileOutcome::Done {
                    patched,
                    renamed,
                    hash,
                }) => {
                    summary.patched += usize::from(patched);
                    summary.renamed += usize::from(renamed);
                    next.files.insert(relative_key(out_dir, &path), hash);
                }
                Ok(FileOutcome::Skipped { hash }) => {
                    summary.skipped += 1;
                    next.files.insert(relative_key(out_dir, &path), hash);
                }
                Ok(FileOutcome::Failed) => summary.failed += 1,
                Err(err) => return Err(err),
            }
        }

        if let Some(path) = self.build_info_path.as_deref() {
            let payload = serde_json::to_string(&next)
                .map_err(|e| Error::other(format!("failed to encode build metadata: {e}")))?;
            fs.inner().write(path, &payload)?;
        }

        Ok(summary)
    }

    fn patch_file<F: FileSystem>(
        &self,
        fs: &RewriteFs<F>,
        out_dir: &Path,
        path: &Path,
        kinds: &'static KindTable,
        prior: Option<&BuildInfo>,
    ) -> Result<FileOutcome> {
        let path_str = path.to_string_lossy();
        let Some(role) = OutputRole::classify(&path_str) else {
            // collect_output_files only yields classified paths.
            return Ok(FileOutcome::Failed);
        };

        let Some(content) = fs.inner().read(path) else {
            return Err(Error::other(format!("unreadable output: {}", path.display())));
        };
        let hash = polyemit_util::hash::blake3_bytes(content.as_bytes());

        let output_path = fs.output_path(path);
        let renames = output_path != path;
        if let Some(prior) = prior {
            let key = relative_key(out_dir, path);
            if prior.files.get(&key) == Some(&hash) && fs.inner().exists(&output_path) {
                return Ok(FileOutcome::Skipped { hash });
            }
        }

        let patched_text = if role.is_map() {
            content.clone()
        } else {
            let hooks = if role.is_declaration() {
                &self.after_declarations
            } else {
                &self.after_emit
            };
            match apply_hooks(hooks, path, &content, kinds) {
                Ok(text) => text,
                Err(err) if err.is_per_file() => {
                    tracing::error!(path = %path.display(), error = %err, "skipping file");
                    return Ok(FileOutcome::Failed);
                }
                Err(err) => return Err(err),
            }
        };

        // Originals stay in place: every configured target reads the same
        // emitted tree, so the rewritten variant lands beside its input.
        let patched = patched_text != content;
        fs.write(path, &patched_text)?;
        Ok(FileOutcome::Done {
            patched,
            renamed: renames,
            hash,
        })
    }
}

impl EmitPipeline for OutputPatcher {
    fn after_emit(&mut self, hook: Box<dyn EmitTransform>) {
        self.after_emit.push(hook);
    }

    fn after_declarations(&mut self, hook: Box<dyn EmitTransform>) {
        self.after_declarations.push(hook);
    }

    fn set_build_info_path(&mut self, path: PathBuf) {
        self.build_info_path = Some(path);
    }
}

fn apply_hooks(
    hooks: &[Box<dyn EmitTransform>],
    path: &Path,
    content: &str,
    kinds: &'static KindTable,
) -> Result<String> {
    if hooks.is_empty() {
        return Ok(content.to_string());
    }
    let scanned = scan_source_unit(path, content, kinds);
    let mut unit = scanned.clone();
    for hook in hooks {
        unit = hook.transform(&unit)?;
    }
    Ok(apply_rewrites(kinds, content, &scanned, &unit))
}

/// Splice the literal rewrites between two structurally equivalent units
/// back into the text the original was scanned from.
#[must_use]
pub fn apply_rewrites(kinds: &KindTable, text: &str, old: &SourceUnit, new: &SourceUnit) -> String {
    let mut edits = Vec::new();
    collect_literal_edits(kinds, &old.root, &new.root, &mut edits);
    splice_edits(text, edits)
}

/// Walk two structurally equivalent trees and collect the spans of literals
/// whose text changed.
fn collect_literal_edits(
    kinds: &KindTable,
    old: &Node,
    new: &Node,
    edits: &mut Vec<(Span, String)>,
) {
    if kinds.shape(old.kind) == Some(NodeShape::StringLiteral) {
        if let (Some(span), Some(new_text)) = (old.span, new.text.as_deref()) {
            if old.text.as_deref() != Some(new_text) {
                edits.push((span, new_text.to_string()));
            }
        }
    }
    for (old_child, new_child) in old.children.iter().zip(&new.children) {
        collect_literal_edits(kinds, old_child, new_child, edits);
    }
}

/// Replace each span of `text` with its edit, in order.
fn splice_edits(text: &str, mut edits: Vec<(Span, String)>) -> String {
    if edits.is_empty() {
        return text.to_string();
    }
    edits.sort_by_key(|(span, _)| span.start);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        out.push_str(&text[cursor..span.start]);
        out.push_str(&replacement);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// All classified output files under `out_dir`, sorted for determinism.
fn collect_output_files(out_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(out_dir)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != "node_modules")
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| OutputRole::classify(&path.to_string_lossy()).is_some())
        .collect();
    files.sort();
    files
}

fn relative_key(out_dir: &Path, path: &Path) -> String {
    path.strip_prefix(out_dir)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
