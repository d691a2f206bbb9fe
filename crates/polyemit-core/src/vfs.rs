//! Virtual file system adapter.
//!
//! Overlays a host [`FileSystem`] so that writes land at policy-rewritten
//! paths while reads fall back between the rewritten and original layouts.
//! Written artifacts have their embedded cross-references patched on the way
//! out: script and declaration files get the trailing `sourceMappingURL`
//! comment rewritten, map payloads get their `file` field rewritten. Every
//! capability not listed here passes through untouched.

use crate::error::{Error, Result};
use crate::host::FileSystem;
use crate::policy::{ExtensionPolicy, OutputRole, SCRIPT_SUFFIX};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

const SOURCE_MAP_COMMENT: &str = "//# sourceMappingURL=";

/// Ordered resolution strategies for `exists`/`read`.
///
/// Sources may be pre-compiled scripts or typed sources, chosen per file;
/// a lookup tries the rewritten layout first and falls back to the original
/// on-disk layout for script paths. A future source kind slots in as another
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadStrategy {
    /// The policy-rewritten path, with declaration rewriting suppressed so
    /// the host's bundled library declarations keep resolving.
    Rewritten,
    /// The original path, tried only for script-suffixed lookups where a
    /// pre-compiled file may coexist with typed sources.
    Original,
}

const READ_STRATEGIES: &[ReadStrategy] = &[ReadStrategy::Rewritten, ReadStrategy::Original];

/// File system overlay that renames outputs per target.
#[derive(Debug)]
pub struct RewriteFs<F> {
    inner: F,
    policy: ExtensionPolicy,
}

impl<F: FileSystem> RewriteFs<F> {
    #[must_use]
    pub fn new(inner: F, policy: ExtensionPolicy) -> Self {
        Self { inner, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &ExtensionPolicy {
        &self.policy
    }

    /// The wrapped host file system.
    #[must_use]
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// The path a write against `path` will actually land at.
    #[must_use]
    pub fn output_path(&self, path: &Path) -> PathBuf {
        self.policy.rewrite_path(path, false)
    }

    fn read_candidates(&self, path: &Path) -> Vec<PathBuf> {
        let path_str = path.to_string_lossy();
        let mut candidates = Vec::with_capacity(READ_STRATEGIES.len());
        for strategy in READ_STRATEGIES {
            let candidate = match strategy {
                ReadStrategy::Rewritten => {
                    PathBuf::from(self.policy.rewrite_str(&path_str, true).into_owned())
                }
                ReadStrategy::Original => {
                    if !path_str.ends_with(SCRIPT_SUFFIX) {
                        continue;
                    }
                    path.to_path_buf()
                }
            };
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
        candidates
    }

    /// Patch content before it is written under its rewritten name.
    fn patch_content<'a>(&self, path: &Path, content: &'a str) -> Result<Cow<'a, str>> {
        let path_str = path.to_string_lossy();
        let Some(role) = OutputRole::classify(&path_str) else {
            return Ok(Cow::Borrowed(content));
        };
        if !self.policy.rewrites_role(role) {
            return Ok(Cow::Borrowed(content));
        }
        if role.is_map() {
            self.patch_map_payload(path, content).map(Cow::Owned)
        } else {
            Ok(self.patch_source_map_comment(content))
        }
    }

    /// Rewrite the path in a trailing `//# sourceMappingURL=` comment.
    fn patch_source_map_comment<'a>(&self, content: &'a str) -> Cow<'a, str> {
        let Some(idx) = content.rfind(SOURCE_MAP_COMMENT) else {
            return Cow::Borrowed(content);
        };
        let url_start = idx + SOURCE_MAP_COMMENT.len();
        let url_end = content[url_start..]
            .find('\n')
            .map_or(content.len(), |i| url_start + i);
        let url = content[url_start..url_end].trim_end();
        let url_stop = url_start + url.len();

        let rewritten = self.policy.rewrite_str(url, false);
        if rewritten == url {
            return Cow::Borrowed(content);
        }
        let mut patched = String::with_capacity(content.len() + rewritten.len());
        patched.push_str(&content[..url_start]);
        patched.push_str(&rewritten);
        patched.push_str(&content[url_stop..]);
        Cow::Owned(patched)
    }

    /// Rewrite the `file` field of a source map payload.
    ///
    /// Map files are produced moments earlier by the same process, so a
    /// parse failure here is fatal for the write.
    fn patch_map_payload(&self, path: &Path, content: &str) -> Result<String> {
        let mut payload: serde_json::Value =
            serde_json::from_str(content).map_err(|source| Error::MapParse {
                path: path.to_path_buf(),
                source,
            })?;
        let rewritten = payload
            .get("file")
            .and_then(serde_json::Value::as_str)
            .map(|file| self.policy.rewrite_str(file, false).into_owned());
        if let Some(file) = rewritten {
            payload["file"] = serde_json::Value::String(file);
        }
        Ok(payload.to_string())
    }
}

impl<F: FileSystem> FileSystem for RewriteFs<F> {
    fn exists(&self, path: &Path) -> bool {
        self.read_candidates(path)
            .iter()
            .any(|candidate| self.inner.exists(candidate))
    }

    fn is_directory(&self, path: &Path) -> bool {
        self.inner.is_directory(path)
    }

    fn read(&self, path: &Path) -> Option<String> {
        self.read_candidates(path)
            .iter()
            .find_map(|candidate| self.inner.read(candidate))
    }

    fn write(&self, path: &Path, data: &str) -> Result<()> {
        let patched = self.patch_content(path, data)?;
        self.inner.write(&self.output_path(path), &patched)
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.inner.delete(&self.output_path(path))
    }
}
