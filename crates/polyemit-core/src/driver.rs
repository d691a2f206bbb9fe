//! Build driver.
//!
//! Configures the host compiler's emit orchestration for one target: wires
//! the rewrite file system, installs the specifier rewriters as post-emit
//! and post-declaration-emit hooks, and separates the incremental metadata
//! file per target so concurrent target builds never share a cache file.

use crate::config::{CompilerOptions, Target};
use crate::dts::DeclarationRewriter;
use crate::error::Result;
use crate::host::{EmitPipeline, FileSystem, SourceUnit};
use crate::rewrite::SpecifierRewriter;
use crate::tree::KindTable;
use crate::vfs::RewriteFs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name suffix of the host's incremental metadata artifact.
pub const BUILD_INFO_SUFFIX: &str = ".tsbuildinfo";

/// Per-target build orchestration.
pub struct BuildDriver<F: FileSystem> {
    fs: Arc<RewriteFs<F>>,
    options: CompilerOptions,
    kinds: &'static KindTable,
}

impl<F: FileSystem + 'static> BuildDriver<F> {
    /// Wrap a host file system for one target.
    ///
    /// Fails on invalid target configuration, before any build step runs.
    pub fn new(host_fs: F, target: &Target, options: CompilerOptions) -> Result<Self> {
        let policy = target.policy()?;
        Ok(Self {
            fs: Arc::new(RewriteFs::new(host_fs, policy)),
            options,
            kinds: options.release.kind_table(),
        })
    }

    /// The rewrite file system the host compiler must emit through.
    #[must_use]
    pub fn file_system(&self) -> Arc<RewriteFs<F>> {
        Arc::clone(&self.fs)
    }

    #[must_use]
    pub fn kind_table(&self) -> &'static KindTable {
        self.kinds
    }

    /// Install this target's hooks on the host's emit pipeline.
    ///
    /// The script rewriter runs after emission when a script extension is
    /// configured; the declaration rewriter runs after declaration emission
    /// only when a declaration extension is configured. With incremental
    /// compilation, the metadata file moves to its target-specific path.
    pub fn install(&self, pipeline: &mut dyn EmitPipeline, config_path: &Path) {
        let policy = self.fs.policy();
        if let Some(ext) = policy.script_extname() {
            pipeline.after_emit(Box::new(SpecifierRewriter::new(
                Arc::clone(&self.fs),
                self.kinds,
                ext,
                self.options.resolve_json_module,
            )));
        }
        if let Some(ext) = policy.declaration_extname() {
            pipeline.after_declarations(Box::new(DeclarationRewriter::new(
                Arc::clone(&self.fs),
                self.kinds,
                ext,
                self.options.resolve_json_module,
            )));
        }
        if let Some(path) = self.build_info_path(config_path) {
            pipeline.set_build_info_path(path);
        }
    }

    /// The per-target incremental metadata path:
    /// `<config-base-name><scriptExt>.tsbuildinfo` beside the config file.
    ///
    /// `None` when the project is not incremental or no script extension is
    /// configured (the host's own default location is then collision-free).
    #[must_use]
    pub fn build_info_path(&self, config_path: &Path) -> Option<PathBuf> {
        if !self.options.incremental {
            return None;
        }
        let ext = self.fs.policy().script_extname()?;
        let stem = config_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("polyemit");
        Some(config_path.with_file_name(format!("{stem}{ext}{BUILD_INFO_SUFFIX}")))
    }

    /// Transpile-only path: rewrite a single emitted unit without a full
    /// program build. Reuses the script rewriter; declaration output does
    /// not exist in this mode.
    pub fn transpile(&self, unit: &SourceUnit) -> Result<SourceUnit> {
        match self.fs.policy().script_extname() {
            Some(ext) => SpecifierRewriter::new(
                Arc::clone(&self.fs),
                self.kinds,
                ext,
                self.options.resolve_json_module,
            )
            .rewrite_unit(unit),
            None => Ok(unit.clone()),
        }
    }
}
