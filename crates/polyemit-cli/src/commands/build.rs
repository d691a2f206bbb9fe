//! `polyemit build`: run the patch pipeline for every configured target.

use miette::{IntoDiagnostic, Result};
use polyemit_core::version::SCHEMA_VERSION;
use polyemit_core::{BuildDriver, DiskFileSystem, OutputPatcher, PatchSummary, ProjectConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_NAME: &str = "polyemit.json";

#[derive(Debug, Serialize)]
struct TargetReport {
    target: String,
    project: String,
    #[serde(flatten)]
    summary: PatchSummary,
}

#[derive(Debug, Serialize)]
struct BuildReport {
    ok: bool,
    schema_version: u32,
    targets: Vec<TargetReport>,
}

pub fn run(
    cwd: &Path,
    config: Option<&Path>,
    project_override: &[PathBuf],
    json: bool,
) -> Result<()> {
    let config_path = resolve(cwd, config.unwrap_or(Path::new(DEFAULT_CONFIG_NAME)));
    let config_name = config_path
        .file_name()
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_NAME), PathBuf::from);

    let project_config = ProjectConfig::load(&config_path).into_diagnostic()?;
    let projects: Vec<PathBuf> = if project_override.is_empty() {
        project_config.projects.clone()
    } else {
        project_override.to_vec()
    };

    let mut reports = Vec::new();
    for target in &project_config.targets {
        for project in &projects {
            let out_dir = resolve(cwd, project);
            let driver = BuildDriver::new(DiskFileSystem::new(), target, project_config.compiler)
                .into_diagnostic()?;
            let mut patcher = OutputPatcher::new();
            // Metadata lives beside each project's outputs so projects stay
            // independent; the name still carries the target extension.
            driver.install(&mut patcher, &out_dir.join(&config_name));

            let summary = patcher
                .run(&driver.file_system(), &out_dir, driver.kind_table())
                .into_diagnostic()?;
            tracing::info!(
                target = %target.label(),
                project = %project.display(),
                scanned = summary.scanned,
                patched = summary.patched,
                renamed = summary.renamed,
                skipped = summary.skipped,
                failed = summary.failed,
                "target processed"
            );
            reports.push(TargetReport {
                target: target.label(),
                project: project.display().to_string(),
                summary,
            });
        }
    }

    let report = BuildReport {
        ok: reports.iter().all(|r| r.summary.failed == 0),
        schema_version: SCHEMA_VERSION,
        targets: reports,
    };

    if json {
        println!("{}", serde_json::to_string(&report).into_diagnostic()?);
    } else {
        for entry in &report.targets {
            println!(
                "{} {}: {} scanned, {} patched, {} renamed, {} skipped, {} failed",
                entry.target,
                entry.project,
                entry.summary.scanned,
                entry.summary.patched,
                entry.summary.renamed,
                entry.summary.skipped,
                entry.summary.failed
            );
        }
    }

    Ok(())
}

fn resolve(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
