//! `polyemit transpile`: single-file rewrite without a full build.

use miette::{IntoDiagnostic, Result};
use polyemit_core::patch::apply_rewrites;
use polyemit_core::{
    scan_source_unit, BuildDriver, CompilerOptions, DiskFileSystem, Target,
};
use std::path::Path;

pub fn run(cwd: &Path, file: &Path, extname: &str, resolve_json: bool) -> Result<()> {
    let path = if file.is_absolute() {
        file.to_path_buf()
    } else {
        cwd.join(file)
    };

    let target = Target {
        name: None,
        extname: Some(extname.to_string()),
        declaration_extname: None,
    };
    let options = CompilerOptions {
        resolve_json_module: resolve_json,
        incremental: false,
        ..CompilerOptions::default()
    };
    let driver = BuildDriver::new(DiskFileSystem::new(), &target, options).into_diagnostic()?;

    let content = std::fs::read_to_string(&path).into_diagnostic()?;
    let unit = scan_source_unit(&path, &content, driver.kind_table());
    let rewritten = driver.transpile(&unit).into_diagnostic()?;

    print!(
        "{}",
        apply_rewrites(driver.kind_table(), &content, &unit, &rewritten)
    );
    Ok(())
}
