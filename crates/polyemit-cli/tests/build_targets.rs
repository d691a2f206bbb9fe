//! Integration tests for `polyemit build` over a real emitted tree.

use serial_test::serial;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "polyemit-cli", "--bin", "polyemit", "--"]);
    cmd
}

fn write_fixture(root: &Path) {
    fs::write(
        root.join("polyemit.json"),
        r#"{
            "targets": [
                { "name": "cjs", "extname": ".cjs" },
                { "name": "esm", "extname": ".mjs", "declarationExtname": ".d.mts" }
            ],
            "projects": ["dist"],
            "compiler": { "resolveJsonModule": true }
        }"#,
    )
    .unwrap();

    let dist = root.join("dist");
    fs::create_dir_all(dist.join("lib")).unwrap();
    fs::write(dist.join("lib/index.js"), "export const lib = true;\n").unwrap();
    fs::write(dist.join("lib/util.js"), "export const n = 1;\n").unwrap();
    fs::write(
        dist.join("main.js"),
        concat!(
            "import { n } from \"./lib/util\";\n",
            "import data from \"./data.json\";\n",
            "const shim = require(\"./legacy.cjs\");\n",
            "const lazy = import(\"./lib\");\n",
            "//# sourceMappingURL=main.js.map\n",
        ),
    )
    .unwrap();
    fs::write(
        dist.join("main.js.map"),
        r#"{"version":3,"file":"main.js","sources":["../src/main.ts"],"mappings":""}"#,
    )
    .unwrap();
    fs::write(
        dist.join("main.d.ts"),
        "export { Widget } from \"./widget\";\n",
    )
    .unwrap();
    fs::write(dist.join("widget.d.ts"), "export interface Widget {}\n").unwrap();
    fs::write(dist.join("data.json"), "{\"k\":1}\n").unwrap();
}

#[test]
#[serial]
fn test_build_produces_both_targets() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());

    let output = cargo_bin()
        .args(["build", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("failed to run build command");
    assert!(
        output.status.success(),
        "build failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let dist = dir.path().join("dist");

    // Script variants for both targets, originals retained as input.
    for name in ["main.cjs", "main.mjs", "main.js", "lib/util.cjs", "lib/util.mjs"] {
        assert!(dist.join(name).exists(), "missing {name}");
    }

    let cjs = fs::read_to_string(dist.join("main.cjs")).unwrap();
    assert!(cjs.contains("from \"./lib/util.cjs\""));
    assert!(cjs.contains("import(\"./lib/index.cjs\")"));
    // Exempt specifiers survive both targets.
    assert!(cjs.contains("require(\"./legacy.cjs\")"));
    assert!(cjs.contains("from \"./data.json\""));
    assert!(cjs.contains("//# sourceMappingURL=main.cjs.map"));

    let mjs = fs::read_to_string(dist.join("main.mjs")).unwrap();
    assert!(mjs.contains("from \"./lib/util.mjs\""));
    assert!(mjs.contains("import(\"./lib/index.mjs\")"));
    assert!(mjs.contains("//# sourceMappingURL=main.mjs.map"));

    // Maps renamed with their `file` field in lockstep.
    let map: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dist.join("main.mjs.map")).unwrap()).unwrap();
    assert_eq!(map["file"], "main.mjs");
    assert_eq!(map["sources"][0], "../src/main.ts");

    // Declarations only for the esm target, which configures them.
    assert!(dist.join("main.d.mts").exists());
    assert!(!dist.join("main.d.cts").exists());
    let decl = fs::read_to_string(dist.join("main.d.mts")).unwrap();
    assert!(decl.contains("from \"./widget.d.mts\""));

    // Incremental metadata is per target.
    assert!(dist.join("polyemit.cjs.tsbuildinfo").exists());
    assert!(dist.join("polyemit.mjs.tsbuildinfo").exists());
}

#[test]
#[serial]
fn test_build_missing_config_fails() {
    let dir = tempdir().unwrap();

    let output = cargo_bin()
        .args(["build", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("failed to run build command");
    assert!(!output.status.success());
}

#[test]
#[serial]
fn test_transpile_writes_rewritten_source_to_stdout() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("entry.js");
    fs::write(&file, "import a from \"./dep\";\nconst b = require(\"./dep\");\n").unwrap();

    let output = cargo_bin()
        .args(["transpile", "--extname", ".mjs"])
        .arg(&file)
        .output()
        .expect("failed to run transpile command");
    assert!(
        output.status.success(),
        "transpile failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        "import a from \"./dep.mjs\";\nconst b = require(\"./dep.mjs\");\n"
    );
    // Transpile never touches the input file.
    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        "import a from \"./dep\";\nconst b = require(\"./dep\");\n"
    );
}
