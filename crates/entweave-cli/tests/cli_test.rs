use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

const FLEET: &str = r#"
module: fleet
classes:
  - name: fleet.Vehicle
    entity: true
    members:
      - field: { name: _color, type: String }
      - property: { name: color, type: String, backing: _color }
  - name: fleet.Car
    entity: true
    extends: fleet.Vehicle
"#;

const COLLISION: &str = r#"
module: broken
classes:
  - name: broken.Car
    entity: true
    members:
      - field: { name: __type_name, type: String }
"#;

#[test]
fn test_weave_installs_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    std::fs::create_dir(&models).unwrap();
    std::fs::write(models.join("fleet.yaml"), FLEET).unwrap();

    cargo_bin_cmd!("entweave")
        .args(["--config", dir.path().to_str().unwrap(), "weave"])
        .arg(&models)
        .assert()
        .success();

    let installed = dir.path().join(".entweave/output/fleet.woven.yaml");
    assert!(installed.exists(), "fleet.woven.yaml should be installed");
    let woven = std::fs::read_to_string(installed).unwrap();
    assert!(woven.contains("woven:"));
    assert!(woven.contains("__id"));

    // Second run is served from the cache
    cargo_bin_cmd!("entweave")
        .args(["--config", dir.path().to_str().unwrap(), "weave"])
        .arg(&models)
        .assert()
        .success();
}

#[test]
fn test_weave_exits_with_first_error_code() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.yaml");
    std::fs::write(&input, COLLISION).unwrap();

    cargo_bin_cmd!("entweave")
        .args(["--config", dir.path().to_str().unwrap(), "weave"])
        .arg(&input)
        .assert()
        .code(12)
        .stderr(predicate::str::contains("EW0012"));

    assert!(!dir.path().join(".entweave/output/broken.woven.yaml").exists());
}

#[test]
fn test_msbuild_lines() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.yaml");
    std::fs::write(&input, COLLISION).unwrap();

    cargo_bin_cmd!("entweave")
        .args(["--config", dir.path().to_str().unwrap(), "weave", "--msbuild"])
        .arg(&input)
        .assert()
        .code(12)
        .stdout(predicate::str::contains(": error EW0012: "));
}

#[test]
fn test_cache_only_and_check() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("fleet.yaml");
    std::fs::write(&input, FLEET).unwrap();
    let out = dir.path().join("out");

    cargo_bin_cmd!("entweave")
        .args(["--config", dir.path().to_str().unwrap(), "check"])
        .arg(&input)
        .assert()
        .success();

    cargo_bin_cmd!("entweave")
        .args(["--config", dir.path().to_str().unwrap(), "weave", "--cache-only"])
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    assert!(!out.exists());
    assert!(dir.path().join(".entweave/cache").exists());
}

#[test]
fn test_clean_removes_stale_versions() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    std::fs::create_dir_all(cache.join("0.0.0-old")).unwrap();
    std::fs::write(cache.join("0.0.0-old/abc.woven.yaml"), "module: m").unwrap();

    cargo_bin_cmd!("entweave")
        .args(["--config", dir.path().to_str().unwrap(), "clean", "--cache"])
        .arg(&cache)
        .assert()
        .success();

    assert!(!cache.join("0.0.0-old").exists());
}

#[test]
fn test_missing_module_fails() {
    let dir = tempfile::tempdir().unwrap();

    cargo_bin_cmd!("entweave")
        .args(["--config", dir.path().to_str().unwrap(), "weave"])
        .arg(dir.path().join("nope.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Module not found"));
}

#[test]
fn test_empty_directory_fails_for_weave_and_check() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    std::fs::create_dir(&models).unwrap();

    for command in ["weave", "check"] {
        cargo_bin_cmd!("entweave")
            .args(["--config", dir.path().to_str().unwrap(), command])
            .arg(&models)
            .assert()
            .failure()
            .stderr(predicate::str::contains("No module files found"));
    }
}
