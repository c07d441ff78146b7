//! Exit codes and output of the `packsplit` binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn packsplit() -> Command {
    let mut cmd = Command::cargo_bin("packsplit").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("LLM_API_KEY")
        .env_remove("PACKSPLIT_TARGET_TOKENS")
        .env_remove("PACKSPLIT_ENCODING")
        .env_remove("PACKSPLIT_BUFFER_RATIO")
        .env_remove("PACKSPLIT_MAX_DEPTH")
        .env("PACKSPLIT_PACKAGER", "builtin");
    cmd
}

fn small_repo() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("src")).unwrap();
    fs::write(tmp.path().join("src/lib.rs"), "pub fn answer() -> u32 { 42 }\n").unwrap();
    fs::write(tmp.path().join("README.md"), "# demo\n").unwrap();
    tmp
}

fn split_repo() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    for (dir, count) in [("big", 8), ("small", 2)] {
        let dir = tmp.path().join(dir);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..count {
            fs::write(dir.join(format!("f{i}.txt")), "x".repeat(1_000)).unwrap();
        }
    }
    tmp
}

#[test]
fn help_exits_zero() {
    packsplit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn unknown_flag_exits_three() {
    packsplit().arg("--frobnicate").assert().code(3);
}

#[test]
fn bad_number_exits_three() {
    packsplit().args(["-t", "many"]).assert().code(3);
}

#[test]
fn bad_encoding_exits_three() {
    let repo = small_repo();
    packsplit()
        .arg(repo.path())
        .args(["--skip-ai", "-e", "latin1"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Unsupported encoding"));
}

#[test]
fn missing_directory_exits_one() {
    let tmp = tempfile::tempdir().unwrap();
    packsplit()
        .arg(tmp.path().join("nope"))
        .arg("--skip-ai")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot read directory"));
}

#[test]
fn existing_config_exits_sixty_four_and_keeps_file() {
    let repo = small_repo();
    let config = repo.path().join("repomix.config.json");
    fs::write(&config, "{}").unwrap();

    packsplit()
        .arg(repo.path())
        .arg("--skip-ai")
        .assert()
        .code(64)
        .stderr(predicate::str::contains("--force"));

    assert_eq!(fs::read_to_string(&config).unwrap(), "{}");
    assert!(!repo.path().join("repomix-output.xml").exists());
}

#[test]
fn conflict_is_checked_before_tool() {
    let repo = small_repo();
    fs::write(repo.path().join("repomix.config.json"), "{}").unwrap();

    packsplit()
        .env("PACKSPLIT_PACKAGER", "packsplit-no-such-tool")
        .arg(repo.path())
        .arg("--skip-ai")
        .assert()
        .code(64);
}

#[test]
fn missing_tool_exits_two() {
    let repo = small_repo();
    packsplit()
        .env("PACKSPLIT_PACKAGER", "packsplit-no-such-tool")
        .arg(repo.path())
        .arg("--skip-ai")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("packsplit-no-such-tool"));
    assert!(!repo.path().join("repomix.config.json").exists());
}

#[test]
fn dry_run_tolerates_missing_tool_and_writes_nothing() {
    let repo = small_repo();
    fs::write(repo.path().join("repomix.config.json"), "{}").unwrap();

    packsplit()
        .env("PACKSPLIT_PACKAGER", "packsplit-no-such-tool")
        .arg(repo.path())
        .args(["--skip-ai", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would write 1 packaging unit"))
        .stdout(predicate::str::contains("already exists"));

    assert_eq!(
        fs::read_to_string(repo.path().join("repomix.config.json")).unwrap(),
        "{}"
    );
}

#[test]
fn writes_single_unit() {
    let repo = small_repo();
    packsplit()
        .arg(repo.path())
        .arg("--skip-ai")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 1 packaging unit"));

    let text = fs::read_to_string(repo.path().join("repomix.config.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["output"]["filePath"], "repomix-output.xml");
    assert!(repo.path().join("repomix-output.xml").is_file());
}

#[test]
fn splits_and_flags_over_budget_units() {
    let repo = split_repo();
    packsplit()
        .arg(repo.path())
        .args(["--skip-ai", "-t", "2400", "--buffer-ratio", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 packaging unit"));

    assert!(repo.path().join("big/repomix-big.config.json").is_file());
    assert!(repo.path().join("repomix-output-big.xml").is_file());
    let root = fs::read_to_string(repo.path().join("repomix.config.json")).unwrap();
    assert!(root.contains("\"big/**\""));
}

#[test]
fn quiet_prints_nothing_on_success() {
    let repo = small_repo();
    packsplit()
        .arg(repo.path())
        .args(["--skip-ai", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn force_overwrites_existing_config() {
    let repo = small_repo();
    let config = repo.path().join("repomix.config.json");
    fs::write(&config, "{}").unwrap();

    packsplit()
        .arg(repo.path())
        .args(["--skip-ai", "--force"])
        .assert()
        .success();

    assert!(fs::read_to_string(&config).unwrap().contains("customPatterns"));
}

#[test]
fn output_dir_override() {
    let repo = small_repo();
    let out = tempfile::tempdir().unwrap();
    packsplit()
        .arg(repo.path())
        .arg("--skip-ai")
        .arg("-o")
        .arg(out.path())
        .assert()
        .success();

    assert!(out.path().join("repomix-output.xml").is_file());
    assert!(!repo.path().join("repomix-output.xml").exists());
}

#[cfg(unix)]
#[test]
fn relative_paths_resolve_against_invocation_dir() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempfile::tempdir().unwrap();
    for (dir, count) in [("repo/big", 8), ("repo/small", 2)] {
        let dir = tmp.path().join(dir);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..count {
            fs::write(dir.join(format!("f{i}.txt")), "x".repeat(1_000)).unwrap();
        }
    }
    // Writes the unit's text files to wherever `--output` points.
    let tool = tmp.path().join("fake-packager.sh");
    fs::write(
        &tool,
        "#!/bin/sh\nout=\"\"\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = --output ]; then out=\"$2\"; fi\n  shift\ndone\nfind . -type f -name 'f*.txt' -exec cat {} + > \"$out\"\n",
    )
    .unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

    packsplit()
        .current_dir(tmp.path())
        .env("PACKSPLIT_PACKAGER", &tool)
        .args(["repo", "--skip-ai", "-t", "2400", "--buffer-ratio", "0", "-o", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 packaging unit"));

    let out = tmp.path().join("out");
    assert!(out.join("repomix-output.xml").is_file());
    assert!(out.join("repomix-output-big.xml").is_file());
    assert!(!tmp.path().join("repo/out").exists());
    assert!(!tmp.path().join("repo/big/repomix-output-big.xml").exists());

    let text = fs::read_to_string(tmp.path().join("repo/repomix.config.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["output"]["filePath"], "../out/repomix-output.xml");
}
