//! CLI subprocess integration tests.
//!
//! These tests invoke the `packwright` binary as a subprocess and verify
//! exit codes, stdout content, and JSON output stability.

use packwright_remote::testing::StubServer;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn packwright_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_packwright"));
    cmd.env_remove("CNB_STACK_ID");
    cmd.env_remove("PACKWRIGHT_LOG");
    cmd
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

struct Dep<'a> {
    version: &'a str,
    uri: String,
    sha256: String,
    stack: &'a str,
}

fn write_buildpack(dir: &Path, deps: &[Dep<'_>]) -> PathBuf {
    let root = dir.join("buildpack");
    std::fs::create_dir_all(&root).unwrap();
    let mut toml = String::from(
        r#"[buildpack]
id = "example/tool"
name = "Tool"
version = "0.1.0"

[[stacks]]
id = "s"
"#,
    );
    for dep in deps {
        toml.push_str(&format!(
            r#"
[[metadata.dependencies]]
id = "tool"
name = "Tool"
version = "{}"
uri = "{}"
sha256 = "{}"
stacks = ["{}"]
"#,
            dep.version, dep.uri, dep.sha256, dep.stack
        ));
    }
    std::fs::write(root.join("buildpack.toml"), toml).unwrap();
    root
}

/// A buildpack whose single `tool` dependency is a local file.
fn local_buildpack(dir: &Path, payload: &[u8]) -> PathBuf {
    let artifact = dir.join("tool-1.2.3.tgz");
    std::fs::write(&artifact, payload).unwrap();
    write_buildpack(
        dir,
        &[Dep {
            version: "1.2.3",
            uri: format!("file://{}", artifact.display()),
            sha256: sha256_hex(b"payload"),
            stack: "s",
        }],
    )
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn cli_version_exits_zero() {
    let output = packwright_bin().arg("--version").output().unwrap();
    assert!(output.status.success(), "packwright --version must exit 0");
    assert!(stdout(&output).contains("packwright"));
}

#[test]
fn cli_help_lists_commands() {
    let output = packwright_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let out = stdout(&output);
    for cmd in ["resolve", "fetch", "gc"] {
        assert!(out.contains(cmd), "help must list '{cmd}': {out}");
    }
}

#[test]
fn cli_resolve_picks_highest_matching_version() {
    let dir = tempfile::tempdir().unwrap();
    let sha = "a".repeat(64);
    let bp = write_buildpack(
        dir.path(),
        &[
            Dep {
                version: "1.8.5",
                uri: "https://example.com/tool-1.8.5.tgz".to_owned(),
                sha256: sha.clone(),
                stack: "s",
            },
            Dep {
                version: "1.10.0",
                uri: "https://example.com/tool-1.10.0.tgz".to_owned(),
                sha256: sha.clone(),
                stack: "s",
            },
            Dep {
                version: "1.9.0",
                uri: "https://example.com/tool-1.9.0.tgz".to_owned(),
                sha256: sha.clone(),
                stack: "s",
            },
            Dep {
                version: "2.0.0",
                uri: "https://example.com/tool-2.0.0.tgz".to_owned(),
                sha256: sha,
                stack: "other",
            },
        ],
    );

    let output = packwright_bin()
        .args(["--json", "resolve", "--buildpack"])
        .arg(&bp)
        .args(["--id", "tool", "--version", "1.*", "--stack", "s"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output))
        .unwrap_or_else(|e| panic!("resolve --json must produce valid JSON: {e}"));
    assert_eq!(json["id"], "tool");
    assert_eq!(json["version"], "1.10.0");
    assert_eq!(json["stacks"][0], "s");
}

#[test]
fn cli_resolve_uses_stack_from_env() {
    let dir = tempfile::tempdir().unwrap();
    let bp = local_buildpack(dir.path(), b"payload");

    let output = packwright_bin()
        .env("CNB_STACK_ID", "s")
        .args(["resolve", "--buildpack"])
        .arg(&bp)
        .args(["--id", "tool"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("1.2.3"));
}

#[test]
fn cli_resolve_no_match_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let bp = local_buildpack(dir.path(), b"payload");

    let output = packwright_bin()
        .args(["resolve", "--buildpack"])
        .arg(&bp)
        .args(["--id", "tool", "--version", "2.*", "--stack", "s"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(
        stderr(&output).contains("no valid dependencies for tool, 2.*, and s"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn cli_resolve_bad_constraint_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    let bp = local_buildpack(dir.path(), b"payload");

    let output = packwright_bin()
        .args(["resolve", "--buildpack"])
        .arg(&bp)
        .args(["--id", "tool", "--version", "one.two", "--stack", "s"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3), "stderr: {}", stderr(&output));
}

#[test]
fn cli_fetch_downloads_into_layers() {
    let dir = tempfile::tempdir().unwrap();
    let bp = local_buildpack(dir.path(), b"payload");
    let layers = dir.path().join("layers");
    let sha = sha256_hex(b"payload");

    let output = packwright_bin()
        .args(["--json", "fetch", "--buildpack"])
        .arg(&bp)
        .arg("--layers")
        .arg(&layers)
        .args(["--id", "tool", "--stack", "s"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let expected = layers.join(&sha).join("tool-1.2.3.tgz");
    assert_eq!(json["path"], expected.display().to_string());
    assert_eq!(json["sha256"], sha);
    assert_eq!(std::fs::read(&expected).unwrap(), b"payload");
    assert!(layers.join(format!("{sha}.toml")).is_file());
}

#[test]
fn cli_fetch_checksum_mismatch_exits_5() {
    let dir = tempfile::tempdir().unwrap();
    let bp = local_buildpack(dir.path(), b"not the payload");
    let layers = dir.path().join("layers");
    let sha = sha256_hex(b"payload");

    let output = packwright_bin()
        .args(["fetch", "--buildpack"])
        .arg(&bp)
        .arg("--layers")
        .arg(&layers)
        .args(["--id", "tool", "--stack", "s"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("sha256 mismatch"));
    assert!(!layers.join(format!("{sha}.toml")).exists());
}

#[test]
fn cli_fetch_http_error_exits_4() {
    let server = StubServer::start();
    server.route("/tool.tgz", 404, b"gone");
    let dir = tempfile::tempdir().unwrap();
    let bp = write_buildpack(
        dir.path(),
        &[Dep {
            version: "1.0.0",
            uri: server.uri("/tool.tgz"),
            sha256: sha256_hex(b"payload"),
            stack: "s",
        }],
    );

    let output = packwright_bin()
        .args(["fetch", "--buildpack"])
        .arg(&bp)
        .arg("--layers")
        .arg(dir.path().join("layers"))
        .args(["--id", "tool", "--stack", "s"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("404"));
    assert_eq!(server.requests_for("/tool.tgz"), 1);
}

#[test]
fn cli_fetch_served_over_http() {
    let server = StubServer::start();
    server.serve("/dl/tool.tgz", b"payload");
    let dir = tempfile::tempdir().unwrap();
    let bp = write_buildpack(
        dir.path(),
        &[Dep {
            version: "1.0.0",
            uri: server.uri("/dl/tool.tgz"),
            sha256: sha256_hex(b"payload"),
            stack: "s",
        }],
    );
    let layers = dir.path().join("layers");

    for _ in 0..2 {
        let output = packwright_bin()
            .args(["fetch", "--buildpack"])
            .arg(&bp)
            .arg("--layers")
            .arg(&layers)
            .args(["--id", "tool", "--stack", "s"])
            .output()
            .unwrap();
        assert!(output.status.success(), "stderr: {}", stderr(&output));
    }
    assert_eq!(server.requests(), 1);
    assert!(server
        .last_user_agent()
        .is_some_and(|ua| ua.starts_with("packwright/")));
}

#[test]
fn cli_gc_keeps_listed_layers() {
    let dir = tempfile::tempdir().unwrap();
    let layers = dir.path().join("layers");
    for name in ["jdk", "maven", "stale"] {
        std::fs::create_dir_all(layers.join(name)).unwrap();
        std::fs::write(layers.join(format!("{name}.toml")), "build = true\n").unwrap();
    }
    std::fs::write(layers.join("launch.toml"), "").unwrap();

    let dry = packwright_bin()
        .args(["--json", "gc", "--dry-run", "--keep", "jdk", "--keep", "maven", "--layers"])
        .arg(&layers)
        .output()
        .unwrap();
    assert!(dry.status.success(), "stderr: {}", stderr(&dry));
    let json: serde_json::Value = serde_json::from_str(&stdout(&dry)).unwrap();
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["untouched"], serde_json::json!(["stale"]));
    assert_eq!(json["removed"], 0);
    assert!(layers.join("stale.toml").exists());

    let real = packwright_bin()
        .args(["gc", "--keep", "jdk", "--keep", "maven", "--layers"])
        .arg(&layers)
        .output()
        .unwrap();
    assert!(real.status.success(), "stderr: {}", stderr(&real));
    assert!(stdout(&real).contains("removed 1 layer(s)"));
    assert!(!layers.join("stale.toml").exists());
    assert!(!layers.join("stale").exists());
    assert!(layers.join("jdk.toml").exists());
    assert!(layers.join("maven").is_dir());
    assert!(layers.join("launch.toml").exists());
}

#[test]
fn cli_gc_rejects_invalid_layer_name() {
    let dir = tempfile::tempdir().unwrap();
    let output = packwright_bin()
        .args(["gc", "--keep", "../escape", "--layers"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3), "stderr: {}", stderr(&output));
}
