//! End-to-end flows through `BuildSession` against an in-process HTTP server.

use packwright_core::{BuildSession, CoreError, ErrorKind, SessionConfig};
use packwright_remote::testing::StubServer;
use packwright_remote::TransportConfig;
use packwright_store::{ContributeOutcome, Layer, LayerFlags};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn write_buildpack(root: &Path, server: &StubServer, checksum: &str) {
    fs::create_dir_all(root).unwrap();
    let descriptor = format!(
        r#"
[buildpack]
id = "example/x"
name = "X"
version = "0.0.1"

[[stacks]]
id = "s"

[[metadata.dependencies]]
id = "x"
name = "X Runtime"
version = "1.0.0"
uri = "{uri}"
sha256 = "{checksum}"
stacks = ["s"]

  [[metadata.dependencies.licenses]]
  type = "MIT"
"#,
        uri = server.uri("/f"),
    );
    fs::write(root.join("buildpack.toml"), descriptor).unwrap();
}

struct Env {
    _dir: tempfile::TempDir,
    buildpack: PathBuf,
    layers: PathBuf,
}

impl Env {
    fn new(server: &StubServer, checksum: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let buildpack = dir.path().join("buildpack");
        let layers = dir.path().join("layers");
        write_buildpack(&buildpack, server, checksum);
        Self {
            _dir: dir,
            buildpack,
            layers,
        }
    }

    fn session(&self) -> BuildSession {
        let config = SessionConfig::new(&self.layers)
            .with_buildpack(&self.buildpack)
            .with_stack("s")
            .with_transport(TransportConfig::default().with_timeout(Duration::from_secs(10)));
        BuildSession::from_config(config).unwrap()
    }
}

#[test]
fn resolve_and_fetch_once() {
    let server = StubServer::start();
    server.serve("/f", b"payload");
    let checksum = sha256_hex(b"payload");
    let env = Env::new(&server, &checksum);
    let session = env.session();

    let entry = session.resolve("x", "1.0").unwrap();
    assert_eq!(entry.id, "x");
    assert_eq!(entry.version.to_string(), "1.0.0");
    entry.validate().unwrap();

    let path = session.artifact(&entry).unwrap();
    assert_eq!(path, env.layers.join(&checksum).join("f"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "payload");
    assert_eq!(server.requests_for("/f"), 1);

    let again = session.artifact(&entry).unwrap();
    assert_eq!(again, path);
    assert_eq!(server.requests(), 1);

    // a fresh process sees the persisted metadata
    let later = env.session();
    later.artifact(&entry).unwrap();
    assert_eq!(server.requests(), 1);
}

#[test]
fn checksum_mismatch_is_integrity_error() {
    let server = StubServer::start();
    server.serve("/f", b"tampered");
    let checksum = sha256_hex(b"payload");
    let env = Env::new(&server, &checksum);
    let session = env.session();

    let entry = session.resolve("x", "*").unwrap();
    let err = session.artifact(&entry).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    let message = err.to_string();
    assert!(message.contains(&checksum), "{message}");
    assert!(message.contains(&sha256_hex(b"tampered")), "{message}");
    assert!(!env.layers.join(format!("{checksum}.toml")).exists());
    assert!(!env.layers.join(&checksum).join("f").exists());
}

#[test]
fn http_error_is_transport_error() {
    let server = StubServer::start();
    server.route("/f", 503, b"unavailable");
    let checksum = sha256_hex(b"payload");
    let env = Env::new(&server, &checksum);
    let session = env.session();

    let entry = session.resolve("x", "").unwrap();
    let err = session.artifact(&entry).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("503"));
    assert!(!env.layers.join(format!("{checksum}.toml")).exists());
}

#[test]
fn bundled_cache_avoids_network() {
    let server = StubServer::start();
    server.serve("/f", b"payload");
    let checksum = sha256_hex(b"payload");
    let env = Env::new(&server, &checksum);

    // seed <buildpack>/cache the way a packaged buildpack ships it
    let seeded = env.session();
    let entry = seeded.resolve("x", "1.*").unwrap();
    let upstream = Layer::new(
        &packwright_store::LayersLayout::new(env.buildpack.join("cache")),
        &checksum,
    )
    .unwrap();
    fs::create_dir_all(upstream.root()).unwrap();
    fs::write(upstream.root().join("f"), "payload").unwrap();
    upstream.write_metadata(&entry, LayerFlags::build().with_cache()).unwrap();

    let session = env.session();
    let path = session.download_layer(entry).unwrap().artifact().unwrap();
    assert_eq!(path, env.buildpack.join("cache").join(&checksum).join("f"));
    assert_eq!(server.requests(), 0);
}

#[test]
fn dependency_layer_expands_artifact_and_cleans_up_stale_layers() {
    let server = StubServer::start();
    server.serve("/f", b"payload");
    let checksum = sha256_hex(b"payload");
    let env = Env::new(&server, &checksum);

    fs::create_dir_all(env.layers.join("obsolete")).unwrap();
    fs::write(env.layers.join("obsolete.toml"), "launch = true\n").unwrap();
    fs::write(env.layers.join("launch.toml"), "[[processes]]\n").unwrap();

    let session = env.session();
    let entry = session.resolve("x", "1.0.0").unwrap();
    let outcome = session
        .dependency_layer(entry.clone())
        .unwrap()
        .contribute(LayerFlags::launch(), |artifact: &Path, layer: &Layer| {
            let bin = layer.root().join("bin");
            fs::create_dir_all(&bin)?;
            fs::copy(artifact, bin.join("x"))?;
            Ok(())
        })
        .unwrap();
    assert_eq!(outcome, ContributeOutcome::Contributed);
    assert_eq!(
        fs::read_to_string(env.layers.join("x").join("bin").join("x")).unwrap(),
        "payload"
    );

    let plan = session.build_plan();
    assert_eq!(plan.get("x").unwrap().version, "1.0.0");

    let report = session.finish().unwrap();
    assert_eq!(report.untouched, ["obsolete"]);
    assert!(!env.layers.join("obsolete").exists());
    assert!(!env.layers.join("obsolete.toml").exists());
    assert!(env.layers.join("launch.toml").exists());
    assert!(env.layers.join("x.toml").exists());
    assert!(env.layers.join(format!("{checksum}.toml")).exists());
}

#[test]
fn warm_build_keeps_download_cache_across_cleanup() {
    let server = StubServer::start();
    server.serve("/f", b"payload");
    let checksum = sha256_hex(b"payload");
    let env = Env::new(&server, &checksum);

    let run = || {
        let session = env.session();
        let entry = session.resolve("x", "1.0.0").unwrap();
        let outcome = session
            .dependency_layer(entry)
            .unwrap()
            .contribute(LayerFlags::launch(), |artifact: &Path, layer: &Layer| {
                fs::copy(artifact, layer.root().join("x"))?;
                Ok(())
            })
            .unwrap();
        let report = session.finish().unwrap();
        (outcome, report)
    };

    let (cold, _) = run();
    assert_eq!(cold, ContributeOutcome::Contributed);

    let (warm, report) = run();
    assert_eq!(warm, ContributeOutcome::Reused);
    assert!(report.untouched.is_empty(), "{:?}", report.untouched);
    assert!(env.layers.join(format!("{checksum}.toml")).is_file());
    assert_eq!(
        fs::read(env.layers.join(&checksum).join("f")).unwrap(),
        b"payload"
    );
    assert!(env.layers.join("x.toml").is_file());

    let session = env.session();
    let entry = session.resolve("x", "1.0.0").unwrap();
    session.download_layer(entry).unwrap().artifact().unwrap();
    assert_eq!(server.requests(), 1);
}

#[test]
fn failed_contribution_retries_on_next_run() {
    let server = StubServer::start();
    server.serve("/f", b"payload");
    let checksum = sha256_hex(b"payload");
    let env = Env::new(&server, &checksum);

    let session = env.session();
    let entry = session.resolve("x", "1.0").unwrap();
    let err = session
        .dependency_layer(entry.clone())
        .unwrap()
        .contribute(LayerFlags::build(), |_: &Path, _: &Layer| {
            Err(CoreError::Config("unpack failed".to_owned()))
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Contribution);
    assert!(!env.layers.join("x.toml").exists());

    let retry = env.session();
    let outcome = retry
        .dependency_layer(entry)
        .unwrap()
        .contribute(LayerFlags::build(), |_: &Path, _: &Layer| Ok(()))
        .unwrap();
    assert_eq!(outcome, ContributeOutcome::Contributed);
    assert!(env.layers.join("x.toml").exists());
    // the artifact itself was cached by the first attempt
    assert_eq!(server.requests(), 1);
}
