#![allow(dead_code)]

use bump::Config;
use serde_json::json;
use std::fs;
use std::sync::Once;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const NEW_DIGEST: &str = "sha256:3ea1ca1aa8483a38081750953ad75046e6cc9f6b86ca97eba880ebf600d68608";

static TRACING: Once = Once::new();

/// Route library logs to the test writer, filtered by `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One mock server standing in for PyPI, crates.io and Docker Hub
pub async fn registries() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pypi/luigi/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "info": { "name": "luigi" },
            "releases": {
                "2.0.0": [{ "yanked": false }],
                "2.6.0": [{ "yanked": false }],
            },
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pypi/private-pkg/json"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/crates/serde"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "crate": { "name": "serde" },
            "versions": [{ "num": "1.0.200" }, { "num": "0.9.15" }],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "anon" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/library/ubuntu/tags/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "library/ubuntu",
            "tags": ["latest", "17.04", "17.10"],
        })))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/v2/library/ubuntu/manifests/17.10"))
        .respond_with(ResponseTemplate::new(200).insert_header("Docker-Content-Digest", NEW_DIGEST))
        .mount(&server)
        .await;
    server
}

/// Scratch root and helper programs for one test
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir_all(dir.path().join("scratch")).expect("Failed to create scratch root");
        Self { dir }
    }

    /// Write an executable shell script and return its path
    pub fn executable(&self, name: &str, body: &str) -> String {
        let path = self.dir.path().join(name);
        fs::write(&path, body).expect("Failed to write script");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("Failed to make script executable");
        }
        path.to_string_lossy().into_owned()
    }

    pub fn config(&self, server: &MockServer) -> Config {
        let mut config = Config::default();
        config.sandbox.scratch_root = self.dir.path().join("scratch");
        config.registries.pypi = server.uri();
        config.registries.crates_io = server.uri();
        config.registries.docker_hub = server.uri();
        config.registries.docker_auth = server.uri();
        config
    }

    pub fn scratch_is_empty(&self) -> bool {
        fs::read_dir(self.dir.path().join("scratch"))
            .expect("Failed to read scratch root")
            .next()
            .is_none()
    }
}
