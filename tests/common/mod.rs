//! Shared fakes and fixtures for integration tests.

#![allow(dead_code)]

use release_pipeline::config::{
    BuildOptionSet, CiEnvironment, CiSettings, Manifest, PipelineConfig, PipelineOptions,
};
use release_pipeline::runner::{CommandSpec, ExitResult, Runner};
use release_pipeline::stages::Fetch;
use release_pipeline::{PipelineError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type Respond = Box<dyn Fn(&CommandSpec) -> ExitResult + Send + Sync>;

/// Records every command and answers with a scripted result.
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    respond: Respond,
}

impl RecordingRunner {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&CommandSpec) -> ExitResult + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Every command succeeds with empty output.
    pub fn succeeding() -> Self {
        Self::new(|_| ExitResult::ok(""))
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered command lines, in call order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }

    pub fn ran(&self, program: &str) -> bool {
        self.calls().iter().any(|c| c.program == program)
    }
}

impl Runner for RecordingRunner {
    async fn run(&self, command: &CommandSpec) -> Result<ExitResult> {
        self.calls.lock().unwrap().push(command.clone());
        Ok((self.respond)(command))
    }
}

/// Serves canned bodies by URL and counts requests.
#[derive(Default)]
pub struct FakeFetcher {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Fetch for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::Generic(format!("404 for {url}")))
    }
}

/// Gzip tarball with every file under one `top` directory.
pub fn source_tarball(top: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{top}/{name}"), contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(data))
}

/// Manifest with a build, a bundle and a publish section pointing at `api_base`.
pub fn full_manifest(api_base: &str) -> String {
    format!(
        r#"
[app]
name = "starcheat"
build_command = ["./build.sh"]
entry_point = "starcheat"

[bundle]
tool = ["bundle-tool", "--standalone"]
output = "dist/starcheat.app"
app_name = "StarCheat.app"
executable = "Contents/MacOS/starcheat"
deploy_tool = "deploytool"
deploy_args = ["-verbose=2"]
clean = ["dist"]

[publish]
api_base = "{api_base}"
repository = "owner/starcheat"
asset_suffix = "osx"

[publish.retry]
initial_delay_ms = 1
"#
    )
}

/// Manifest without bundle or publish sections.
pub const MINIMAL_MANIFEST: &str = r#"
[app]
name = "starcheat"
build_command = ["./build.sh"]
entry_point = "starcheat"
"#;

/// CI snapshot from literal pairs.
pub fn ci(vars: &[(&str, &str)]) -> CiEnvironment {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    CiEnvironment::from_lookup(&CiSettings::default(), |key| vars.get(key).cloned())
}

/// CI snapshot with every publish credential present.
pub fn ci_ready(commit: &str) -> CiEnvironment {
    ci(&[
        ("TRAVIS_BUILD_ID", "4242"),
        ("TRAVIS_BRANCH", "master"),
        ("TRAVIS_COMMIT", commit),
        ("TRAVIS_SECURE_ENV_VARS", "true"),
        ("HOMEBREW_GITHUB_API_TOKEN", "s3cret"),
    ])
}

pub fn config(
    root: &Path,
    manifest: &str,
    options: PipelineOptions,
    ci: CiEnvironment,
) -> PipelineConfig {
    let manifest = Manifest::parse(manifest).unwrap();
    let options = BuildOptionSet::new(options, Vec::new());
    PipelineConfig::new(root, manifest, options, ci, "install").unwrap()
}

/// Scripted toolchain: the build populates `build/`, the bundler produces the
/// bundle, and every executable reports `starcheat 2.0`.
pub fn toolchain(root: &Path) -> RecordingRunner {
    RecordingRunner::new(toolchain_responder(root))
}

/// The responses behind [`toolchain`], for fakes that override some commands.
pub fn toolchain_responder(
    root: &Path,
) -> impl Fn(&CommandSpec) -> ExitResult + Send + Sync + 'static {
    let root: PathBuf = root.to_path_buf();
    move |command| {
        let build = root.join("build");
        match command.program.as_str() {
            "./build.sh" => {
                std::fs::create_dir_all(&build).unwrap();
                std::fs::write(build.join("starcheat"), "#!/bin/sh\n").unwrap();
                ExitResult::ok("built")
            }
            "bundle-tool" => {
                let macos = build.join("dist/starcheat.app/Contents/MacOS");
                std::fs::create_dir_all(&macos).unwrap();
                std::fs::write(macos.join("starcheat"), "#!/bin/sh\n").unwrap();
                ExitResult::ok("bundled")
            }
            "deploytool" => ExitResult::ok("deployed"),
            program if program.ends_with("starcheat") => ExitResult::ok("starcheat 2.0\n"),
            _ => ExitResult::failed(127, format!("unexpected command: {command}")),
        }
    }
}
