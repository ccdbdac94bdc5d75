mod common;

use common::{RecordingRunner, ci, config, full_manifest, toolchain, toolchain_responder};
use release_pipeline::PipelineError;
use release_pipeline::config::{BundleSettings, PipelineOptions};
use release_pipeline::runner::ExitResult;
use release_pipeline::stages::{create_archive, create_bundle};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn settings() -> BundleSettings {
    BundleSettings {
        tool: vec!["bundle-tool".to_string()],
        output: PathBuf::from("dist/starcheat.app"),
        app_name: "StarCheat.app".to_string(),
        executable: PathBuf::from("Contents/MacOS/starcheat"),
        deploy_tool: Some("deploytool".to_string()),
        deploy_args: vec!["-verbose=2".to_string()],
        writable_paths: Vec::new(),
        clean: vec![PathBuf::from("dist")],
        stage_files: Vec::new(),
    }
}

fn project() -> TempDir {
    let project = TempDir::new().unwrap();
    std::fs::create_dir_all(project.path().join("build")).unwrap();
    std::fs::write(project.path().join("build/starcheat"), "").unwrap();
    project
}

fn pipeline_config(root: &Path) -> release_pipeline::config::PipelineConfig {
    config(
        root,
        &full_manifest("http://127.0.0.1:9"),
        PipelineOptions::default(),
        ci(&[]),
    )
}

#[tokio::test]
async fn bundles_deploys_renames_and_verifies() {
    let project = project();
    std::fs::create_dir_all(project.path().join("build/StarCheat.app/stale")).unwrap();
    let runner = toolchain(project.path());

    let bundle = create_bundle(&runner, &pipeline_config(project.path()), &settings())
        .await
        .unwrap();

    assert_eq!(bundle.path, project.path().join("build/StarCheat.app"));
    assert!(bundle.executable.exists());
    assert!(!bundle.path.join("stale").exists());
    assert!(!project.path().join("build/dist/starcheat.app").exists());

    let lines = runner.command_lines();
    assert_eq!(lines[0], "bundle-tool");
    assert_eq!(
        lines[1],
        format!(
            "deploytool {} -verbose=2",
            project.path().join("build/dist/starcheat.app").display()
        )
    );
    assert!(lines[2].ends_with("StarCheat.app/Contents/MacOS/starcheat -v"));
}

#[tokio::test]
async fn stage_files_are_copied_before_bundling() {
    let project = project();
    std::fs::create_dir_all(project.path().join("mac")).unwrap();
    std::fs::write(project.path().join("mac/setup.py"), "APP = ['starcheat.py']").unwrap();
    let build = project.path().join("build");
    let staged = build.join("setup.py");

    let seen = staged.clone();
    let respond = toolchain_responder(project.path());
    let runner = RecordingRunner::new(move |command| {
        if command.program == "bundle-tool" {
            assert!(seen.exists(), "setup.py must be staged before the bundler runs");
        }
        respond(command)
    });

    let mut settings = settings();
    settings.stage_files = vec![PathBuf::from("mac/setup.py")];
    create_bundle(&runner, &pipeline_config(project.path()), &settings)
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(staged).unwrap(),
        "APP = ['starcheat.py']"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn read_only_dependency_tree_is_made_writable_first() {
    use std::os::unix::fs::PermissionsExt;

    let project = project();
    let lib = project.path().join(".deps/lib/python3/site-packages");
    std::fs::create_dir_all(&lib).unwrap();
    let module = lib.join("sip.so");
    std::fs::write(&module, "").unwrap();
    std::fs::set_permissions(&module, std::fs::Permissions::from_mode(0o444)).unwrap();

    let mut settings = settings();
    settings.writable_paths = vec![PathBuf::from(".deps/lib")];
    let runner = toolchain(project.path());
    create_bundle(&runner, &pipeline_config(project.path()), &settings)
        .await
        .unwrap();

    let mode = std::fs::metadata(&module).unwrap().permissions().mode();
    assert_ne!(mode & 0o200, 0);
}

#[tokio::test]
async fn missing_writable_path_fails_in_prepare() {
    let project = project();
    let mut settings = settings();
    settings.writable_paths = vec![PathBuf::from(".deps/lib")];
    let runner = toolchain(project.path());

    let err = create_bundle(&runner, &pipeline_config(project.path()), &settings)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Bundle { step: "prepare", .. }));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn clean_never_deletes_the_build_directory_itself() {
    let project = project();
    let runner = toolchain(project.path());
    let mut settings = settings();
    settings.app_name = ".".to_string();

    let err = create_bundle(&runner, &pipeline_config(project.path()), &settings)
        .await
        .unwrap_err();

    match err {
        PipelineError::Bundle { step, reason } => {
            assert_eq!(step, "clean");
            assert!(reason.contains("refusing to delete"));
        }
        other => panic!("expected clean failure, got {other:?}"),
    }
    assert!(project.path().join("build/starcheat").exists());
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn clean_refuses_paths_that_escape_the_build_directory() {
    let project = project();
    std::fs::write(project.path().join("release.toml"), "").unwrap();
    let runner = toolchain(project.path());
    let mut settings = settings();
    settings.clean = vec![PathBuf::from("../release.toml")];

    let err = create_bundle(&runner, &pipeline_config(project.path()), &settings)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Bundle { step: "clean", .. }));
    assert!(project.path().join("release.toml").exists());
}

#[tokio::test]
async fn deploy_failure_aborts_bundling() {
    let project = project();
    let respond = toolchain_responder(project.path());
    let runner = RecordingRunner::new(move |command| {
        if command.program == "deploytool" {
            ExitResult::failed(1, "ERROR: no file at \"/usr/local/lib/QtCore.framework\"")
        } else {
            respond(command)
        }
    });

    let err = create_bundle(&runner, &pipeline_config(project.path()), &settings())
        .await
        .unwrap_err();

    match err {
        PipelineError::Bundle { step, reason } => {
            assert_eq!(step, "deploy");
            assert!(reason.contains("QtCore.framework"));
        }
        other => panic!("expected deploy failure, got {other:?}"),
    }
}

#[tokio::test]
async fn bundler_that_produces_nothing_fails() {
    let project = project();
    let runner = RecordingRunner::succeeding();

    let err = create_bundle(&runner, &pipeline_config(project.path()), &settings())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Bundle { step: "bundle", .. }));
    assert!(!runner.ran("deploytool"));
}

#[tokio::test]
async fn archive_wraps_bundle_directory() {
    let project = project();
    let runner = toolchain(project.path());
    let bundle = create_bundle(&runner, &pipeline_config(project.path()), &settings())
        .await
        .unwrap();

    let out = TempDir::new().unwrap();
    let archive = create_archive(&bundle.path, out.path(), "starcheat-abc1234.tar.gz")
        .await
        .unwrap();

    assert_eq!(archive.size, std::fs::metadata(&archive.path).unwrap().len());
    let file = std::fs::File::open(&archive.path).unwrap();
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));
    let names: Vec<String> = tar
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().display().to_string())
        .collect();
    assert!(names.iter().all(|n| n.starts_with("StarCheat.app")));
    assert!(names.iter().any(|n| n == "StarCheat.app/Contents/MacOS/starcheat"));
}
