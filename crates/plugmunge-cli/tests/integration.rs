//! Integration tests for the plugmunge binary

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use predicates::prelude::*;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

const ANDROID_MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="io.example.app">
    <application/>
</manifest>
"#;

const PLUGIN_XML: &str = r#"<plugin id="plugin-camera" version="1.0.0">
    <platform name="android">
        <config-file target="AndroidManifest.xml" parent="/manifest">
            <uses-permission android:name="android.permission.CAMERA"/>
        </config-file>
        <config-file target="AndroidManifest.xml" parent="/manifest/application">
            <meta-data android:name="camera.key" android:value="$API_KEY"/>
        </config-file>
    </platform>
</plugin>"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Result<Self, Box<dyn Error>> {
        Ok(Workspace { dir: TempDir::new()? })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn project(&self) -> PathBuf {
        self.path().join("android")
    }

    fn plugins(&self) -> PathBuf {
        self.path().join("plugins")
    }

    fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("plugmunge");
        cmd.env("PLUGMUNGE_CONFIG", self.path().join("plugmunge.toml"));
        cmd.env("HOME", self.path());
        cmd.env("NO_COLOR", "1");
        cmd
    }

    /// Command with the project flags filled in
    fn project_cmd(&self, subcommand: &str) -> Command {
        let mut cmd = self.cmd();
        cmd.arg(subcommand)
            .arg("--platform")
            .arg("android")
            .arg("--project-dir")
            .arg(self.project())
            .arg("--plugins-dir")
            .arg(self.plugins());
        cmd
    }

    fn with_android_project(self) -> Result<Self, Box<dyn Error>> {
        fs::create_dir_all(self.project())?;
        fs::write(self.project().join("AndroidManifest.xml"), ANDROID_MANIFEST)?;
        let plugin_dir = self.plugins().join("plugin-camera");
        fs::create_dir_all(&plugin_dir)?;
        fs::write(plugin_dir.join("plugin.xml"), PLUGIN_XML)?;
        Ok(self)
    }

    fn manifest(&self) -> Result<String, std::io::Error> {
        fs::read_to_string(self.project().join("AndroidManifest.xml"))
    }
}

#[test]
fn test_version() -> TestResult {
    Workspace::new()?
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("plugmunge"));
    Ok(())
}

#[test]
fn test_help() -> TestResult {
    Workspace::new()?
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("queue-install"))
        .stdout(predicate::str::contains("prepare"));
    Ok(())
}

#[test]
fn test_invalid_command() -> TestResult {
    Workspace::new()?.cmd().arg("invalid").assert().failure();
    Ok(())
}

#[test]
fn test_config_set_and_show() -> TestResult {
    let ws = Workspace::new()?;
    ws.cmd()
        .args(["config", "set", "platform", "android"])
        .assert()
        .success();
    ws.cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration:"))
        .stdout(predicate::str::contains("android"));

    let saved = fs::read_to_string(ws.path().join("plugmunge.toml"))?;
    assert!(saved.contains("platform = \"android\""));
    Ok(())
}

#[test]
fn test_config_set_unknown_key_fails() -> TestResult {
    let ws = Workspace::new()?;
    ws.cmd()
        .args(["config", "set", "colour", "blue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));
    Ok(())
}

#[test]
fn test_config_path_prints_override() -> TestResult {
    let ws = Workspace::new()?;
    ws.cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plugmunge.toml"));
    Ok(())
}

#[test]
fn test_queue_install_requires_platform() -> TestResult {
    let ws = Workspace::new()?.with_android_project()?;
    ws.cmd()
        .arg("queue-install")
        .arg("plugin-camera")
        .arg("--project-dir")
        .arg(ws.project())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No platform given"));
    Ok(())
}

#[test]
fn test_queue_install_missing_plugin_fails() -> TestResult {
    let ws = Workspace::new()?.with_android_project()?;
    ws.project_cmd("queue-install")
        .arg("plugin-missing")
        .assert()
        .failure()
        .stderr(predicate::str::contains("plugin-missing"));
    assert!(!ws.plugins().join("android.json").exists());
    Ok(())
}

#[test]
fn test_install_prepare_uninstall_cycle() -> TestResult {
    let ws = Workspace::new()?.with_android_project()?;

    ws.project_cmd("queue-install")
        .arg("plugin-camera")
        .args(["--var", "API_KEY=secret"])
        .assert()
        .success();
    ws.project_cmd("status")
        .arg("plugin-camera")
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"state\": \"queued\""))
        .stdout(predicate::str::contains("\"action\": \"install\""));

    ws.project_cmd("prepare").assert().success();
    let manifest = ws.manifest()?;
    assert!(manifest.contains("android.permission.CAMERA"));
    assert!(manifest.contains(r#"android:value="secret""#));

    ws.project_cmd("status")
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"state\": \"installed\""));

    ws.project_cmd("queue-install")
        .arg("plugin-camera")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already installed"));

    ws.project_cmd("queue-uninstall").arg("plugin-camera").assert().success();
    ws.project_cmd("prepare").assert().success();
    let manifest = ws.manifest()?;
    assert!(!manifest.contains("android.permission.CAMERA"));
    assert!(!manifest.contains("camera.key"));

    ws.project_cmd("status")
        .arg("plugin-camera")
        .assert()
        .success()
        .stdout(predicate::str::contains("absent"));
    Ok(())
}

#[test]
fn test_queue_install_promotes_dependent_plugin() -> TestResult {
    let ws = Workspace::new()?.with_android_project()?;
    ws.project_cmd("queue-install").arg("plugin-camera").arg("--dependent").assert().success();
    ws.project_cmd("prepare").assert().success();
    ws.project_cmd("status")
        .arg("plugin-camera")
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"top_level\": false"));

    ws.project_cmd("queue-install")
        .arg("plugin-camera")
        .assert()
        .success()
        .stderr(predicate::str::contains("Promoted plugin-camera"));
    ws.project_cmd("status")
        .arg("plugin-camera")
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"top_level\": true"));
    assert!(ws.manifest()?.contains("android.permission.CAMERA"));
    Ok(())
}

#[test]
fn test_prepare_applies_app_config() -> TestResult {
    let ws = Workspace::new()?.with_android_project()?;
    let app_config = ws.path().join("config.xml");
    fs::write(
        &app_config,
        r#"<widget id="io.example.app">
    <platform name="android">
        <edit-config file="AndroidManifest.xml" target="/manifest/application" mode="merge">
            <application android:allowBackup="false"/>
        </edit-config>
    </platform>
</widget>"#,
    )?;

    ws.project_cmd("prepare").arg("--app-config").arg(&app_config).assert().success();
    assert!(ws.manifest()?.contains(r#"android:allowBackup="false""#));
    Ok(())
}

#[test]
fn test_reapply_after_regeneration() -> TestResult {
    let ws = Workspace::new()?.with_android_project()?;
    ws.project_cmd("queue-install").arg("plugin-camera").assert().success();
    ws.project_cmd("prepare").assert().success();

    fs::write(ws.project().join("AndroidManifest.xml"), ANDROID_MANIFEST)?;
    ws.project_cmd("reapply").assert().success();
    assert!(ws.manifest()?.contains("android.permission.CAMERA"));
    Ok(())
}

#[test]
fn test_merge_config() -> TestResult {
    let ws = Workspace::new()?;
    let src = ws.path().join("defaults.xml");
    let dest = ws.path().join("config.xml");
    fs::write(
        &src,
        r#"<widget><preference name="Fullscreen" value="true"/><name>Default</name></widget>"#,
    )?;
    fs::write(&dest, r#"<widget><name>Mine</name></widget>"#)?;

    ws.cmd().arg("merge-config").arg(&src).arg(&dest).assert().success();
    let merged = fs::read_to_string(&dest)?;
    assert!(merged.contains(r#"<preference name="Fullscreen" value="true"/>"#));
    assert!(merged.contains("<name>Mine</name>"));
    Ok(())
}
