use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const CONFIG: &str = "\
remote:
  host: lb.internal
  username: deploy
  directory: /etc/haproxy/conf.d
http_port: 80
https_port: 443
force_https: true
certificate_dir: /etc/ssl/private
reload_command: systemctl reload haproxy
";

const TOPOLOGY: &str = "\
services:
  - name: api
    ports: { http: 8080 }
    routes:
      - { order: 0, domains: [api.example.com], port: http }
    nodes:
      - ip: 10.0.0.5
";

fn hapsync_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hapsync"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("HAPSYNC_PASSWORD");
    cmd
}

/// Writes inputs under `~/.hapsync/` so the default paths pick them up.
fn home_with_inputs(topology: &str) -> TempDir {
    let home = TempDir::new().expect("home");
    let dir = home.path().join(".hapsync");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("config.yaml"), CONFIG).expect("config");
    fs::write(dir.join("topology.yaml"), topology).expect("topology");
    home
}

#[test]
fn render_prints_every_artifact_from_default_paths() {
    let home = home_with_inputs(TOPOLOGY);
    hapsync_cmd(home.path())
        .arg("render")
        .assert()
        .success()
        .stdout(contains("# /etc/haproxy/conf.d/frontend.cfg"))
        .stdout(contains("frontend fronthttps"))
        .stdout(contains(
            "bind *:443 ssl crt /etc/ssl/private/api.example.com/api.example.com.pem",
        ))
        .stdout(contains("# /etc/haproxy/conf.d/backend_api_0.cfg"))
        .stdout(contains("server srv0 10.0.0.5:8080"));
}

#[test]
fn render_json_lists_artifacts() {
    let home = home_with_inputs(TOPOLOGY);
    let output = hapsync_cmd(home.path())
        .args(["render", "--json"])
        .output()
        .expect("run hapsync render --json");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["frontend"]["kind"], "frontend");
    assert_eq!(json["backends"][0]["path"], "/etc/haproxy/conf.d/backend_api_0.cfg");
}

#[test]
fn explicit_paths_override_home() {
    let home = TempDir::new().expect("home");
    let inputs = TempDir::new().expect("inputs");
    let config = inputs.path().join("lb.yaml");
    let topology = inputs.path().join("services.yaml");
    fs::write(&config, CONFIG.replace("force_https: true", "force_https: false")).unwrap();
    fs::write(&topology, TOPOLOGY).unwrap();

    hapsync_cmd(home.path())
        .arg("render")
        .arg("--config")
        .arg(&config)
        .arg("--topology")
        .arg(&topology)
        .assert()
        .success()
        .stdout(contains("frontend front\n"))
        .stdout(contains("fronthttps").not());
}

#[test]
fn render_rejects_invalid_topology() {
    let duplicate = format!("{TOPOLOGY}{}", TOPOLOGY.trim_start_matches("services:\n"));
    let home = home_with_inputs(&duplicate);
    hapsync_cmd(home.path())
        .arg("render")
        .assert()
        .failure()
        .stderr(contains("failed to render artifacts"))
        .stderr(contains("'api'"));
}

#[test]
fn missing_config_names_the_file() {
    let home = TempDir::new().expect("home");
    hapsync_cmd(home.path())
        .arg("render")
        .assert()
        .failure()
        .stderr(contains(".hapsync/config.yaml"));
}

#[test]
fn invalid_config_reports_every_issue() {
    let home = home_with_inputs(TOPOLOGY);
    fs::write(
        home.path().join(".hapsync").join("config.yaml"),
        CONFIG
            .replace("http_port: 80", "http_port: 0")
            .replace("reload_command: systemctl reload haproxy", "reload_command: ''"),
    )
    .unwrap();

    hapsync_cmd(home.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(contains("http_port"))
        .stderr(contains("reload_command"));
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().expect("home");
    hapsync_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("render"))
        .stdout(contains("plan"))
        .stdout(contains("sync"))
        .stdout(contains("diff"))
        .stdout(contains("watch"));
}

#[test]
fn watch_rejects_zero_interval() {
    let home = TempDir::new().expect("home");
    hapsync_cmd(home.path())
        .args(["watch", "--interval", "0"])
        .assert()
        .failure();
}
