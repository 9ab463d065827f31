use assert_cmd::Command;
use predicates::prelude::*;
use serde_yaml::Value;
use std::fs;
use tempfile::TempDir;

fn bridge() -> Command {
    let mut cmd = Command::cargo_bin("mxd-server").expect("binary");
    cmd.env_remove("APPSERVICE_DISCORD__BRIDGE__PORT");
    cmd
}

fn generate_into(dir: &TempDir) {
    bridge()
        .current_dir(dir.path())
        .args(["--generate-registration", "--url", "https://bridge.example:9000", "--file"])
        .arg("reg.yaml")
        .assert()
        .success();
}

#[test]
fn generates_registration_file() {
    let dir = TempDir::new().expect("tempdir");
    generate_into(&dir);

    let text = fs::read_to_string(dir.path().join("reg.yaml")).expect("registration written");
    let yaml: Value = serde_yaml::from_str(&text).expect("yaml");

    assert_eq!(yaml["sender_localpart"].as_str(), Some("_discord_bot"));
    assert_eq!(yaml["url"].as_str(), Some("https://bridge.example:9000"));
    assert_eq!(yaml["namespaces"]["aliases"][0]["regex"].as_str(), Some("#_discord_.*"));
    assert_eq!(yaml["namespaces"]["aliases"][0]["exclusive"].as_bool(), Some(true));
    assert_eq!(yaml["namespaces"]["users"][0]["regex"].as_str(), Some("@_discord_.*"));
    assert_eq!(yaml["namespaces"]["users"][0]["exclusive"].as_bool(), Some(true));
}

#[test]
fn refuses_to_overwrite_registration() {
    let dir = TempDir::new().expect("tempdir");
    generate_into(&dir);
    let before = fs::read_to_string(dir.path().join("reg.yaml")).expect("read");

    bridge()
        .current_dir(dir.path())
        .args(["-r", "-u", "https://other.example", "-f", "reg.yaml"])
        .assert()
        .code(1);

    assert_eq!(fs::read_to_string(dir.path().join("reg.yaml")).expect("read"), before);
}

#[test]
fn registration_needs_url() {
    let dir = TempDir::new().expect("tempdir");
    bridge().current_dir(dir.path()).args(["-r", "-f", "reg.yaml"]).assert().code(1);
    assert!(!dir.path().join("reg.yaml").exists());
}

#[test]
fn help_and_malformed_usage_exit_zero() {
    bridge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--generate-registration"));
    bridge().args(["--port", "not-a-port"]).assert().code(0);
}

#[test]
fn failing_store_exits_one_without_listening() {
    let dir = TempDir::new().expect("tempdir");
    generate_into(&dir);
    fs::write(
        dir.path().join("config.yaml"),
        "bridge:\n  port: 0\n  bind_address: 127.0.0.1\ndatabase:\n  url: bogus://x\n",
    )
    .expect("config");

    bridge()
        .current_dir(dir.path())
        .args(["-f", "reg.yaml"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Store initialization failed"))
        .stdout(predicate::str::contains("Started listening").not());
}

#[test]
fn legacy_config_exits_one() {
    let dir = TempDir::new().expect("tempdir");
    generate_into(&dir);
    fs::write(
        dir.path().join("config.yaml"),
        "bridge:\n  port: 9005\ndatabase:\n  roomStorePath: ./room-store.db\n",
    )
    .expect("config");

    bridge()
        .current_dir(dir.path())
        .args(["-f", "reg.yaml"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("room_store_path"));
}

#[test]
fn missing_port_exits_one() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("config.yaml"), "bridge:\n  domain: example.org\n").expect("config");

    bridge().current_dir(dir.path()).assert().code(1);
}
