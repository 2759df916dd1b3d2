//! Stub daemon configuration tests.

use receptor_stubd::{StubConfig, WorkerKind};

#[test]
fn parse_minimal_config() {
    let config = StubConfig::from_toml("").unwrap();
    assert_eq!(config.node_id.as_str(), "stub");
    assert!(config.workers.is_empty());
    assert_eq!(
        config.socket_path(),
        std::path::PathBuf::from("/tmp/receptor.sock")
    );
}

#[test]
fn parse_full_config() {
    let toml = r#"
node_id = "node-a"

[server]
socket_path = "/run/receptor/control.sock"

[[workers]]
work_type = "ansible-local"
kind = "command"
command = "ansible-runner"
args = ["worker"]

[[workers]]
work_type = "size"
kind = "length"

[[workers]]
work_type = "broken"
kind = "fail"
message = "always broken"
"#;
    let config = StubConfig::from_toml(toml).unwrap();
    assert_eq!(config.node_id.as_str(), "node-a");
    assert_eq!(
        config.socket_path(),
        std::path::PathBuf::from("/run/receptor/control.sock")
    );
    assert_eq!(config.workers.len(), 3);
    assert_eq!(
        config.workers[0].kind,
        WorkerKind::Command {
            command: "ansible-runner".into(),
            args: vec!["worker".into()],
        }
    );
    assert_eq!(config.workers[1].kind, WorkerKind::Length);
    assert_eq!(
        config.workers[2].kind,
        WorkerKind::Fail {
            message: "always broken".into()
        }
    );
}

#[test]
fn unknown_worker_kind_is_rejected() {
    let toml = r#"
[[workers]]
work_type = "x"
kind = "teleport"
"#;
    assert!(StubConfig::from_toml(toml).is_err());
}

#[test]
fn env_var_expansion() {
    unsafe { std::env::set_var("TEST_STUBD_NODE", "expanded-node") };
    let config = StubConfig::from_toml(r#"node_id = "${TEST_STUBD_NODE}""#).unwrap();
    assert_eq!(config.node_id.as_str(), "expanded-node");
    unsafe { std::env::remove_var("TEST_STUBD_NODE") };
}

#[test]
fn builder_overrides() {
    let config = StubConfig::default()
        .with_socket_path("/tmp/other.sock")
        .with_worker("size", WorkerKind::Length);
    assert_eq!(config.socket_path(), std::path::PathBuf::from("/tmp/other.sock"));
    assert_eq!(config.workers.len(), 2);
    assert_eq!(config.workers[0].work_type.as_str(), "echo");
}

#[test]
fn load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stubd.toml");
    std::fs::write(&path, "node_id = \"from-file\"\n").unwrap();
    let config = StubConfig::load(&path).unwrap();
    assert_eq!(config.node_id.as_str(), "from-file");
}

#[test]
fn default_config_serializes() {
    let config = StubConfig::default();
    let toml_str = toml::to_string_pretty(&config).unwrap();
    let parsed = StubConfig::from_toml(&toml_str).unwrap();
    assert_eq!(parsed.workers.len(), 1);
    assert_eq!(parsed.workers[0].kind, WorkerKind::Echo);
}
