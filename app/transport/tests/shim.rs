//! Tests for command classification and the platform report.

use receptor_transport::{ShimCommand, TransportConfig, platform_report};

#[test]
fn home_probe_matches_only_the_current_user() {
    let cmd = "/bin/sh -c 'echo ~alice && sleep 0'";
    assert_eq!(ShimCommand::classify(cmd, "alice"), ShimCommand::HomeDirectory);
    assert_eq!(ShimCommand::classify(cmd, "bob"), ShimCommand::Passthrough);
}

#[test]
fn working_directory_probe() {
    let cmd = "/bin/sh -c 'echo \"`pwd`\" && sleep 0'";
    assert_eq!(ShimCommand::classify(cmd, "alice"), ShimCommand::WorkingDirectory);
}

#[test]
fn temp_dir_creation_keeps_the_command() {
    let cmd = "/bin/sh -c '( umask 77 && mkdir -p \"` echo ~/.ansible/tmp `\" && mkdir \"` echo ~/.ansible/tmp/ansible-tmp-1 `\" ) && sleep 0'";
    assert_eq!(ShimCommand::classify(cmd, "alice"), ShimCommand::CreateTempDir(cmd));
}

#[test]
fn platform_discovery() {
    let cmd = "/bin/sh -c 'echo PLATFORM; uname; echo FOUND; command -v 'python3'; echo ENDFOUND && sleep 0'";
    assert_eq!(ShimCommand::classify(cmd, "alice"), ShimCommand::DiscoverPlatform);
}

#[test]
fn payload_execution() {
    let cmd = "/bin/sh -c '/usr/bin/python3 /home/alice/.ansible/tmp/ansible-tmp-1/AnsiballZ_ping.py && sleep 0'";
    assert_eq!(ShimCommand::classify(cmd, "alice"), ShimCommand::RunPayload);
}

#[test]
fn everything_else_passes_through() {
    for cmd in [
        "/bin/sh -c 'chmod u+x /home/alice/.ansible/tmp/ansible-tmp-1/ && sleep 0'",
        "/bin/sh -c 'rm -f -r /home/alice/.ansible/tmp/ansible-tmp-1/ > /dev/null 2>&1 && sleep 0'",
        "",
    ] {
        assert_eq!(ShimCommand::classify(cmd, "alice"), ShimCommand::Passthrough, "{cmd}");
    }
}

#[test]
fn platform_report_lists_interpreters() {
    let interpreters = vec!["/usr/bin/python3".to_owned(), "/usr/bin/python".to_owned()];
    assert_eq!(
        platform_report("Linux", &interpreters),
        "PLATFORM\nLinux\nFOUND\n/usr/bin/python3\n/usr/bin/python\nENDFOUND\n"
    );
    assert_eq!(platform_report("Darwin", &[]), "PLATFORM\nDarwin\nFOUND\nENDFOUND\n");
}

#[test]
fn config_defaults_and_overrides() {
    let config = TransportConfig::from_toml("").unwrap();
    assert_eq!(config, TransportConfig::default());
    assert_eq!(config.work_type, "ansible-local");
    assert_eq!(config.remote_addr, "localhost");

    let config = TransportConfig::from_toml(
        r#"
socket_path = "/run/receptor.sock"
remote_user = "deploy"
remote_addr = "node-b"
work_type = "python"
staging_path = "/var/tmp/bundle.py"
platform = "FreeBSD"
interpreters = ["/usr/local/bin/python3"]
result_timeout_secs = 30
"#,
    )
    .unwrap();
    assert_eq!(config.socket_path.to_str(), Some("/run/receptor.sock"));
    assert_eq!(config.remote_user.as_deref(), Some("deploy"));
    assert_eq!(config.remote_addr, "node-b");
    assert_eq!(config.work_type, "python");
    assert_eq!(config.interpreters, ["/usr/local/bin/python3"]);
    assert_eq!(config.result_timeout_secs, Some(30));
}

#[test]
fn invalid_config_is_an_error() {
    assert!(TransportConfig::from_toml("interpreters = 3").is_err());
}
