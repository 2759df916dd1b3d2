//! Tests for CLI command logic against an in-process stub node.

use clap::Parser;
use receptor_cli::Cli;
use stubd::{ServeHandle, StubConfig, WorkerKind, serve_with_config};
use tempfile::TempDir;

async fn start() -> (TempDir, ServeHandle) {
    let dir = tempfile::tempdir().unwrap();
    let config = StubConfig::default()
        .with_socket_path(dir.path().join("receptor.sock"))
        .with_worker("ansible-local", WorkerKind::Length)
        .with_worker(
            "broken",
            WorkerKind::Fail {
                message: "interpreter crashed".into(),
            },
        );
    let handle = serve_with_config(&config).await.unwrap();
    (dir, handle)
}

async fn rctl(handle: &ServeHandle, args: &[&str]) -> anyhow::Result<String> {
    let socket = handle.socket_path.to_str().unwrap();
    let argv = ["rctl", "--socket", socket].into_iter().chain(args.iter().copied());
    let mut out = Vec::new();
    Cli::parse_from(argv).run_with(&mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn submit_follow_prints_output_and_releases() {
    let (dir, handle) = start().await;
    let payload = dir.path().join("payload.py");
    std::fs::write(&payload, "print('hi')").unwrap();

    let out = rctl(
        &handle,
        &["submit", "--work-type", "ansible-local", "--follow", payload.to_str().unwrap()],
    )
    .await
    .unwrap();
    assert_eq!(out, "11");
    assert!(handle.daemon.units.list().is_empty());
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_follow_still_releases() {
    let (dir, handle) = start().await;
    let payload = dir.path().join("payload.py");
    std::fs::write(&payload, "print('hi')").unwrap();

    let err = rctl(
        &handle,
        &["submit", "--work-type", "broken", "--follow", payload.to_str().unwrap()],
    )
    .await
    .unwrap_err();
    assert!(format!("{err:#}").contains("interpreter crashed"), "{err:#}");
    assert!(handle.daemon.units.list().is_empty());
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn list_without_units_prints_empty_object() {
    let (_dir, handle) = start().await;
    let out = rctl(&handle, &["list"]).await.unwrap();
    let units: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(units, serde_json::json!({}));
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn submit_then_manage_unit() {
    let (dir, handle) = start().await;
    let payload = dir.path().join("payload.txt");
    std::fs::write(&payload, "hello").unwrap();

    let out = rctl(&handle, &["submit", "--work-type", "echo", payload.to_str().unwrap()])
        .await
        .unwrap();
    let id = out.trim().to_owned();
    assert!(handle.daemon.units.get(&id).is_some());

    let out = rctl(&handle, &["results", &id]).await.unwrap();
    assert_eq!(out, "hello");

    let out = rctl(&handle, &["status", &id]).await.unwrap();
    let status: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(status["StateName"], "Succeeded");
    assert_eq!(status["StdoutSize"], 5);

    let out = rctl(&handle, &["list"]).await.unwrap();
    assert!(out.contains(&id), "{out}");

    let out = rctl(&handle, &["release", &id]).await.unwrap();
    assert_eq!(out, format!("released {id}\n"));
    let out = rctl(&handle, &["list"]).await.unwrap();
    assert_eq!(out, "{}\n");
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_work_type_fails() {
    let (dir, handle) = start().await;
    let payload = dir.path().join("payload.txt");
    std::fs::write(&payload, "x").unwrap();

    let err = rctl(&handle, &["submit", "--work-type", "unknown", payload.to_str().unwrap()])
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("unknown"), "{err:#}");
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn status_of_unknown_unit_fails() {
    let (_dir, handle) = start().await;
    let err = rctl(&handle, &["status", "nosuchid"]).await.unwrap_err();
    assert!(format!("{err:#}").contains("unknown work unit nosuchid"), "{err:#}");
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_socket_fails_to_connect() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("absent.sock");
    let cli = Cli::parse_from(["rctl", "--socket", socket.to_str().unwrap(), "list"]);
    let mut out = Vec::new();
    let err = cli.run_with(&mut out).await.unwrap_err();
    assert!(err.to_string().contains("failed to connect"), "{err:#}");
}
