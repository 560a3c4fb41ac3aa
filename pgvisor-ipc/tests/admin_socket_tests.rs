use pgvisor_core::{AdminControl, ProcessState, ProcessStatus};
use pgvisor_ipc::{AdminClient, AdminRequest, AdminResponse, AdminServer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

#[derive(Default)]
struct FakeSupervisor {
    stopping: AtomicBool,
}

impl AdminControl for FakeSupervisor {
    fn supervisor_name(&self) -> &str {
        "flypg"
    }

    fn snapshot(&self) -> Vec<ProcessStatus> {
        ["keeper", "sentinel"]
            .into_iter()
            .enumerate()
            .map(|(i, name)| ProcessStatus {
                name: name.to_string(),
                state: ProcessState::Running,
                pid: Some(100 + i as u32),
                restarts: 0,
                restart_policy: "never".to_string(),
                last_exit_code: None,
            })
            .collect()
    }

    fn request_stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }
}

async fn serve(dir: &TempDir) -> (std::path::PathBuf, Arc<FakeSupervisor>) {
    let path = dir.path().join("admin.sock");
    let fake = Arc::new(FakeSupervisor::default());

    let server = AdminServer::bind(&path).await.unwrap();
    let control: Arc<dyn AdminControl> = fake.clone();
    tokio::spawn(server.serve(control));

    (path, fake)
}

#[tokio::test]
async fn test_ping_status_stop_on_one_connection() {
    let dir = TempDir::new().unwrap();
    let (path, fake) = serve(&dir).await;

    let mut client = AdminClient::connect(&path).await.unwrap();

    assert_eq!(
        client.request(&AdminRequest::Ping).await.unwrap(),
        AdminResponse::Pong
    );

    match client.request(&AdminRequest::Status).await.unwrap() {
        AdminResponse::Status {
            supervisor,
            processes,
        } => {
            assert_eq!(supervisor, "flypg");
            assert_eq!(processes.len(), 2);
            assert_eq!(processes[1].name, "sentinel");
            assert_eq!(processes[1].pid, Some(101));
        }
        other => panic!("unexpected response: {other:?}"),
    }

    assert!(matches!(
        client.request(&AdminRequest::Stop).await.unwrap(),
        AdminResponse::Success { .. }
    ));
    assert!(fake.is_stopping());
}

#[tokio::test]
async fn test_concurrent_clients() {
    let dir = TempDir::new().unwrap();
    let (path, _fake) = serve(&dir).await;

    let clients: Vec<_> = (0..8)
        .map(|_| {
            let path = path.clone();
            tokio::spawn(async move {
                let mut client = AdminClient::connect(&path).await.unwrap();
                for _ in 0..10 {
                    let response = client.request(&AdminRequest::Ping).await.unwrap();
                    assert_eq!(response, AdminResponse::Pong);
                }
            })
        })
        .collect();

    for client in clients {
        timeout(Duration::from_secs(5), client)
            .await
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn test_bind_replaces_stale_socket() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stale.sock");
    std::fs::write(&path, b"left over").unwrap();

    let server = AdminServer::bind(&path).await.unwrap();
    assert_eq!(server.path(), path.as_path());

    drop(server);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_raw_connection_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("raw.sock");
    let server = AdminServer::bind(&path).await.unwrap();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept().await.unwrap();
        assert_eq!(conn.recv().await.unwrap(), Some(AdminRequest::Status));
        conn.send(&AdminResponse::Error {
            message: "not ready".to_string(),
        })
        .await
        .unwrap();
        assert_eq!(conn.recv().await.unwrap(), None);
    });

    let mut client = AdminClient::connect(&path).await.unwrap();
    client.send(&AdminRequest::Status).await.unwrap();
    assert_eq!(
        client.recv().await.unwrap(),
        AdminResponse::Error {
            message: "not ready".to_string()
        }
    );
    drop(client);

    server_task.await.unwrap();
}

#[tokio::test]
async fn test_connect_without_server_fails() {
    let dir = TempDir::new().unwrap();
    assert!(
        AdminClient::connect(dir.path().join("nobody.sock"))
            .await
            .is_err()
    );
}
