mod common;

use common::{plain_setup, AUTHORITY};
use hdl_issuer::{
    CreateOutcome, FailureKind, HandleCreationService, HandleTransport, StubHandleService,
    TcpTransport,
};
use hdl_wire::{Envelope, ENVELOPE_LEN};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve framed requests on `listener` with `stub` until the test ends.
fn spawn_server(listener: TcpListener, stub: StubHandleService) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let stub = stub.clone();
            tokio::spawn(async move {
                let mut frame = vec![0u8; ENVELOPE_LEN];
                socket.read_exact(&mut frame).await.unwrap();
                let envelope = Envelope::decode(&frame).unwrap();
                frame.resize(ENVELOPE_LEN + envelope.message_length as usize, 0);
                socket.read_exact(&mut frame[ENVELOPE_LEN..]).await.unwrap();

                let reply = stub.exchange(frame).await.unwrap();
                socket.write_all(&reply).await.unwrap();
            });
        }
    })
}

#[tokio::test]
async fn create_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (_dir, settings, key) = plain_setup();

    let stub = StubHandleService::new();
    stub.trust_key(AUTHORITY, 300, &key.public_key());
    let server = spawn_server(listener, stub.clone());

    let transport = Arc::new(TcpTransport::new(
        address,
        Duration::from_secs(5),
        Duration::from_secs(5),
    ));
    let service = HandleCreationService::with_transport(settings, transport);

    let first = service.create_handle("tcp-1", "over the wire").await.unwrap();
    assert_eq!(first, CreateOutcome::Success("100.1234/tcp-1".into()));
    let second = service.create_handle("tcp-1", "again").await.unwrap();
    assert_eq!(second, CreateOutcome::AlreadyExists);

    let values = stub.get("100.1234/tcp-1").unwrap();
    assert_eq!(values[1].data, b"over the wire");
    server.abort();
}

#[tokio::test]
async fn unreachable_server_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);
    let (_dir, settings, _key) = plain_setup();

    let transport = Arc::new(TcpTransport::new(
        address,
        Duration::from_secs(2),
        Duration::from_secs(2),
    ));
    let service = HandleCreationService::with_transport(settings, transport);

    let CreateOutcome::Failure(failure) = service.create_handle("abc", "x").await.unwrap() else {
        panic!("expected failure");
    };
    assert_eq!(failure.kind, FailureKind::Transport);
    assert!(failure.reason.contains("failed to connect"));
}
