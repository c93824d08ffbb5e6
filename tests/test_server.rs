use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use stompd::server::{Acceptor, BindError};
use stompd::stomp::{BodyFraming, ChannelSink, Frame, encode_frame};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn frame(verb: &str, seq: usize) -> Frame {
    let mut headers = HashMap::new();
    headers.insert("seq".to_string(), seq.to_string());
    Frame::new(verb, headers, format!("payload-{}", seq).into_bytes())
}

/// Polls the live connection count until it reaches `expected`.
async fn wait_for_count(acceptor: &Acceptor, expected: usize) {
    timeout(Duration::from_secs(5), async {
        while acceptor.connection_count().await != expected {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("connection count never reached {}", expected));
}

#[tokio::test]
async fn test_frames_delivered_in_order() {
    let (sink, mut rx) = ChannelSink::channel();
    let acceptor = Acceptor::new(Arc::new(sink));
    let addr = acceptor.start(loopback()).await.unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();
    for seq in 0..5 {
        let framing = if seq % 2 == 0 {
            BodyFraming::Length
        } else {
            BodyFraming::Terminated
        };
        client
            .write_all(&encode_frame(&frame("SEND", seq), framing))
            .await
            .unwrap();
    }

    let mut conn_ids = Vec::new();
    for seq in 0..5 {
        let (conn, received) = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.header("seq"), Some(seq.to_string().as_str()));
        assert_eq!(&received.body()[..], format!("payload-{}", seq).as_bytes());
        conn_ids.push(conn);
    }
    assert!(conn_ids.iter().all(|id| *id == conn_ids[0]));

    drop(client);
    wait_for_count(&acceptor, 0).await;
    acceptor.stop().await;
}

#[tokio::test]
async fn test_concurrent_connections() {
    const CLIENTS: usize = 50;

    let (sink, mut rx) = ChannelSink::channel();
    let acceptor = Arc::new(Acceptor::new(Arc::new(sink)));
    let addr = acceptor.start(loopback()).await.unwrap();

    let mut clients = Vec::new();
    for seq in 0..CLIENTS {
        clients.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(&encode_frame(&frame("SEND", seq), BodyFraming::Length))
                .await
                .unwrap();
            stream
        }));
    }

    let mut streams = Vec::new();
    for client in clients {
        streams.push(client.await.unwrap());
    }

    let mut seen = Vec::new();
    for _ in 0..CLIENTS {
        let (_, received) = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        seen.push(received.header("seq").unwrap().parse::<usize>().unwrap());
    }
    seen.sort();
    assert_eq!(seen, (0..CLIENTS).collect::<Vec<_>>());

    wait_for_count(&acceptor, CLIENTS).await;

    drop(streams);
    wait_for_count(&acceptor, 0).await;
    acceptor.stop().await;
}

#[tokio::test]
async fn test_disconnect_mid_header_removes_connection() {
    let (sink, mut rx) = ChannelSink::channel();
    let acceptor = Acceptor::new(Arc::new(sink));
    let addr = acceptor.start(loopback()).await.unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();
    wait_for_count(&acceptor, 1).await;

    client.write_all(b"SEND\ndestina").await.unwrap();
    drop(client);

    wait_for_count(&acceptor, 0).await;
    assert!(rx.try_recv().is_err());

    acceptor.stop().await;
}

#[tokio::test]
async fn test_malformed_length_closes_connection() {
    let (sink, mut rx) = ChannelSink::channel();
    let acceptor = Acceptor::new(Arc::new(sink));
    let addr = acceptor.start(loopback()).await.unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"SEND\nlength: abc\n\nxyz").await.unwrap();

    wait_for_count(&acceptor, 0).await;
    assert!(rx.try_recv().is_err());

    // Server side closed the socket, so the client sees EOF.
    let mut buf = [0u8; 16];
    let n = timeout(Duration::from_secs(5), async {
        use tokio::io::AsyncReadExt;
        client.read(&mut buf).await
    })
    .await
    .unwrap()
    .unwrap_or(0);
    assert_eq!(n, 0);

    acceptor.stop().await;
}

#[tokio::test]
async fn test_stop_closes_live_connections() {
    let (sink, _rx) = ChannelSink::channel();
    let acceptor = Acceptor::new(Arc::new(sink));
    let addr = acceptor.start(loopback()).await.unwrap();

    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(TcpStream::connect(addr).await.unwrap());
    }
    wait_for_count(&acceptor, 3).await;

    acceptor.stop().await;
    assert_eq!(acceptor.connection_count().await, 0);
    assert!(!acceptor.is_running().await);

    // The listening socket is gone as well.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let (sink, _rx) = ChannelSink::channel();
    let acceptor = Acceptor::new(Arc::new(sink));

    acceptor.stop().await;
    assert_eq!(acceptor.connection_count().await, 0);

    acceptor.start(loopback()).await.unwrap();
    acceptor.stop().await;
    acceptor.stop().await;
    assert_eq!(acceptor.connection_count().await, 0);
    assert!(acceptor.local_addr().await.is_none());
}

#[tokio::test]
async fn test_start_twice_fails() {
    let (sink, _rx) = ChannelSink::channel();
    let acceptor = Acceptor::new(Arc::new(sink));
    let addr = acceptor.start(loopback()).await.unwrap();

    let err = acceptor.start(loopback()).await.unwrap_err();
    assert!(matches!(err, BindError::AlreadyRunning(a) if a == addr));

    acceptor.stop().await;
}

#[tokio::test]
async fn test_bind_conflict_reported() {
    let (sink, _rx) = ChannelSink::channel();
    let first = Acceptor::new(Arc::new(sink.clone()));
    let second = Acceptor::new(Arc::new(sink));

    let addr = first.start(loopback()).await.unwrap();
    let err = second.start(addr).await.unwrap_err();
    assert!(matches!(err, BindError::Io { .. }));

    first.stop().await;
}

#[tokio::test]
async fn test_restart_after_stop() {
    let (sink, mut rx) = ChannelSink::channel();
    let acceptor = Acceptor::new(Arc::new(sink));

    acceptor.start(loopback()).await.unwrap();
    acceptor.stop().await;

    let addr = acceptor.start(loopback()).await.unwrap();
    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(&encode_frame(&frame("SEND", 7), BodyFraming::Terminated))
        .await
        .unwrap();

    let (_, received) = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.header("seq"), Some("7"));

    acceptor.stop().await;
}
