//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it
//! with a `tokio-tungstenite` client (and, for the liveness route, with
//! raw TCP).

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use gambit_transport::{Connection, Transport, TransportError, WebSocketTransport};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs =
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>;

    async fn bind() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address").to_string();
        (transport, addr)
    }

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/"))
            .await
            .expect("client should connect");
        ws
    }

    async fn http_get(addr: &str, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.expect("tcp connect");
        let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bind().await;
        let server_handle = tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");
        assert!(server_conn.id().into_inner() > 0);
        assert!(server_conn.remote_addr().ip().is_loopback());

        // Server → client: JSON goes out as a text frame.
        server_conn.send(br#"{"seq":1}"#).await.expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_data().as_ref(), br#"{"seq":1}"#);

        // Client → server, binary and text alike.
        client_ws
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .unwrap();
        let received = server_conn.recv().await.unwrap().expect("should have data");
        assert_eq!(received, b"hello from client");

        client_ws.send(Message::Text("text frame".into())).await.unwrap();
        let received = server_conn.recv().await.unwrap().expect("should have data");
        assert_eq!(received, b"text frame");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (mut transport, addr) = bind().await;
        let server_handle = tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_pending() {
        let (mut transport, addr) = bind().await;
        let server_handle = tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = std::sync::Arc::new(server_handle.await.unwrap());

        // Park a reader on the connection, then send from elsewhere.
        let reader = {
            let conn = std::sync::Arc::clone(&server_conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(1), server_conn.send(b"push"))
            .await
            .expect("send must not wait for the pending recv")
            .unwrap();
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"push");

        client_ws.send(Message::Close(None)).await.unwrap();
        assert!(reader.await.unwrap().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_health_probe_answered_without_upgrade() {
        let (mut transport, addr) = bind().await;
        let server_handle = tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let response = http_get(&addr, "/healthz").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"), "got {response:?}");
        assert!(response.ends_with("ok"));

        // The probe did not consume the accept; a real client still gets through.
        let _client_ws = connect_client(&addr).await;
        let conn = server_handle.await.unwrap();
        assert!(conn.id().into_inner() > 0);
    }

    #[tokio::test]
    async fn test_custom_health_path() {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .unwrap()
            .with_health_path("/live");
        let addr = transport.local_addr().unwrap().to_string();
        let mut transport = transport;
        tokio::spawn(async move {
            let _ = transport.accept().await;
        });

        let response = http_get(&addr, "/live").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn test_stalled_streams_do_not_block_accept() {
        let (mut transport, addr) = bind().await;
        let server_handle = tokio::spawn(async move { transport.accept().await.expect("should accept") });

        // One stream never speaks; the other stops inside `GET /healthz`.
        let _silent = TcpStream::connect(&addr).await.unwrap();
        let mut partial = TcpStream::connect(&addr).await.unwrap();
        partial.write_all(b"G").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let probe = tokio::time::timeout(Duration::from_secs(2), http_get(&addr, "/healthz"))
            .await
            .expect("probe should be answered while others stall");
        assert!(probe.starts_with("HTTP/1.1 200 OK"));

        let _client_ws = tokio::time::timeout(Duration::from_secs(2), connect_client(&addr))
            .await
            .expect("handshake should not wait on stalled streams");
        let conn = tokio::time::timeout(Duration::from_secs(2), server_handle)
            .await
            .expect("accept should return promptly")
            .unwrap();
        assert!(conn.remote_addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_accept_after_shutdown_fails() {
        let (mut transport, _addr) = bind().await;
        transport.shutdown().await.unwrap();

        let result = transport.accept().await;

        assert!(matches!(result, Err(TransportError::Shutdown)));
    }
}
