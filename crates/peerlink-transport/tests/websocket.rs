//! Integration tests for the reconnecting WebSocket transport.
//!
//! Each test runs a tiny relay on an OS-assigned port and drives the
//! client transport against it, so frames really cross a socket.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use peerlink_transport::{ConnectionStatus, Endpoint, TransportConfig, WebSocketTransport};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_config() -> TransportConfig {
        TransportConfig::with_reconnect_delay(Duration::from_millis(50))
    }

    async fn relay() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
        let port = listener.local_addr().expect("local addr").port();
        (listener, Endpoint::resolve("127.0.0.1", port, false))
    }

    async fn accept(listener: &TcpListener) -> ServerWs {
        let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
            .await
            .expect("client should dial in time")
            .expect("should accept");
        tokio_tungstenite::accept_async(stream)
            .await
            .expect("handshake should succeed")
    }

    fn watch_status(
        transport: &WebSocketTransport,
    ) -> (
        peerlink_transport::Subscription,
        mpsc::UnboundedReceiver<ConnectionStatus>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = transport.subscribe_status(move |s| {
            let _ = tx.send(*s);
        });
        (sub, rx)
    }

    /// Collects transitions until `want` shows up.
    async fn wait_for(
        rx: &mut mpsc::UnboundedReceiver<ConnectionStatus>,
        want: ConnectionStatus,
    ) -> Vec<ConnectionStatus> {
        let mut seen = Vec::new();
        loop {
            let next = tokio::time::timeout(WAIT, rx.recv())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {want}, saw {seen:?}"))
                .expect("status feed open");
            seen.push(next);
            if next == want {
                return seen;
            }
        }
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (listener, endpoint) = relay().await;
        let transport = WebSocketTransport::with_endpoint(fast_config(), endpoint);
        let (_status_sub, mut statuses) = watch_status(&transport);

        let (frame_tx, mut frames) = mpsc::unbounded_channel::<String>();
        let _frame_sub = transport.subscribe(move |text| {
            let _ = frame_tx.send(text.to_string());
        });

        assert!(transport.connect());
        let mut server = accept(&listener).await;
        wait_for(&mut statuses, ConnectionStatus::Connected).await;

        // --- Server sends, client receives ---
        server
            .send(Message::Text(r#"{"type":"connected","peer_id":"p1"}"#.into()))
            .await
            .unwrap();
        let got = tokio::time::timeout(WAIT, frames.recv()).await.unwrap().unwrap();
        assert_eq!(got, r#"{"type":"connected","peer_id":"p1"}"#);

        // --- Client sends, server receives ---
        assert!(transport.send(&serde_json::json!({ "cmd": "list_peers" })));
        let msg = tokio::time::timeout(WAIT, server.next()).await.unwrap().unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
        assert_eq!(value["cmd"], "list_peers");

        transport.shutdown().await.expect("shutdown");
        assert_eq!(transport.status(), ConnectionStatus::Closed);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_every_frame() {
        let (listener, endpoint) = relay().await;
        let transport = WebSocketTransport::with_endpoint(fast_config(), endpoint);
        let (_status_sub, mut statuses) = watch_status(&transport);

        let (a_tx, mut a_rx) = mpsc::unbounded_channel::<String>();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel::<String>();
        let _a = transport.subscribe(move |t| {
            let _ = a_tx.send(t.to_string());
        });
        let _b = transport.subscribe(move |t| {
            let _ = b_tx.send(t.to_string());
        });

        transport.connect();
        let mut server = accept(&listener).await;
        wait_for(&mut statuses, ConnectionStatus::Connected).await;

        for n in 0..3 {
            server.send(Message::Text(format!("{{\"n\":{n}}}").into())).await.unwrap();
        }
        for n in 0..3 {
            let expected = format!("{{\"n\":{n}}}");
            assert_eq!(tokio::time::timeout(WAIT, a_rx.recv()).await.unwrap().unwrap(), expected);
            assert_eq!(tokio::time::timeout(WAIT, b_rx.recv()).await.unwrap().unwrap(), expected);
        }

        transport.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_dropped() {
        let transport = WebSocketTransport::new(fast_config());
        assert!(!transport.send(&serde_json::json!({ "cmd": "list_peers" })));
        assert_eq!(transport.status(), ConnectionStatus::Idle);
    }

    #[tokio::test]
    async fn test_connect_without_endpoint_is_noop() {
        let transport = WebSocketTransport::new(fast_config());
        assert!(!transport.connect());
        assert_eq!(transport.status(), ConnectionStatus::Idle);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_while_running() {
        let (listener, endpoint) = relay().await;
        let transport = WebSocketTransport::with_endpoint(fast_config(), endpoint);
        let (_sub, mut statuses) = watch_status(&transport);

        assert!(transport.connect());
        assert!(!transport.connect(), "second connect should be a no-op");
        let _server = accept(&listener).await;
        wait_for(&mut statuses, ConnectionStatus::Connected).await;
        assert!(!transport.connect());

        transport.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reconnects_after_server_close() {
        let (listener, endpoint) = relay().await;
        let transport = WebSocketTransport::with_endpoint(fast_config(), endpoint);
        let (_sub, mut statuses) = watch_status(&transport);

        transport.connect();
        let mut first = accept(&listener).await;
        wait_for(&mut statuses, ConnectionStatus::Connected).await;

        // Server drops the client without a teardown on the client side.
        first.close(None).await.unwrap();
        drop(first);

        let seen = wait_for(&mut statuses, ConnectionStatus::Closed).await;
        assert_eq!(seen.last(), Some(&ConnectionStatus::Closed));

        // A new attempt is scheduled after the fixed delay.
        let _second = accept(&listener).await;
        let seen = wait_for(&mut statuses, ConnectionStatus::Connected).await;
        assert_eq!(
            seen,
            vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]
        );

        transport.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_attempt_reports_error_then_closed() {
        // Grab a free port, then release it so nothing listens there.
        let (listener, endpoint) = relay().await;
        drop(listener);

        let transport = WebSocketTransport::with_endpoint(fast_config(), endpoint);
        let (_sub, mut statuses) = watch_status(&transport);
        transport.connect();

        let seen = wait_for(&mut statuses, ConnectionStatus::Closed).await;
        assert_eq!(
            seen,
            vec![
                ConnectionStatus::Connecting,
                ConnectionStatus::Error,
                ConnectionStatus::Closed,
            ]
        );

        // Retry is unconditional.
        wait_for(&mut statuses, ConnectionStatus::Connecting).await;
        transport.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_suppresses_reconnect() {
        let (listener, endpoint) = relay().await;
        let transport = WebSocketTransport::with_endpoint(fast_config(), endpoint);
        let (_sub, mut statuses) = watch_status(&transport);

        transport.connect();
        let mut server = accept(&listener).await;
        wait_for(&mut statuses, ConnectionStatus::Connected).await;

        transport.shutdown().await.unwrap();
        wait_for(&mut statuses, ConnectionStatus::Closed).await;

        // The relay sees a close frame (or the socket ending).
        let ended = tokio::time::timeout(WAIT, server.next()).await.unwrap();
        assert!(matches!(ended, Some(Ok(Message::Close(_))) | None | Some(Err(_))));

        // Nobody dials back in, well past several reconnect delays.
        let redial = tokio::time::timeout(Duration::from_millis(300), listener.accept()).await;
        assert!(redial.is_err(), "transport reconnected after shutdown");
        assert!(statuses.try_recv().is_err(), "no transitions after teardown");
    }

    /// Queues enough data that a relay which never reads fills every
    /// socket buffer and leaves the driver parked in a write.
    fn stall_writes(transport: &WebSocketTransport) {
        let chunk = "x".repeat(4 * 1024 * 1024);
        for _ in 0..8 {
            assert!(transport.send_text(chunk.clone()));
        }
    }

    #[tokio::test]
    async fn test_shutdown_completes_while_relay_stops_reading() {
        let (listener, endpoint) = relay().await;
        let transport = WebSocketTransport::with_endpoint(fast_config(), endpoint);
        let (_sub, mut statuses) = watch_status(&transport);

        transport.connect();
        let _silent = accept(&listener).await;
        wait_for(&mut statuses, ConnectionStatus::Connected).await;

        stall_writes(&transport);
        tokio::time::sleep(Duration::from_millis(100)).await;

        tokio::time::timeout(Duration::from_secs(3), transport.shutdown())
            .await
            .expect("shutdown should not wait on a stalled write")
            .unwrap();
        assert_eq!(transport.status(), ConnectionStatus::Closed);
    }

    #[tokio::test]
    async fn test_reconnect_after_close_survives_old_link_ending() {
        let (listener, endpoint) = relay().await;
        let transport = WebSocketTransport::with_endpoint(fast_config(), endpoint);
        let (_sub, mut statuses) = watch_status(&transport);

        transport.connect();
        let first = accept(&listener).await;
        wait_for(&mut statuses, ConnectionStatus::Connected).await;

        // Keep the first driver busy so it is still winding down when the
        // second one comes up.
        stall_writes(&transport);
        tokio::time::sleep(Duration::from_millis(100)).await;
        transport.close();
        assert!(transport.connect(), "a fresh driver should start after close");

        let mut second = accept(&listener).await;
        wait_for(&mut statuses, ConnectionStatus::Connected).await;

        // The old socket goes away and its driver exits.
        drop(first);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(transport.status(), ConnectionStatus::Connected);
        assert!(transport.send_text("{\"cmd\":\"list_peers\"}".to_string()));
        let frame = tokio::time::timeout(WAIT, second.next())
            .await
            .expect("frame should reach the live link")
            .expect("stream open")
            .expect("frame ok");
        assert_eq!(frame, Message::Text("{\"cmd\":\"list_peers\"}".into()));

        transport.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unsubscribed_handler_sees_no_more_frames() {
        let (listener, endpoint) = relay().await;
        let transport = WebSocketTransport::with_endpoint(fast_config(), endpoint);
        let (_sub, mut statuses) = watch_status(&transport);

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let sub = transport.subscribe(move |t| {
            let _ = tx.send(t.to_string());
        });
        let (keep_tx, mut keep_rx) = mpsc::unbounded_channel::<String>();
        let _keep = transport.subscribe(move |t| {
            let _ = keep_tx.send(t.to_string());
        });

        transport.connect();
        let mut server = accept(&listener).await;
        wait_for(&mut statuses, ConnectionStatus::Connected).await;

        server.send(Message::Text("{\"a\":1}".into())).await.unwrap();
        tokio::time::timeout(WAIT, keep_rx.recv()).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("{\"a\":1}"));

        sub.unsubscribe();
        server.send(Message::Text("{\"a\":2}".into())).await.unwrap();
        tokio::time::timeout(WAIT, keep_rx.recv()).await.unwrap();
        // The handler (and its sender) is gone, so the channel is closed.
        assert_eq!(rx.recv().await, None);

        transport.shutdown().await.unwrap();
    }
}
