//! Push-channel tests against a local tokio-tungstenite server.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as Frame;

use ailoop_sdk::{AiloopClient, ClientConfig, ConnectionEvent, Error};

const WAIT: Duration = Duration::from_secs(5);

/// Accepts sockets on `/ws`, reports every text frame it receives, and sends
/// whatever `push` yields to the most recent socket. A socket is dropped when
/// `push` yields `None`.
async fn spawn_server() -> (
    String,
    mpsc::UnboundedReceiver<Value>,
    mpsc::UnboundedSender<Option<Value>>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let (push_tx, push_rx) = mpsc::unbounded_channel::<Option<Value>>();
    let push_rx = Arc::new(tokio::sync::Mutex::new(push_rx));

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
            let seen_tx = seen_tx.clone();
            let mut push_rx = push_rx.lock().await;
            loop {
                tokio::select! {
                    frame = socket.next() => match frame {
                        Some(Ok(Frame::Text(text))) => {
                            let value: Value = serde_json::from_str(text.as_str()).unwrap();
                            let _ = seen_tx.send(value);
                        },
                        Some(Ok(_)) => {},
                        _ => break,
                    },
                    push = push_rx.recv() => match push {
                        Some(Some(value)) => {
                            socket.send(Frame::text(value.to_string())).await.unwrap();
                        },
                        _ => {
                            let _ = socket.close(None).await;
                            break;
                        },
                    },
                }
            }
        }
    });

    (url, seen_rx, push_tx)
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

fn client(url: &str) -> AiloopClient {
    let config = ClientConfig::new(url)
        .with_reconnect_attempts(3)
        .with_reconnect_delay(Duration::from_millis(20));
    AiloopClient::new(config).unwrap()
}

fn event_recorder(client: &AiloopClient) -> mpsc::UnboundedReceiver<ConnectionEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.add_connection_handler(move |event: ConnectionEvent| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(event);
            Ok::<(), Error>(())
        }
    });
    rx
}

#[tokio::test]
async fn test_subscribe_and_receive_frames() {
    let (url, mut seen, push) = spawn_server().await;
    let client = client(&url);
    let mut events = event_recorder(&client);

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let (got_tx, mut got_rx) = mpsc::unbounded_channel();
    client.add_message_handler(move |message: Value| {
        let sink = Arc::clone(&sink);
        let got_tx = got_tx.clone();
        async move {
            sink.lock().push(message);
            let _ = got_tx.send(());
            Ok::<(), Error>(())
        }
    });
    client.add_message_handler(|_: Value| async {
        Err::<(), Error>(Error::validation("this handler always fails"))
    });

    client.connect_websocket();
    assert_eq!(next(&mut events).await, ConnectionEvent::Connected);

    client.subscribe("ops").unwrap();
    assert_eq!(next(&mut seen).await, json!({"type": "subscribe", "channel": "ops"}));

    push.send(Some(json!({"type": "notification", "channel": "ops"})))
        .unwrap();
    next(&mut got_rx).await;
    assert_eq!(received.lock()[0]["type"], "notification");

    client.unsubscribe("ops").unwrap();
    assert_eq!(next(&mut seen).await, json!({"type": "unsubscribe", "channel": "ops"}));
    assert!(client.websocket().subscriptions().is_empty());

    client.close().await;
    assert!(!client.websocket().is_connected());
}

#[tokio::test]
async fn test_reconnect_restores_subscriptions() {
    let (url, mut seen, push) = spawn_server().await;
    let client = client(&url);
    let mut events = event_recorder(&client);

    client.connect_websocket();
    assert_eq!(next(&mut events).await, ConnectionEvent::Connected);
    client.subscribe("builds").unwrap();
    client.subscribe("alerts").unwrap();
    next(&mut seen).await;
    next(&mut seen).await;

    // server drops the socket
    push.send(None).unwrap();
    assert!(matches!(
        next(&mut events).await,
        ConnectionEvent::Disconnected { .. }
    ));
    assert_eq!(next(&mut events).await, ConnectionEvent::Connected);

    let mut restored = vec![next(&mut seen).await, next(&mut seen).await];
    restored.sort_by_key(|frame| frame["channel"].as_str().unwrap_or_default().to_string());
    assert_eq!(
        restored,
        vec![
            json!({"type": "subscribe", "channel": "alerts"}),
            json!({"type": "subscribe", "channel": "builds"}),
        ]
    );

    client.disconnect_websocket().await;
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = client(&url);
    let mut events = event_recorder(&client);
    client.connect_websocket();

    assert_eq!(next(&mut events).await, ConnectionEvent::GaveUp { attempts: 3 });
    tokio::time::timeout(WAIT, async {
        while client.websocket().is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert!(client.subscribe("ops").is_err());
}

#[tokio::test]
async fn test_close_interrupts_stuck_handler() {
    let (url, mut seen, push) = spawn_server().await;
    let client = client(&url);
    let mut events = event_recorder(&client);

    let (started_tx, mut started) = mpsc::unbounded_channel();
    client.add_message_handler(move |_: Value| {
        let started_tx = started_tx.clone();
        async move {
            let _ = started_tx.send(());
            std::future::pending::<()>().await;
            Ok::<(), Error>(())
        }
    });

    client.connect_websocket();
    assert_eq!(next(&mut events).await, ConnectionEvent::Connected);
    push.send(Some(json!({"type": "notification", "channel": "ops"})))
        .unwrap();
    next(&mut started).await;

    // Control frames still flow while the handler is busy.
    client.subscribe("ops").unwrap();
    assert_eq!(next(&mut seen).await, json!({"type": "subscribe", "channel": "ops"}));

    tokio::time::timeout(Duration::from_secs(3), client.close())
        .await
        .expect("close blocked on a running handler");
    assert!(!client.websocket().is_running());
}
