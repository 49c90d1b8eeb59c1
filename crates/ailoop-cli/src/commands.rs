//! Command bodies that go beyond a single client call.

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use ailoop_sdk::{AiloopClient, ConnectionEvent, Error};

use crate::TaskCommands;

/// Print `value` as pretty JSON on stdout.
pub fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_ok() -> Result<()> {
    print(&json!({"ok": true}))
}

/// clap value parser for flags that take a JSON object.
pub fn parse_object(input: &str) -> std::result::Result<Map<String, Value>, String> {
    match serde_json::from_str(input) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {other}")),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}

pub(crate) async fn task(client: &AiloopClient, command: TaskCommands) -> Result<()> {
    match command {
        TaskCommands::Create {
            title,
            description,
            assignee,
            metadata,
        } => {
            let task = client
                .create_task(&title, &description, None, assignee, metadata)
                .await?;
            print(&task)
        },
        TaskCommands::List { state } => {
            let state = state.map(|state| state.as_str());
            print(&client.list_tasks(None, state).await?)
        },
        TaskCommands::Show { id } => print(&client.get_task(&id).await?),
        TaskCommands::Update { id, state } => print(&client.set_task_state(&id, state).await?),
        TaskCommands::Ready => print(&client.get_ready_tasks(None).await?),
        TaskCommands::Blocked => print(&client.get_blocked_tasks(None).await?),
        TaskCommands::Graph { id } => print(&client.get_dependency_graph(&id).await?),
        TaskCommands::Depend {
            id,
            depends_on,
            dependency_type,
        } => {
            client
                .add_dependency(&id, &depends_on, dependency_type.as_str())
                .await?;
            print_ok()
        },
        TaskCommands::Undepend { id, depends_on } => {
            client.remove_dependency(&id, &depends_on).await?;
            print_ok()
        },
    }
}

/// Open the push channel and print each inbound frame as one JSON line until
/// Ctrl-C, or until the client gives up reconnecting.
pub async fn watch(client: AiloopClient, channels: Vec<String>) -> Result<()> {
    let channels = if channels.is_empty() {
        vec![client.config().channel.clone()]
    } else {
        channels
    };

    let (events_tx, mut events) = mpsc::unbounded_channel();
    client.add_connection_handler(move |event: ConnectionEvent| {
        let events_tx = events_tx.clone();
        async move {
            let _ = events_tx.send(event);
            Ok::<(), Error>(())
        }
    });
    client.add_message_handler(|frame: Value| async move {
        println!("{frame}");
        Ok::<(), Error>(())
    });

    client.connect_websocket();
    let mut subscribed = false;
    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            event = events.recv() => match event {
                // Later reconnects restore subscriptions on their own.
                Some(ConnectionEvent::Connected) if !subscribed => {
                    if let Err(e) = channels.iter().try_for_each(|c| client.subscribe(c)) {
                        break Err(e.into());
                    }
                    subscribed = true;
                    tracing::info!(?channels, "watching");
                },
                Some(ConnectionEvent::GaveUp { attempts }) => {
                    break Err(anyhow::anyhow!(
                        "gave up after {attempts} reconnection attempts"
                    ));
                },
                Some(event) => tracing::info!(?event, "connection event"),
                None => break Ok(()),
            },
        }
    };
    client.close().await;
    outcome
}
