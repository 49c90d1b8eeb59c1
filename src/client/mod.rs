//! Async client for an ailoop server.
//!
//! [`AiloopClient`] combines the HTTP API ([`http`]) with the optional push
//! channel ([`websocket`]).
//!
//! ```no_run
//! use ailoop_sdk::{AiloopClient, ClientConfig, NotificationPriority};
//!
//! # async fn example() -> ailoop_sdk::Result<()> {
//! let client = AiloopClient::new(ClientConfig::new("http://localhost:8080"))?;
//! client.connect().await?;
//!
//! client.say("build finished", None, NotificationPriority::Normal).await?;
//! let question = client.ask("Deploy to production?", None, None, None).await?;
//! println!("asked {}", question.id);
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod websocket;

use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use self::http::{HttpTransport, StatusMessages};
use self::websocket::{websocket_url, ConnectionHandler, MessageHandler, WebSocketChannel};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::{
    AddDependencyRequest, CreateTaskRequest, DependencyGraph, DependencyType, HealthResponse,
    Message, NotificationPriority, ResponseType, Task, TaskList, TaskState, UpdateTaskRequest,
    VersionCompatibility,
};

const MESSAGES_PATH: &str = "/api/v1/messages";
const HEALTH_PATH: &str = "/api/v1/health";
const TASKS_PATH: &str = "/api/v1/tasks";

/// `/api/v1/tasks/{task_id}{tail}`, with the id percent-encoded as one segment.
fn task_path(task_id: &str, tail: &str) -> String {
    format!("{TASKS_PATH}/{}{tail}", urlencoding::encode(task_id))
}

/// Client for one ailoop server.
///
/// `Send + Sync`; share it behind an [`Arc`] to use it from several tasks.
#[derive(Debug)]
pub struct AiloopClient {
    config: ClientConfig,
    http: HttpTransport,
    websocket: WebSocketChannel,
}

impl AiloopClient {
    /// Build a client. No I/O happens until the first call.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = config.base_url()?;
        config.validate()?;
        let http = HttpTransport::new(&base, config.timeout())?;
        let websocket = WebSocketChannel::new(
            websocket_url(&base)?,
            config.reconnect_attempts,
            config.reconnect_delay(),
        );
        Ok(Self {
            config,
            http,
            websocket,
        })
    }

    /// Client configured from `AILOOP_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The push channel.
    pub fn websocket(&self) -> &WebSocketChannel {
        &self.websocket
    }

    fn channel_or_default<'a>(&'a self, channel: Option<&'a str>) -> &'a str {
        channel.unwrap_or(&self.config.channel)
    }

    // ─── Connection ──────────────────────────────────────────────────────

    /// Check that the server answers and compare versions.
    ///
    /// A major-version mismatch is logged as a warning and does not fail.
    pub async fn connect(&self) -> Result<VersionCompatibility> {
        let compat = self.check_version_compatibility().await.map_err(|e| {
            let origin = e.origin().clone();
            Error::connection(format!("Failed to connect to ailoop server: {}", e.message()))
                .with_origin(origin)
        })?;
        if compat.compatible {
            tracing::info!(
                server_version = %compat.server_version,
                "Connected to ailoop server"
            );
        } else {
            tracing::warn!(
                client_version = %compat.client_version,
                server_version = %compat.server_version,
                "Version mismatch between client and server"
            );
        }
        Ok(compat)
    }

    /// Fetch `/api/v1/health` and compare the server's major version with
    /// this SDK's.
    pub async fn check_version_compatibility(&self) -> Result<VersionCompatibility> {
        let health = self.health().await?;
        Ok(VersionCompatibility::check(health))
    }

    /// Fetch `/api/v1/health`.
    pub async fn health(&self) -> Result<HealthResponse> {
        self.http.get(HEALTH_PATH, &[], &StatusMessages::new()).await
    }

    /// Stop the push channel. The HTTP pool is released when the client drops.
    pub async fn close(&self) {
        self.disconnect_websocket().await;
    }

    // ─── Messages ────────────────────────────────────────────────────────

    /// Post a question. `timeout_seconds` defaults to 60.
    ///
    /// When the push channel is open, the question's channel is subscribed so
    /// the answer arrives in real time; a failed subscription is only logged.
    pub async fn ask(
        &self,
        question: &str,
        channel: Option<&str>,
        timeout_seconds: Option<u32>,
        choices: Option<Vec<String>>,
    ) -> Result<Message> {
        let message = Message::create_question(
            self.channel_or_default(channel),
            question,
            timeout_seconds,
            choices,
        )?;
        let sent = self.send_message(&message).await?;

        if self.websocket.is_connected()
            && !self.websocket.subscriptions().contains(&sent.channel)
        {
            if let Err(e) = self.websocket.subscribe(&sent.channel) {
                tracing::warn!(error = %e, "Failed to subscribe to channel via WebSocket");
            }
        }
        Ok(sent)
    }

    /// Post an authorization request. `timeout_seconds` defaults to 300.
    pub async fn authorize(
        &self,
        action: &str,
        channel: Option<&str>,
        timeout_seconds: Option<u32>,
        context: Option<Map<String, Value>>,
    ) -> Result<Message> {
        let message = Message::create_authorization(
            self.channel_or_default(channel),
            action,
            timeout_seconds,
            context,
        )?;
        self.send_message(&message).await
    }

    /// Post a notification.
    pub async fn say(
        &self,
        text: &str,
        channel: Option<&str>,
        priority: NotificationPriority,
    ) -> Result<Message> {
        let message =
            Message::create_notification(self.channel_or_default(channel), text, priority)?;
        self.send_message(&message).await
    }

    /// Ask viewers of a channel to open `url`.
    pub async fn navigate(&self, url: &str, channel: Option<&str>) -> Result<Message> {
        let message = Message::create_navigate(self.channel_or_default(channel), url)?;
        self.send_message(&message).await
    }

    /// Fetch a message by id.
    pub async fn get_message(&self, message_id: Uuid) -> Result<Message> {
        let messages =
            StatusMessages::new().not_found(format!("Message not found: {message_id}"));
        let value: Value = self
            .http
            .get(&format!("{MESSAGES_PATH}/{message_id}"), &[], &messages)
            .await?;
        Message::from_value(value)
    }

    /// Answer a message. The original is fetched first to learn its channel.
    pub async fn respond(
        &self,
        original_message_id: Uuid,
        answer: Option<String>,
        response_type: ResponseType,
    ) -> Result<Message> {
        let original = self.get_message(original_message_id).await?;
        let response =
            Message::create_response(original.channel, original_message_id, answer, response_type)?;
        self.send_message(&response).await
    }

    /// Post a prepared message and return the server's copy.
    pub async fn send_message(&self, message: &Message) -> Result<Message> {
        message.validate()?;
        let messages = StatusMessages::new().bad_request("Invalid message");
        let value: Value = self.http.post(MESSAGES_PATH, message, &messages).await?;
        let sent = Message::from_value(value)?;
        tracing::debug!(
            id = %sent.id,
            channel = %sent.channel,
            kind = sent.content.type_name(),
            "Message sent"
        );
        Ok(sent)
    }

    // ─── Tasks ───────────────────────────────────────────────────────────

    /// Create a task on the server.
    pub async fn create_task(
        &self,
        title: &str,
        description: &str,
        channel: Option<&str>,
        assignee: Option<String>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Task> {
        let request = CreateTaskRequest {
            title: title.to_string(),
            description: description.to_string(),
            channel: self.channel_or_default(channel).to_string(),
            assignee,
            metadata,
        };
        self.http.post(TASKS_PATH, &request, &StatusMessages::new()).await
    }

    /// Change a task's state. `state` is parsed case-insensitively; an
    /// unknown state fails before any request is sent.
    pub async fn update_task(&self, task_id: &str, state: &str) -> Result<Task> {
        let state: TaskState = state.parse()?;
        self.set_task_state(task_id, state).await
    }

    /// Change a task's state.
    pub async fn set_task_state(&self, task_id: &str, state: TaskState) -> Result<Task> {
        let messages = StatusMessages::new().not_found(format!("Task not found: {task_id}"));
        self.http
            .put(
                &task_path(task_id, ""),
                &UpdateTaskRequest { state },
                &messages,
            )
            .await
    }

    /// Tasks in a channel, optionally filtered by state (sent lower-cased).
    pub async fn list_tasks(
        &self,
        channel: Option<&str>,
        state: Option<&str>,
    ) -> Result<Vec<Task>> {
        let state = state.map(|state| state.trim().to_lowercase());
        let mut query = vec![("channel", self.channel_or_default(channel))];
        if let Some(state) = state.as_deref() {
            query.push(("state", state));
        }
        let list: TaskList = self.http.get(TASKS_PATH, &query, &StatusMessages::new()).await?;
        Ok(list.tasks)
    }

    /// Fetch one task.
    pub async fn get_task(&self, task_id: &str) -> Result<Task> {
        let messages = StatusMessages::new().not_found(format!("Task not found: {task_id}"));
        self.http
            .get(&task_path(task_id, ""), &[], &messages)
            .await
    }

    /// Make `task_id` depend on `depends_on`.
    ///
    /// `dependency_type` is parsed case-insensitively. An unknown type or a
    /// self-dependency fails before any request is sent.
    pub async fn add_dependency(
        &self,
        task_id: &str,
        depends_on: &str,
        dependency_type: &str,
    ) -> Result<()> {
        let dependency_type: DependencyType = dependency_type.parse()?;
        if task_id == depends_on {
            return Err(Error::validation(format!("task {task_id} cannot depend on itself")));
        }
        let request = AddDependencyRequest {
            child_id: task_id.to_string(),
            parent_id: depends_on.to_string(),
            dependency_type,
        };
        let messages = StatusMessages::new().bad_request("Invalid dependency");
        self.http
            .post_unit(&task_path(task_id, "/dependencies"), &request, &messages)
            .await
    }

    /// Remove the edge from `task_id` to `depends_on`.
    pub async fn remove_dependency(&self, task_id: &str, depends_on: &str) -> Result<()> {
        let messages = StatusMessages::new().not_found(format!(
            "Dependency not found between {task_id} and {depends_on}"
        ));
        self.http
            .delete(
                &task_path(
                    task_id,
                    &format!("/dependencies/{}", urlencoding::encode(depends_on)),
                ),
                &messages,
            )
            .await
    }

    /// Pending tasks with no unresolved blocker.
    pub async fn get_ready_tasks(&self, channel: Option<&str>) -> Result<Vec<Task>> {
        let query = [("channel", self.channel_or_default(channel))];
        let list: TaskList = self
            .http
            .get(&format!("{TASKS_PATH}/ready"), &query, &StatusMessages::new())
            .await?;
        Ok(list.tasks)
    }

    /// Tasks with at least one unresolved blocker.
    pub async fn get_blocked_tasks(&self, channel: Option<&str>) -> Result<Vec<Task>> {
        let query = [("channel", self.channel_or_default(channel))];
        let list: TaskList = self
            .http
            .get(&format!("{TASKS_PATH}/blocked"), &query, &StatusMessages::new())
            .await?;
        Ok(list.tasks)
    }

    /// A task with its direct parents and children.
    pub async fn get_dependency_graph(&self, task_id: &str) -> Result<DependencyGraph> {
        let messages = StatusMessages::new().not_found(format!("Task not found: {task_id}"));
        self.http
            .get(&task_path(task_id, "/graph"), &[], &messages)
            .await
    }

    // ─── Push channel ────────────────────────────────────────────────────

    /// Start the push channel. Does nothing if it is already running.
    pub fn connect_websocket(&self) {
        self.websocket.connect();
    }

    /// Stop the push channel.
    pub async fn disconnect_websocket(&self) {
        self.websocket.disconnect().await;
    }

    /// Subscribe to a channel over the push channel.
    pub fn subscribe(&self, channel: &str) -> Result<()> {
        self.websocket.subscribe(channel)
    }

    /// Unsubscribe from a channel.
    pub fn unsubscribe(&self, channel: &str) -> Result<()> {
        self.websocket.unsubscribe(channel)
    }

    /// Register a handler for inbound push frames.
    pub fn add_message_handler(&self, handler: impl MessageHandler + 'static) {
        self.websocket.add_message_handler(Arc::new(handler));
    }

    /// Register a handler for push-channel connection events.
    pub fn add_connection_handler(&self, handler: impl ConnectionHandler + 'static) {
        self.websocket.add_connection_handler(Arc::new(handler));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn client_is_send_and_sync() {
        assert_send_sync::<AiloopClient>();
    }

    #[test]
    fn task_ids_stay_in_one_path_segment() {
        assert_eq!(task_path("t-1", ""), "/api/v1/tasks/t-1");
        assert_eq!(task_path("a/b?c#d", "/graph"), "/api/v1/tasks/a%2Fb%3Fc%23d/graph");
        assert_eq!(task_path("two words", ""), "/api/v1/tasks/two%20words");
    }

    #[test]
    fn new_rejects_invalid_config() {
        let err = AiloopClient::new(ClientConfig::new("localhost")).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn websocket_url_follows_server_url() {
        let client = AiloopClient::new(ClientConfig::new("https://ailoop.example.com")).unwrap();
        assert_eq!(client.websocket().url().as_str(), "wss://ailoop.example.com/ws");
        assert!(!client.websocket().is_connected());
    }

    #[tokio::test]
    async fn self_dependency_fails_without_io() {
        let client = AiloopClient::new(ClientConfig::new("http://127.0.0.1:9")).unwrap();
        let err = client.add_dependency("t1", "t1", "blocks").await.unwrap_err();
        assert!(err.is_validation());
        assert!(err.status().is_none());
    }

    #[tokio::test]
    async fn invalid_state_fails_without_io() {
        let client = AiloopClient::new(ClientConfig::new("http://127.0.0.1:9")).unwrap();
        let err = client.update_task("t1", "finished").await.unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("pending, done, abandoned"));
    }

    #[tokio::test]
    async fn subscribe_without_socket_fails() {
        let client = AiloopClient::new(ClientConfig::default()).unwrap();
        let err = client.subscribe("ops").unwrap_err();
        assert_eq!(err.message(), "WebSocket not connected");
    }
}
