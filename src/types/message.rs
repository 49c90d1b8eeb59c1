//! The [`Message`] envelope and its constructors.
//!
//! Constructors come in two flavours that build identical values:
//!
//! - `Message::create_*` read the wall clock.
//! - [`MessageFactory::create_*`](MessageFactory) read an injected [`Clock`],
//!   for callers that need reproducible timestamps.
//!
//! Every constructor generates a fresh UUID v4 id and validates the result
//! before returning it, so an invalid message never leaves this module.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::content::{MessageContent, NotificationPriority, ResponseType};
use super::task::{DependencyType, Task, TaskState};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};

/// Default `timeout_seconds` of a question.
pub const DEFAULT_QUESTION_TIMEOUT_SECS: u32 = 60;

/// Default `timeout_seconds` of an authorization request.
pub const DEFAULT_AUTHORIZATION_TIMEOUT_SECS: u32 = 300;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SenderType {
    /// An automated agent.
    Agent,
    /// A person.
    Human,
}

impl fmt::Display for SenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent => write!(f, "AGENT"),
            Self::Human => write!(f, "HUMAN"),
        }
    }
}

/// The wire envelope.
///
/// # Examples
///
/// ```
/// use ailoop_sdk::{Message, MessageContent, NotificationPriority, SenderType};
///
/// let message = Message::create_notification("ops", "disk 90% full", NotificationPriority::High)?;
/// assert_eq!(message.sender_type, SenderType::Agent);
/// assert!(message.correlation_id.is_none());
///
/// let json = message.to_json()?;
/// let decoded = Message::from_json(&json)?;
/// assert_eq!(decoded, message);
/// # Ok::<(), ailoop_sdk::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique id. The server may replace it when the message is posted.
    pub id: Uuid,
    /// Logical topic.
    pub channel: String,
    /// Who sent it.
    pub sender_type: SenderType,
    /// Payload.
    pub content: MessageContent,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Id of the message this one answers. Set on responses only.
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Message {
    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Returns `true` if this message answers another one.
    pub fn is_response(&self) -> bool {
        self.content.is_response()
    }

    /// Check the envelope and content invariants.
    ///
    /// - `channel` is non-empty.
    /// - the content variant's own invariants hold.
    /// - `correlation_id` is set iff the content is a response.
    pub fn validate(&self) -> Result<()> {
        if self.channel.is_empty() {
            return Err(Error::validation("channel must not be empty"));
        }
        self.content.validate()?;
        match (self.content.is_response(), self.correlation_id) {
            (true, None) => Err(Error::validation(format!(
                "response message {} has no correlation_id",
                self.id
            ))),
            (false, Some(correlation_id)) => Err(Error::validation(format!(
                "{} message {} must not carry correlation_id {correlation_id}",
                self.content.type_name(),
                self.id
            ))),
            _ => Ok(()),
        }
    }

    /// Build a question using the wall clock.
    ///
    /// `timeout_seconds` defaults to [`DEFAULT_QUESTION_TIMEOUT_SECS`].
    pub fn create_question(
        channel: impl Into<String>,
        text: impl Into<String>,
        timeout_seconds: Option<u32>,
        choices: Option<Vec<String>>,
    ) -> Result<Self> {
        MessageFactory::system().create_question(channel, text, timeout_seconds, choices)
    }

    /// Build an authorization request using the wall clock.
    ///
    /// `timeout_seconds` defaults to [`DEFAULT_AUTHORIZATION_TIMEOUT_SECS`].
    pub fn create_authorization(
        channel: impl Into<String>,
        action: impl Into<String>,
        timeout_seconds: Option<u32>,
        context: Option<Map<String, Value>>,
    ) -> Result<Self> {
        MessageFactory::system().create_authorization(channel, action, timeout_seconds, context)
    }

    /// Build a notification using the wall clock.
    pub fn create_notification(
        channel: impl Into<String>,
        text: impl Into<String>,
        priority: NotificationPriority,
    ) -> Result<Self> {
        MessageFactory::system().create_notification(channel, text, priority)
    }

    /// Build a response to `correlation_id` using the wall clock.
    pub fn create_response(
        channel: impl Into<String>,
        correlation_id: Uuid,
        answer: Option<String>,
        response_type: ResponseType,
    ) -> Result<Self> {
        MessageFactory::system().create_response(channel, correlation_id, answer, response_type)
    }

    /// Build a navigation request using the wall clock.
    pub fn create_navigate(channel: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        MessageFactory::system().create_navigate(channel, url)
    }

    /// Build a `task_create` event using the wall clock.
    pub fn create_task_create(channel: impl Into<String>, task: Task) -> Result<Self> {
        MessageFactory::system().create_task_create(channel, task)
    }

    /// Build a `task_update` event using the wall clock.
    pub fn create_task_update(
        channel: impl Into<String>,
        task_id: impl Into<String>,
        state: TaskState,
    ) -> Result<Self> {
        MessageFactory::system().create_task_update(channel, task_id, state)
    }

    /// Build a `task_dependency_add` event using the wall clock.
    pub fn create_task_dependency_add(
        channel: impl Into<String>,
        task_id: impl Into<String>,
        depends_on: impl Into<String>,
        dependency_type: DependencyType,
    ) -> Result<Self> {
        MessageFactory::system().create_task_dependency_add(
            channel,
            task_id,
            depends_on,
            dependency_type,
        )
    }

    /// Build a `task_dependency_remove` event using the wall clock.
    pub fn create_task_dependency_remove(
        channel: impl Into<String>,
        task_id: impl Into<String>,
        depends_on: impl Into<String>,
    ) -> Result<Self> {
        MessageFactory::system().create_task_dependency_remove(channel, task_id, depends_on)
    }
}

/// Builds messages stamped by an injected [`Clock`].
///
/// ```
/// use ailoop_sdk::{FixedClock, MessageFactory};
/// use chrono::{TimeZone, Utc};
///
/// let at = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
/// let factory = MessageFactory::new(FixedClock(at));
///
/// let question = factory.create_question("ops", "Restart the cluster?", None, None)?;
/// assert_eq!(question.timestamp, at);
/// # Ok::<(), ailoop_sdk::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageFactory<C = SystemClock> {
    clock: C,
}

impl MessageFactory<SystemClock> {
    /// Factory reading the wall clock.
    pub fn system() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> MessageFactory<C> {
    /// Factory reading `clock`.
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// The clock in use.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn build(
        &self,
        channel: String,
        sender_type: SenderType,
        content: MessageContent,
        timestamp: DateTime<Utc>,
        correlation_id: Option<Uuid>,
    ) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            channel,
            sender_type,
            content,
            timestamp,
            correlation_id,
            metadata: None,
        };
        message.validate()?;
        Ok(message)
    }

    /// See [`Message::create_question`].
    pub fn create_question(
        &self,
        channel: impl Into<String>,
        text: impl Into<String>,
        timeout_seconds: Option<u32>,
        choices: Option<Vec<String>>,
    ) -> Result<Message> {
        let content = MessageContent::Question {
            text: text.into(),
            timeout_seconds: timeout_seconds.unwrap_or(DEFAULT_QUESTION_TIMEOUT_SECS),
            choices,
        };
        self.build(channel.into(), SenderType::Agent, content, self.clock.now(), None)
    }

    /// See [`Message::create_authorization`].
    pub fn create_authorization(
        &self,
        channel: impl Into<String>,
        action: impl Into<String>,
        timeout_seconds: Option<u32>,
        context: Option<Map<String, Value>>,
    ) -> Result<Message> {
        let content = MessageContent::Authorization {
            action: action.into(),
            context,
            timeout_seconds: timeout_seconds.unwrap_or(DEFAULT_AUTHORIZATION_TIMEOUT_SECS),
        };
        self.build(channel.into(), SenderType::Agent, content, self.clock.now(), None)
    }

    /// See [`Message::create_notification`].
    pub fn create_notification(
        &self,
        channel: impl Into<String>,
        text: impl Into<String>,
        priority: NotificationPriority,
    ) -> Result<Message> {
        let content = MessageContent::Notification {
            text: text.into(),
            priority,
        };
        self.build(channel.into(), SenderType::Agent, content, self.clock.now(), None)
    }

    /// See [`Message::create_response`].
    ///
    /// Responses are the only messages attributed to [`SenderType::Human`].
    pub fn create_response(
        &self,
        channel: impl Into<String>,
        correlation_id: Uuid,
        answer: Option<String>,
        response_type: ResponseType,
    ) -> Result<Message> {
        let content = MessageContent::Response {
            answer,
            response_type,
        };
        self.build(
            channel.into(),
            SenderType::Human,
            content,
            self.clock.now(),
            Some(correlation_id),
        )
    }

    /// See [`Message::create_navigate`].
    pub fn create_navigate(
        &self,
        channel: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<Message> {
        let content = MessageContent::Navigate { url: url.into() };
        self.build(channel.into(), SenderType::Agent, content, self.clock.now(), None)
    }

    /// See [`Message::create_task_create`].
    pub fn create_task_create(&self, channel: impl Into<String>, task: Task) -> Result<Message> {
        let content = MessageContent::TaskCreate { task };
        self.build(channel.into(), SenderType::Agent, content, self.clock.now(), None)
    }

    /// See [`Message::create_task_update`].
    pub fn create_task_update(
        &self,
        channel: impl Into<String>,
        task_id: impl Into<String>,
        state: TaskState,
    ) -> Result<Message> {
        let now = self.clock.now();
        let content = MessageContent::TaskUpdate {
            task_id: task_id.into(),
            state,
            updated_at: now,
        };
        self.build(channel.into(), SenderType::Agent, content, now, None)
    }

    /// See [`Message::create_task_dependency_add`].
    pub fn create_task_dependency_add(
        &self,
        channel: impl Into<String>,
        task_id: impl Into<String>,
        depends_on: impl Into<String>,
        dependency_type: DependencyType,
    ) -> Result<Message> {
        let now = self.clock.now();
        let content = MessageContent::TaskDependencyAdd {
            task_id: task_id.into(),
            depends_on: depends_on.into(),
            dependency_type,
            timestamp: now,
        };
        self.build(channel.into(), SenderType::Agent, content, now, None)
    }

    /// See [`Message::create_task_dependency_remove`].
    pub fn create_task_dependency_remove(
        &self,
        channel: impl Into<String>,
        task_id: impl Into<String>,
        depends_on: impl Into<String>,
    ) -> Result<Message> {
        let now = self.clock.now();
        let content = MessageContent::TaskDependencyRemove {
            task_id: task_id.into(),
            depends_on: depends_on.into(),
            timestamp: now,
        };
        self.build(channel.into(), SenderType::Agent, content, now, None)
    }
}
