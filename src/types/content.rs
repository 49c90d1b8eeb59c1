//! Message content: the tagged union carried in [`Message::content`](crate::Message).
//!
//! On the wire every variant is a flat JSON object whose `type` field names
//! the variant, with the variant's own fields alongside it:
//!
//! ```json
//! {"type": "notification", "text": "disk 90% full", "priority": "high"}
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::parse_canonical;
use super::task::{DependencyType, Task, TaskState};
use crate::error::{Error, Result};

/// Urgency of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    /// Needs attention now.
    Urgent,
    /// Important.
    High,
    /// Regular.
    #[default]
    Normal,
    /// Informational.
    Low,
}

impl NotificationPriority {
    /// Every priority, highest first.
    pub const ALL: [Self; 4] = [Self::Urgent, Self::High, Self::Normal, Self::Low];

    /// The wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_canonical(s, "notification priority", &Self::ALL, Self::as_str)
    }
}

/// How a question or authorization was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Free-text answer; `answer` is required.
    #[default]
    Text,
    /// The requested action was approved.
    AuthorizationApproved,
    /// The requested action was denied.
    AuthorizationDenied,
    /// Nobody answered in time.
    Timeout,
    /// The request was withdrawn.
    Cancelled,
}

impl ResponseType {
    /// Every response type, in wire order.
    pub const ALL: [Self; 5] = [
        Self::Text,
        Self::AuthorizationApproved,
        Self::AuthorizationDenied,
        Self::Timeout,
        Self::Cancelled,
    ];

    /// The wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::AuthorizationApproved => "authorization_approved",
            Self::AuthorizationDenied => "authorization_denied",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_canonical(s, "response type", &Self::ALL, Self::as_str)
    }
}

/// Payload of a [`Message`](crate::Message).
///
/// A closed set of variants: a question can never carry an `answer`, a
/// response can never carry `choices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Ask a human something.
    Question {
        /// The question.
        text: String,
        /// How long to wait for an answer.
        timeout_seconds: u32,
        /// Multiple-choice options.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        choices: Option<Vec<String>>,
    },
    /// Ask a human to approve an action.
    Authorization {
        /// What will be done if approved.
        action: String,
        /// Extra context shown to the approver.
        #[serde(default)]
        context: Option<Map<String, Value>>,
        /// How long to wait for a decision.
        timeout_seconds: u32,
    },
    /// Fire-and-forget notice.
    Notification {
        /// Notice text.
        text: String,
        /// Urgency.
        #[serde(default)]
        priority: NotificationPriority,
    },
    /// Answer to a question or authorization.
    Response {
        /// Free-text answer.
        #[serde(default)]
        answer: Option<String>,
        /// How the request was resolved.
        response_type: ResponseType,
    },
    /// Ask the viewer to open a URL.
    Navigate {
        /// Target URL.
        url: String,
    },
    /// A task was created.
    TaskCreate {
        /// Snapshot of the new task.
        task: Task,
    },
    /// A task changed state.
    TaskUpdate {
        /// Task id.
        task_id: String,
        /// New state.
        state: TaskState,
        /// When the change happened.
        updated_at: DateTime<Utc>,
    },
    /// A dependency edge was added.
    TaskDependencyAdd {
        /// Dependent task.
        task_id: String,
        /// Task it now depends on.
        depends_on: String,
        /// Edge kind.
        dependency_type: DependencyType,
        /// When the edge was added.
        timestamp: DateTime<Utc>,
    },
    /// A dependency edge was removed.
    TaskDependencyRemove {
        /// Dependent task.
        task_id: String,
        /// Task it no longer depends on.
        depends_on: String,
        /// When the edge was removed.
        timestamp: DateTime<Utc>,
    },
}

impl MessageContent {
    /// Every discriminator value, in declaration order.
    pub const TYPE_NAMES: [&'static str; 9] = [
        "question",
        "authorization",
        "notification",
        "response",
        "navigate",
        "task_create",
        "task_update",
        "task_dependency_add",
        "task_dependency_remove",
    ];

    /// The `type` discriminator of this variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Question { .. } => "question",
            Self::Authorization { .. } => "authorization",
            Self::Notification { .. } => "notification",
            Self::Response { .. } => "response",
            Self::Navigate { .. } => "navigate",
            Self::TaskCreate { .. } => "task_create",
            Self::TaskUpdate { .. } => "task_update",
            Self::TaskDependencyAdd { .. } => "task_dependency_add",
            Self::TaskDependencyRemove { .. } => "task_dependency_remove",
        }
    }

    /// Returns `true` if `name` is a known discriminator.
    pub fn is_known_type(name: &str) -> bool {
        Self::TYPE_NAMES.contains(&name)
    }

    /// Returns `true` for [`MessageContent::Response`].
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response { .. })
    }

    /// Check the field-level invariants of this variant.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Question {
                text,
                timeout_seconds,
                ..
            } => {
                if text.is_empty() {
                    return Err(Error::validation("question text must not be empty"));
                }
                require_positive_timeout("question", *timeout_seconds)
            },
            Self::Authorization {
                timeout_seconds, ..
            } => require_positive_timeout("authorization", *timeout_seconds),
            Self::Response {
                answer,
                response_type,
            } => {
                if *response_type == ResponseType::Text && answer.is_none() {
                    return Err(Error::validation(
                        "response answer is required when response_type is text",
                    ));
                }
                Ok(())
            },
            Self::Navigate { url } => {
                if url.is_empty() {
                    return Err(Error::validation("navigate url must not be empty"));
                }
                Ok(())
            },
            Self::TaskDependencyAdd {
                task_id,
                depends_on,
                ..
            } => {
                if task_id == depends_on {
                    return Err(Error::validation(format!(
                        "task {task_id} cannot depend on itself"
                    )));
                }
                Ok(())
            },
            Self::Notification { .. }
            | Self::TaskCreate { .. }
            | Self::TaskUpdate { .. }
            | Self::TaskDependencyRemove { .. } => Ok(()),
        }
    }
}

fn require_positive_timeout(variant: &str, timeout_seconds: u32) -> Result<()> {
    if timeout_seconds == 0 {
        return Err(Error::validation(format!(
            "{variant} timeout_seconds must be greater than 0"
        )));
    }
    Ok(())
}
