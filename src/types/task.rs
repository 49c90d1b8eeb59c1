//! Task wire types.
//!
//! Tasks live on the server. The client never mutates a [`Task`] in place:
//! each API call returns a fresh snapshot decoded from the latest response.
//! `blocked`, `depends_on` and `blocking_for` are computed by the server and
//! trusted as-is.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::parse_canonical;
use crate::error::Error;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Not finished yet.
    Pending,
    /// Completed.
    Done,
    /// Dropped without completion.
    Abandoned,
}

impl TaskState {
    /// Every state, in wire order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::Done, Self::Abandoned];

    /// The wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = Error;

    /// Case-insensitive. `"DONE"` and `" done "` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_canonical(s, "task state", &Self::ALL, Self::as_str)
    }
}

/// Kind of edge between two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    /// The dependency must be done before the dependent task is ready.
    #[default]
    Blocks,
    /// Informational link.
    Related,
    /// Hierarchical link.
    Parent,
}

impl DependencyType {
    /// Every dependency type, in wire order.
    pub const ALL: [Self; 3] = [Self::Blocks, Self::Related, Self::Parent];

    /// The wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::Related => "related",
            Self::Parent => "parent",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_canonical(s, "dependency type", &Self::ALL, Self::as_str)
    }
}

/// A server-owned task, mirrored client-side.
///
/// ```
/// use ailoop_sdk::{Task, TaskState};
///
/// let task: Task = serde_json::from_value(serde_json::json!({
///     "id": "task-1",
///     "title": "Ship it",
///     "description": "Release 0.2",
///     "state": "pending",
///     "created_at": "2024-01-15T12:00:00Z",
///     "updated_at": "2024-01-15T12:00:00Z"
/// })).unwrap();
///
/// assert_eq!(task.state, TaskState::Pending);
/// assert!(!task.blocked);
/// assert!(task.depends_on.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Server-assigned identifier.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Current state.
    pub state: TaskState,
    /// Creation time, authoritative from the server.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Who the task is assigned to.
    #[serde(default)]
    pub assignee: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    /// Ids of tasks this one is blocked by, in server order.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Ids of tasks blocked by this one, in server order.
    #[serde(default)]
    pub blocking_for: Vec<String>,
    /// Whether an unresolved `blocks` dependency exists.
    #[serde(default)]
    pub blocked: bool,
    /// Set when the task is viewed as one end of a single edge.
    #[serde(default)]
    pub dependency_type: Option<DependencyType>,
}

impl Task {
    /// A pending task with no dependencies, stamped with `now`.
    ///
    /// Useful for building `task_create` messages; the server replaces the
    /// timestamps with its own when the task is actually created.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            state: TaskState::Pending,
            created_at: now,
            updated_at: now,
            assignee: None,
            metadata: None,
            depends_on: Vec::new(),
            blocking_for: Vec::new(),
            blocked: false,
            dependency_type: None,
        }
    }

    /// Set the assignee.
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Set the metadata map.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Returns `true` if the server reports no unresolved blocker.
    pub fn is_ready(&self) -> bool {
        self.state == TaskState::Pending && !self.blocked
    }
}

/// Response of `GET /api/v1/tasks/{id}/graph`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// The task the graph was requested for.
    pub task: Task,
    /// Tasks the root depends on.
    #[serde(default)]
    pub parents: Vec<Task>,
    /// Tasks depending on the root.
    #[serde(default)]
    pub children: Vec<Task>,
}

/// Body of `POST /api/v1/tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    /// Task title.
    pub title: String,
    /// Task description.
    pub description: String,
    /// Channel the task belongs to.
    pub channel: String,
    /// Optional assignee.
    pub assignee: Option<String>,
    /// Optional metadata.
    pub metadata: Option<Map<String, Value>>,
}

/// Body of `PUT /api/v1/tasks/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    /// New state.
    pub state: TaskState,
}

/// Body of `POST /api/v1/tasks/{id}/dependencies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddDependencyRequest {
    /// The dependent task.
    pub child_id: String,
    /// The task it depends on.
    pub parent_id: String,
    /// Edge kind.
    pub dependency_type: DependencyType,
}

/// Envelope of the task listing endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    /// The tasks, in server order.
    #[serde(default)]
    pub tasks: Vec<Task>,
}
