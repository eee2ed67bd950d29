//! Core board data model for Syncboard.
//!
//! Defines boards, status columns, tasks, and the partial-update payload
//! used by the task-move endpoint. The server is the sole source of truth
//! for persisted `status` and `order` values; clients only propose them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Unique identifier for a board, based on UUID v7 for time-ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardId(Uuid);

impl BoardId {
    /// Creates a new time-ordered board identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `BoardId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BoardId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BoardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a task, based on UUID v7 for time-ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusId(Uuid);

impl StatusId {
    /// Creates a new status identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `StatusId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for StatusId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StatusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagId(Uuid);

impl TagId {
    /// Creates a new tag identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TagId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TagId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier for a user (issued by the external identity system).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Creates a user identifier from a string representation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this user ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed kind tag of a status column.
///
/// Within one board each kind appears at most once: a board has one
/// "to do" column, one "in progress" column, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// Work not yet started.
    Todo,
    /// Work actively in progress.
    InProgress,
    /// Work awaiting review.
    InReview,
    /// Work completed.
    Done,
    /// Work blocked on something external.
    Blocked,
}

impl StatusKind {
    /// All kinds in canonical column order.
    pub const ALL: [Self; 5] = [
        Self::Todo,
        Self::InProgress,
        Self::InReview,
        Self::Done,
        Self::Blocked,
    ];

    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::InReview => "in_review",
            Self::Done => "done",
            Self::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StatusKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "in_review" => Ok(Self::InReview),
            "done" => Ok(Self::Done),
            "blocked" => Ok(Self::Blocked),
            other => Err(ParseEnumError::UnknownStatusKind(other.to_string())),
        }
    }
}

/// Task priority. Ordinal: `Low < Medium < High < Urgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Lowest priority.
    Low,
    /// Default priority.
    Medium,
    /// Elevated priority.
    High,
    /// Highest priority.
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

/// Role of the local user on a board. Gates whether drag input is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Full control over the board.
    Admin,
    /// Can edit and move tasks.
    Member,
    /// Read-only access; never initiates a move.
    Viewer,
}

impl Role {
    /// Whether this role may start a drag gesture.
    #[must_use]
    pub const fn can_move(self) -> bool {
        match self {
            Self::Admin | Self::Member => true,
            Self::Viewer => false,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Member => write!(f, "member"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            "viewer" => Ok(Self::Viewer),
            other => Err(ParseEnumError::UnknownRole(other.to_string())),
        }
    }
}

/// Error returned when parsing an enum wire name fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseEnumError {
    /// The string is not a known status kind.
    #[error("unknown status kind: {0}")]
    UnknownStatusKind(String),
    /// The string is not a known board event.
    #[error("unknown board event: {0}")]
    UnknownEvent(String),
    /// The string is not a known role.
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// A status column on a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Unique status identifier.
    pub id: StatusId,
    /// Human-readable display name.
    pub name: String,
    /// Fixed kind tag. At most one column per kind on a board.
    pub kind: StatusKind,
    /// Column display position, left to right.
    pub position: u32,
}

/// A work item on a board.
///
/// `order` positions the task within its column, scoped to
/// (board, status kind). Order values within a column are distinct
/// non-negative integers; gaps are permitted and never compacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier (UUID v7, time-ordered).
    pub id: TaskId,
    /// Board this task belongs to.
    pub board_id: BoardId,
    /// Task title.
    pub title: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// The kind of the column this task sits in.
    pub status: StatusKind,
    /// Task priority.
    pub priority: Priority,
    /// Optional assignee.
    pub assignee: Option<UserId>,
    /// Position within the (board, status kind) column.
    pub order: u32,
    /// Optional due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Tags attached to this task.
    pub tags: Vec<TagId>,
    /// When this task was created (milliseconds since epoch).
    pub created_at: u64,
}

/// Partial update accepted by the task-move endpoint.
///
/// Absent fields are left untouched by the server. The endpoint returns
/// the full updated [`Task`] record, which the client uses to reconcile
/// optimistic state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePatch {
    /// New column kind, if the task is changing columns.
    pub status: Option<StatusKind>,
    /// New position within the target column.
    pub order: Option<u32>,
}

impl MovePatch {
    /// Whether this patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none() && self.order.is_none()
    }
}

/// A structural invariant violation found in a board payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// Two status columns share the same kind tag.
    #[error("duplicate status kind: {0}")]
    DuplicateStatusKind(StatusKind),
    /// A task references a status kind with no matching column.
    #[error("task {task} references missing status {status}")]
    OrphanTask {
        /// The offending task.
        task: TaskId,
        /// The status kind it references.
        status: StatusKind,
    },
    /// Two tasks in the same column share the same order value.
    #[error("duplicate order {order} in column {status}")]
    DuplicateOrder {
        /// The column kind.
        status: StatusKind,
        /// The duplicated order value.
        order: u32,
    },
    /// A task title exceeds [`MAX_TASK_TITLE_LENGTH`] characters.
    #[error("task {task} title is too long ({length} characters)")]
    OverlongTitle {
        /// The offending task.
        task: TaskId,
        /// The title's length in characters.
        length: usize,
    },
}

/// Full board payload as returned by the board read endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// Unique board identifier.
    pub id: BoardId,
    /// Human-readable board name.
    pub name: String,
    /// Status columns, in display order.
    pub statuses: Vec<Status>,
    /// All tasks on the board.
    pub tasks: Vec<Task>,
}

impl Board {
    /// Returns the column with the given kind, if present.
    #[must_use]
    pub fn status_for(&self, kind: StatusKind) -> Option<&Status> {
        self.statuses.iter().find(|s| s.kind == kind)
    }

    /// Checks the board's structural invariants.
    ///
    /// Returns all violations found: duplicate column kinds, tasks
    /// referencing a kind with no column, duplicate order values within
    /// one column, and over-long task titles. An empty vec means the
    /// payload is consistent.
    #[must_use]
    pub fn violations(&self) -> Vec<InvariantViolation> {
        let mut out = Vec::new();

        let mut seen_kinds = Vec::new();
        for status in &self.statuses {
            if seen_kinds.contains(&status.kind) {
                out.push(InvariantViolation::DuplicateStatusKind(status.kind));
            } else {
                seen_kinds.push(status.kind);
            }
        }

        let mut seen_orders: Vec<(StatusKind, u32)> = Vec::new();
        for task in &self.tasks {
            let title_len = task.title.chars().count();
            if title_len > MAX_TASK_TITLE_LENGTH {
                out.push(InvariantViolation::OverlongTitle {
                    task: task.id,
                    length: title_len,
                });
            }
            if self.status_for(task.status).is_none() {
                out.push(InvariantViolation::OrphanTask {
                    task: task.id,
                    status: task.status,
                });
                continue;
            }
            let key = (task.status, task.order);
            if seen_orders.contains(&key) {
                out.push(InvariantViolation::DuplicateOrder {
                    status: task.status,
                    order: task.order,
                });
            } else {
                seen_orders.push(key);
            }
        }

        out
    }
}
