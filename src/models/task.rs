use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{FromRow, Postgres};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Display status of a task, derived from its completion flag and deadline.
/// The stored column is a cache of `resolve`, never an independent source of
/// truth; it matches the `CHECK (status IN (...))` constraint in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Upcoming,
    Completed,
    Missed,
}

impl TaskStatus {
    /// Derives the status from the task state at `now`. Completion takes
    /// precedence over an elapsed deadline.
    pub fn resolve(completed: bool, deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if completed {
            TaskStatus::Completed
        } else if deadline < now {
            TaskStatus::Missed
        } else {
            TaskStatus::Upcoming
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Upcoming => "upcoming",
            TaskStatus::Completed => "completed",
            TaskStatus::Missed => "missed",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "upcoming" => Ok(TaskStatus::Upcoming),
            "completed" => Ok(TaskStatus::Completed),
            "missed" => Ok(TaskStatus::Missed),
            other => Err(format!("unknown task status: {}", other)),
        }
    }
}

// Stored as TEXT; the schema's CHECK constraint restricts the legal values.
impl sqlx::Type<Postgres> for TaskStatus {
    fn type_info() -> PgTypeInfo {
        <&str as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <&str as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, Postgres> for TaskStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> IsNull {
        <&str as sqlx::Encode<'q, Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, Postgres> for TaskStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <&str as sqlx::Decode<'r, Postgres>>::decode(value)?;
        raw.parse().map_err(Into::into)
    }
}

/// A task row as stored and as returned by the API.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Task {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    pub completed: bool,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Re-derives `status` from the current completion flag and deadline.
    /// Called with wall-clock time on every read and before every write.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::resolve(self.completed, self.deadline, now);
    }
}

/// Payload for task creation.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskCreate {
    #[validate(length(min = 1, max = 255))]
    pub title: String,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    pub deadline: DateTime<Utc>,
}

/// Payload for partial task updates. Absent fields are left unchanged.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskUpdate {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    pub deadline: Option<DateTime<Utc>>,

    pub completed: Option<bool>,
}
