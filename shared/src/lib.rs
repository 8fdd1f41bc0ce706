use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Frequency assigned to a goal when the form leaves it blank.
pub const DEFAULT_FREQUENCY: &str = "one-time";

/// An authenticated identity. The hash is an Argon2id PHC string;
/// the plaintext password is never stored anywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// User-chosen username, unique across all accounts
    pub child_id: String,
    pub password_hash: String,
}

/// Profile row owned by an account. One account may list several children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildProfile {
    pub id: i64,
    pub name: String,
    /// Owning account
    pub child_id: String,
}

/// A goal as stored and as rendered on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub title: String,
    /// Free-text recurrence label, e.g. "daily" or "one-time"
    pub frequency: String,
    /// Calendar date with no time component
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub earned_stars: i64,
    /// Owning account
    pub child_id: String,
}

/// Login and registration form payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialsForm {
    pub child_id: String,
    pub password: String,
}

/// "New goal" form payload. `frequency` and `due_date` may arrive missing
/// or as empty strings; both mean "unset".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGoalForm {
    pub title: String,
    pub frequency: Option<String>,
    /// ISO `YYYY-MM-DD`
    pub due_date: Option<String>,
}

/// Everything the dashboard page needs for one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    pub child_id: String,
    /// Primary list: goals still to do, due date ascending
    pub incomplete_goals: Vec<Goal>,
    /// Full history, all statuses, same order
    pub all_goals: Vec<Goal>,
    /// Sum of earned_stars over all of this account's goals
    pub total_stars: i64,
}
