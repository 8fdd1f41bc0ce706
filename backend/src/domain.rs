use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::NaiveDate;
use shared::{DashboardData, Goal, DEFAULT_FREQUENCY};
use tracing::{info, warn};

use crate::db::DbConnection;
use crate::error::AppError;

/// Credential registration and verification.
#[derive(Clone)]
pub struct AuthService {
    db: DbConnection,
}

impl AuthService {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Create a new account. Stores a salted Argon2id hash of the password;
    /// the plaintext never reaches storage.
    pub async fn register(&self, child_id: &str, password: &str) -> Result<(), AppError> {
        info!("Registering account: {}", child_id);

        if self.db.get_account(child_id).await?.is_some() {
            warn!("Registration rejected, account already exists: {}", child_id);
            return Err(AppError::DuplicateAccount);
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
            .to_string();

        self.db.insert_account(child_id, &hash).await?;
        info!("Created account: {}", child_id);
        Ok(())
    }

    /// Verify credentials. Succeeds only when the account exists and the
    /// password matches its stored hash; either failure surfaces as the same
    /// undifferentiated InvalidCredentials.
    pub async fn login(&self, child_id: &str, password: &str) -> Result<(), AppError> {
        info!("Login attempt: {}", child_id);

        let Some(account) = self.db.get_account(child_id).await? else {
            warn!("Login failed, unknown account: {}", child_id);
            return Err(AppError::InvalidCredentials);
        };

        let stored = PasswordHash::new(&account.password_hash)
            .map_err(|e| anyhow::anyhow!("Corrupt password hash for {}: {}", child_id, e))?;

        if Argon2::default().verify_password(password.as_bytes(), &stored).is_err() {
            warn!("Login failed, bad password: {}", child_id);
            return Err(AppError::InvalidCredentials);
        }

        info!("Login succeeded: {}", child_id);
        Ok(())
    }
}

/// Goal creation, listing, and completion, always scoped to one account.
#[derive(Clone)]
pub struct GoalService {
    db: DbConnection,
}

impl GoalService {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Create a goal for the account. Frequency defaults to "one-time" when
    /// absent or blank; the due date is parsed from ISO `YYYY-MM-DD` or left
    /// unset. New goals start incomplete with zero stars.
    pub async fn create_goal(
        &self,
        child_id: &str,
        title: &str,
        frequency: Option<String>,
        due_date: Option<String>,
    ) -> Result<Goal, AppError> {
        let frequency = frequency
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FREQUENCY.to_string());

        let due_date = match due_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|_| AppError::BadRequest(format!("Invalid due date: {}", s)))?,
            ),
            None => None,
        };

        info!(
            "Creating goal for {}: title={:?}, frequency={}, due_date={:?}",
            child_id, title, frequency, due_date
        );

        let goal_id = self.db.insert_goal(child_id, title, &frequency, due_date).await?;

        Ok(Goal {
            id: goal_id,
            title: title.to_string(),
            frequency,
            due_date,
            completed: false,
            earned_stars: 0,
            child_id: child_id.to_string(),
        })
    }

    /// All goals for the account, due date ascending
    pub async fn list_goals(&self, child_id: &str) -> Result<Vec<Goal>, AppError> {
        Ok(self.db.list_goals(child_id).await?)
    }

    /// Incomplete goals for the account, due date ascending
    pub async fn incomplete_goals(&self, child_id: &str) -> Result<Vec<Goal>, AppError> {
        Ok(self.db.list_incomplete_goals(child_id).await?)
    }

    /// Sum of earned stars over exactly this account's goals
    pub async fn total_stars(&self, child_id: &str) -> Result<i64, AppError> {
        Ok(self.db.sum_stars(child_id).await?)
    }

    /// Everything the dashboard renders for one account
    pub async fn dashboard(&self, child_id: &str) -> Result<DashboardData, AppError> {
        let incomplete_goals = self.incomplete_goals(child_id).await?;
        let all_goals = self.list_goals(child_id).await?;
        let total_stars = self.total_stars(child_id).await?;

        Ok(DashboardData {
            child_id: child_id.to_string(),
            incomplete_goals,
            all_goals,
            total_stars,
        })
    }

    /// Mark a goal complete. The transition is one-way and idempotent in
    /// effect; completing an already-completed goal is harmless. Star counts
    /// are not touched here.
    pub async fn complete_goal(&self, child_id: &str, goal_id: i64) -> Result<(), AppError> {
        let goal = self.db.get_goal(goal_id).await?.ok_or(AppError::NotFound)?;

        if goal.child_id != child_id {
            warn!(
                "Account {} tried to complete goal {} owned by {}",
                child_id, goal_id, goal.child_id
            );
            return Err(AppError::Forbidden);
        }

        self.db.mark_goal_completed(goal_id).await?;
        info!("Goal {} completed by {}", goal_id, child_id);
        Ok(())
    }
}
