use anyhow::Result;
use chrono::NaiveDate;
use shared::{Account, ChildProfile, Goal};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};
use std::sync::Arc;

// The database URL for the production database
const DATABASE_URL: &str = "sqlite:kidsdash.db";

/// DbConnection manages database operations
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection. Does not touch the schema;
    /// callers run `migrate` once at startup before serving.
    pub async fn new(url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        let pool = SqlitePool::connect(url).await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Initialize the standard database, honoring a DATABASE_URL override
    pub async fn init() -> Result<Self> {
        let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DATABASE_URL.to_string());
        Self::new(&url).await
    }

    /// Initialize a migrated test database with a unique name
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        // Generate a unique database name for tests
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        let db = Self::new(&db_url).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Idempotent schema migration. Run exactly once per process start,
    /// before the server accepts requests.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                child_id TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS children (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                child_id TEXT NOT NULL REFERENCES accounts(child_id)
            )
            "#,
        )
        .execute(&*self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS goals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                frequency TEXT NOT NULL DEFAULT 'one-time',
                due_date TEXT,
                completed INTEGER NOT NULL DEFAULT 0,
                earned_stars INTEGER NOT NULL DEFAULT 0,
                child_id TEXT NOT NULL REFERENCES accounts(child_id)
            )
            "#,
        )
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Store a new account row. Callers check for duplicates first.
    pub async fn insert_account(&self, child_id: &str, password_hash: &str) -> Result<()> {
        sqlx::query("INSERT INTO accounts (child_id, password_hash) VALUES (?, ?)")
            .bind(child_id)
            .bind(password_hash)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    /// Look up an account by its username
    pub async fn get_account(&self, child_id: &str) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT child_id, password_hash FROM accounts WHERE child_id = ?")
            .bind(child_id)
            .fetch_optional(&*self.pool)
            .await?;

        Ok(row.map(|r| Account {
            child_id: r.get("child_id"),
            password_hash: r.get("password_hash"),
        }))
    }

    /// Store a child profile row owned by an account
    pub async fn insert_child_profile(&self, name: &str, child_id: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO children (name, child_id) VALUES (?, ?)")
            .bind(name)
            .bind(child_id)
            .execute(&*self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// List the child profiles owned by an account
    pub async fn list_child_profiles(&self, child_id: &str) -> Result<Vec<ChildProfile>> {
        let rows = sqlx::query("SELECT id, name, child_id FROM children WHERE child_id = ?")
            .bind(child_id)
            .fetch_all(&*self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| ChildProfile {
                id: r.get("id"),
                name: r.get("name"),
                child_id: r.get("child_id"),
            })
            .collect())
    }

    /// Store a new goal, incomplete with zero stars
    pub async fn insert_goal(
        &self,
        child_id: &str,
        title: &str,
        frequency: &str,
        due_date: Option<NaiveDate>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO goals (title, frequency, due_date, completed, earned_stars, child_id) \
             VALUES (?, ?, ?, 0, 0, ?)",
        )
        .bind(title)
        .bind(frequency)
        .bind(due_date)
        .bind(child_id)
        .execute(&*self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Look up a goal by id, regardless of owner
    pub async fn get_goal(&self, goal_id: i64) -> Result<Option<Goal>> {
        let row = sqlx::query(
            "SELECT id, title, frequency, due_date, completed, earned_stars, child_id \
             FROM goals WHERE id = ?",
        )
        .bind(goal_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(goal_from_row))
    }

    /// All goals for an account, due date ascending
    pub async fn list_goals(&self, child_id: &str) -> Result<Vec<Goal>> {
        let rows = sqlx::query(
            "SELECT id, title, frequency, due_date, completed, earned_stars, child_id \
             FROM goals WHERE child_id = ? ORDER BY due_date",
        )
        .bind(child_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.into_iter().map(goal_from_row).collect())
    }

    /// Goals for an account that are still to do, due date ascending
    pub async fn list_incomplete_goals(&self, child_id: &str) -> Result<Vec<Goal>> {
        let rows = sqlx::query(
            "SELECT id, title, frequency, due_date, completed, earned_stars, child_id \
             FROM goals WHERE child_id = ? AND completed = 0 ORDER BY due_date",
        )
        .bind(child_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.into_iter().map(goal_from_row).collect())
    }

    /// Flip a goal's completed flag to true. One-way; harmless if already set.
    pub async fn mark_goal_completed(&self, goal_id: i64) -> Result<()> {
        sqlx::query("UPDATE goals SET completed = 1 WHERE id = ?")
            .bind(goal_id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    /// Sum of earned_stars over exactly this account's goals
    pub async fn sum_stars(&self, child_id: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(earned_stars), 0) AS total FROM goals WHERE child_id = ?",
        )
        .bind(child_id)
        .fetch_one(&*self.pool)
        .await?;
        Ok(row.get("total"))
    }

    /// Test hook: set a goal's star count directly. No exposed operation
    /// awards stars, so aggregate tests seed them here.
    #[cfg(test)]
    pub async fn set_goal_stars(&self, goal_id: i64, stars: i64) -> Result<()> {
        sqlx::query("UPDATE goals SET earned_stars = ? WHERE id = ?")
            .bind(stars)
            .bind(goal_id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }
}

fn goal_from_row(row: sqlx::sqlite::SqliteRow) -> Goal {
    Goal {
        id: row.get("id"),
        title: row.get("title"),
        frequency: row.get("frequency"),
        due_date: row.get("due_date"),
        completed: row.get("completed"),
        earned_stars: row.get("earned_stars"),
        child_id: row.get("child_id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Setup a new migrated test database for each test
    async fn setup_test() -> DbConnection {
        DbConnection::init_test().await.expect("Failed to create test database")
    }

    async fn add_account(db: &DbConnection, child_id: &str) {
        db.insert_account(child_id, "$argon2id$fake-hash")
            .await
            .expect("Failed to insert account");
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = setup_test().await;

        // Running the migration again must not fail or clobber data
        add_account(&db, "alice").await;
        db.migrate().await.expect("Second migrate failed");

        let account = db.get_account("alice").await.expect("Query failed");
        assert!(account.is_some());
    }

    #[tokio::test]
    async fn test_insert_and_get_account() {
        let db = setup_test().await;

        db.insert_account("alice", "$argon2id$hash").await.expect("Failed to insert");

        let account = db.get_account("alice").await.expect("Query failed");
        assert!(account.is_some());
        let account = account.unwrap();
        assert_eq!(account.child_id, "alice");
        assert_eq!(account.password_hash, "$argon2id$hash");
    }

    #[tokio::test]
    async fn test_get_nonexistent_account() {
        let db = setup_test().await;

        let account = db.get_account("nobody").await.expect("Query failed");
        assert!(account.is_none());
    }

    #[tokio::test]
    async fn test_child_profiles_belong_to_account() {
        let db = setup_test().await;
        add_account(&db, "alice").await;
        add_account(&db, "bob").await;

        db.insert_child_profile("Maya", "alice").await.expect("Failed to insert profile");
        db.insert_child_profile("Leo", "alice").await.expect("Failed to insert profile");
        db.insert_child_profile("Sam", "bob").await.expect("Failed to insert profile");

        let profiles = db.list_child_profiles("alice").await.expect("Query failed");
        assert_eq!(profiles.len(), 2);
        assert!(profiles.iter().all(|p| p.child_id == "alice"));
    }

    #[tokio::test]
    async fn test_goal_defaults_on_insert() {
        let db = setup_test().await;
        add_account(&db, "alice").await;

        let goal_id = db
            .insert_goal("alice", "Clean room", "one-time", None)
            .await
            .expect("Failed to insert goal");

        let goal = db.get_goal(goal_id).await.expect("Query failed").expect("Goal missing");
        assert_eq!(goal.title, "Clean room");
        assert!(!goal.completed);
        assert_eq!(goal.earned_stars, 0);
        assert!(goal.due_date.is_none());
    }

    #[tokio::test]
    async fn test_goals_ordered_by_due_date() {
        let db = setup_test().await;
        add_account(&db, "alice").await;

        let later = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let sooner = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        db.insert_goal("alice", "Later", "weekly", Some(later)).await.expect("insert");
        db.insert_goal("alice", "Sooner", "one-time", Some(sooner)).await.expect("insert");

        let goals = db.list_goals("alice").await.expect("Query failed");
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[0].title, "Sooner");
        assert_eq!(goals[1].title, "Later");
    }

    #[tokio::test]
    async fn test_incomplete_filter() {
        let db = setup_test().await;
        add_account(&db, "alice").await;

        let done_id = db.insert_goal("alice", "Done", "one-time", None).await.expect("insert");
        db.insert_goal("alice", "Pending", "one-time", None).await.expect("insert");
        db.mark_goal_completed(done_id).await.expect("Failed to complete");

        let incomplete = db.list_incomplete_goals("alice").await.expect("Query failed");
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].title, "Pending");

        // The full list still carries both
        let all = db.list_goals("alice").await.expect("Query failed");
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_sum_stars_scoped_to_account() {
        let db = setup_test().await;
        add_account(&db, "alice").await;
        add_account(&db, "bob").await;

        let a1 = db.insert_goal("alice", "Read", "daily", None).await.expect("insert");
        let a2 = db.insert_goal("alice", "Tidy", "weekly", None).await.expect("insert");
        let b1 = db.insert_goal("bob", "Swim", "weekly", None).await.expect("insert");
        db.set_goal_stars(a1, 3).await.expect("set stars");
        db.set_goal_stars(a2, 2).await.expect("set stars");
        db.set_goal_stars(b1, 7).await.expect("set stars");

        assert_eq!(db.sum_stars("alice").await.expect("sum"), 5);
        assert_eq!(db.sum_stars("bob").await.expect("sum"), 7);
        assert_eq!(db.sum_stars("nobody").await.expect("sum"), 0);
    }
}
