use std::time::Duration;

use sqlx::Row;
use sqlx::postgres::PgPoolOptions;
use taskboard_contracts::UserRole;

#[derive(Debug)]
pub enum StoreError {
    Timeout,
    Sqlx(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Timeout => write!(f, "store operation timed out"),
            StoreError::Sqlx(err) => write!(f, "store sql error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        StoreError::Sqlx(value)
    }
}

/// Durable user/comment store. Holds the authoritative privilege records:
/// [`Store::is_administrator`] is the privilege oracle query that admin
/// routes consult on every request, regardless of what the caller's token
/// claims.
#[derive(Clone)]
pub struct Store {
    pool: sqlx::PgPool,
    query_timeout: Duration,
}

impl Store {
    pub async fn connect(db_url: &str, query_timeout: Duration) -> Result<Self, StoreError> {
        let pool = tokio::time::timeout(
            Duration::from_secs(2),
            PgPoolOptions::new().max_connections(8).connect(db_url),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(Self {
            pool,
            query_timeout,
        })
    }

    pub async fn connect_and_migrate(
        db_url: &str,
        query_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let store = Self::connect(db_url, query_timeout).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        tokio::time::timeout(Duration::from_secs(10), migrate(&self.pool))
            .await
            .map_err(|_| StoreError::Timeout)??;
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        tokio::time::timeout(
            self.query_timeout,
            sqlx::query("SELECT 1").execute(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;
        Ok(())
    }

    /// Fresh durable lookup: does this user currently hold the ADMIN role?
    pub async fn is_administrator(&self, user_id: i64) -> Result<bool, StoreError> {
        let row = tokio::time::timeout(
            self.query_timeout,
            sqlx::query(
                "SELECT EXISTS(SELECT 1 FROM taskboard_users WHERE id = $1 AND role = 'ADMIN')",
            )
            .bind(user_id)
            .fetch_one(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(row.get::<bool, _>(0))
    }

    pub async fn find_user_role(&self, user_id: i64) -> Result<Option<UserRole>, StoreError> {
        let row = tokio::time::timeout(
            self.query_timeout,
            sqlx::query("SELECT role FROM taskboard_users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(row.and_then(|row| UserRole::parse(&row.get::<String, _>(0))))
    }

    /// Returns false when the user does not exist.
    pub async fn update_user_role(
        &self,
        user_id: i64,
        role: UserRole,
    ) -> Result<bool, StoreError> {
        let result = tokio::time::timeout(
            self.query_timeout,
            sqlx::query("UPDATE taskboard_users SET role = $1 WHERE id = $2")
                .bind(role.as_str())
                .bind(user_id)
                .execute(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(result.rows_affected() > 0)
    }

    /// Returns false when the comment was already gone; deletion is
    /// idempotent.
    pub async fn delete_comment(&self, comment_id: i64) -> Result<bool, StoreError> {
        let result = tokio::time::timeout(
            self.query_timeout,
            sqlx::query("DELETE FROM taskboard_comments WHERE id = $1")
                .bind(comment_id)
                .execute(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_user(&self, email: &str, role: UserRole) -> Result<i64, StoreError> {
        let row = tokio::time::timeout(
            self.query_timeout,
            sqlx::query("INSERT INTO taskboard_users (email, role) VALUES ($1, $2) RETURNING id")
                .bind(email)
                .bind(role.as_str())
                .fetch_one(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(row.get::<i64, _>(0))
    }

    pub async fn insert_comment(
        &self,
        todo_id: i64,
        author_id: i64,
        content: &str,
    ) -> Result<i64, StoreError> {
        let row = tokio::time::timeout(
            self.query_timeout,
            sqlx::query(
                "INSERT INTO taskboard_comments (todo_id, author_id, content) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(todo_id)
            .bind(author_id)
            .bind(content)
            .fetch_one(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(row.get::<i64, _>(0))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub async fn migrate(pool: &sqlx::PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
