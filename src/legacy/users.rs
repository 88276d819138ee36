//! `users` table access over a `SQLite` pool.

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqlitePoolOptions, SqliteRow},
    Executor, FromRow, Row, SqlitePool,
};
use tracing::{info_span, Instrument};

const SCHEMA: &str = include_str!("schema.sql");

#[derive(Clone, Debug)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub private_key: Vec<u8>,
    pub public_key: String,
    pub created_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for User {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            private_key: row.try_get("private_key")?,
            public_key: row.try_get("public_key")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Fields written on registration.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub private_key: &'a [u8],
    pub public_key: &'a str,
}

#[derive(Debug)]
pub enum Created {
    User(User),
    AlreadyExists,
}

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    /// Open the pool and apply the schema.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// # Errors
    /// Returns an error if the schema cannot be applied.
    pub async fn migrate(&self) -> Result<()> {
        self.pool
            .execute(SCHEMA)
            .await
            .context("Failed to apply users schema")?;
        Ok(())
    }

    /// # Errors
    /// Returns an error on database failure.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let query = "SELECT id, username, password_hash, private_key, public_key, created_at \
                     FROM users WHERE username = ?";
        sqlx::query_as::<_, User>(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(info_span!("db.query", db.system = "sqlite", db.operation = "SELECT"))
            .await
            .context("Failed to look up user")
    }

    /// Insert a user; a duplicate username yields [`Created::AlreadyExists`].
    ///
    /// # Errors
    /// Returns an error on any other database failure.
    pub async fn create(&self, user: NewUser<'_>) -> Result<Created> {
        let query = "INSERT INTO users (username, password_hash, private_key, public_key) \
                     VALUES (?, ?, ?, ?) \
                     RETURNING id, username, password_hash, private_key, public_key, created_at";
        let result = sqlx::query_as::<_, User>(query)
            .bind(user.username)
            .bind(user.password_hash)
            .bind(user.private_key)
            .bind(user.public_key)
            .fetch_one(&self.pool)
            .instrument(info_span!("db.query", db.system = "sqlite", db.operation = "INSERT"))
            .await;

        match result {
            Ok(user) => Ok(Created::User(user)),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Ok(Created::AlreadyExists)
            }
            Err(err) => Err(err).context("Failed to create user"),
        }
    }

    /// Replace a user's key pair; returns `false` when the user is gone.
    ///
    /// # Errors
    /// Returns an error on database failure.
    pub async fn rotate_keys(
        &self,
        username: &str,
        private_key: &[u8],
        public_key: &str,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE users SET private_key = ?, public_key = ? WHERE username = ?")
                .bind(private_key)
                .bind(public_key)
                .bind(username)
                .execute(&self.pool)
                .instrument(info_span!("db.query", db.system = "sqlite", db.operation = "UPDATE"))
                .await
                .context("Failed to rotate user keys")?;
        Ok(result.rows_affected() == 1)
    }

    /// # Errors
    /// Returns an error if the database does not answer.
    pub async fn ping(&self) -> Result<()> {
        let one: i64 = sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database ping failed")?
            .try_get(0)?;
        anyhow::ensure!(one == 1, "unexpected ping result");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> Result<UserStore> {
        UserStore::connect("sqlite::memory:", 1).await
    }

    fn alice<'a>() -> NewUser<'a> {
        NewUser {
            username: "alice",
            password_hash: "$argon2id$stub",
            private_key: &[1u8; 64],
            public_key: "pk",
        }
    }

    #[tokio::test]
    async fn create_then_find() -> Result<()> {
        let store = store().await?;
        let Created::User(created) = store.create(alice()).await? else {
            anyhow::bail!("user unexpectedly exists");
        };
        assert_eq!(created.username, "alice");
        assert!(!created.created_at.is_empty());

        let found = store.find_by_username("alice").await?;
        assert_eq!(found.map(|u| u.id), Some(created.id));
        assert!(store.find_by_username("bob").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_username_is_reported() -> Result<()> {
        let store = store().await?;
        store.create(alice()).await?;
        assert!(matches!(store.create(alice()).await?, Created::AlreadyExists));
        Ok(())
    }

    #[tokio::test]
    async fn rotate_keys_updates_row() -> Result<()> {
        let store = store().await?;
        store.create(alice()).await?;
        assert!(store.rotate_keys("alice", &[2u8; 64], "pk2").await?);
        assert!(!store.rotate_keys("bob", &[2u8; 64], "pk2").await?);

        let user = store.find_by_username("alice").await?;
        assert_eq!(user.map(|u| u.public_key), Some("pk2".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn migrate_is_idempotent() -> Result<()> {
        let store = store().await?;
        store.migrate().await?;
        store.ping().await
    }
}
