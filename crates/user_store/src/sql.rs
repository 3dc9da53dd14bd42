//! SQL-backed user stores.
//!
//! PostgreSQL is used for shared deployments, SQLite for single-node ones.
//! Both keep the same `users` table layout; IDs are stored as text so the
//! schema stays portable between the two.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entities::{FederatedProfile, ProviderAccount, UserRecord};
use sqlx::{
    postgres::PgPoolOptions, sqlite::SqlitePoolOptions, Pool, Postgres, Sqlite,
};
use uuid::Uuid;

use crate::{normalize_email, StoreError, StoreResult, UserStore};

const MAX_CONNECTIONS: u32 = 5;

const SELECT_USER: &str = r#"
    SELECT id, email, name, hashed_password, is_premium,
           provider, provider_account_id, created_at, updated_at
    FROM users
"#;

type UserRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    bool,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn row_to_user(row: UserRow) -> StoreResult<UserRecord> {
    let (id, email, name, hashed_password, is_premium, provider, account_id, created_at, updated_at) =
        row;

    let id = id
        .parse::<Uuid>()
        .map_err(|e| StoreError::Corrupt(format!("invalid user id {}: {}", id, e)))?;

    let provider = match (provider, account_id) {
        (Some(provider), Some(account_id)) => Some(ProviderAccount::new(provider, account_id)),
        _ => None,
    };

    Ok(UserRecord {
        id,
        email,
        name,
        hashed_password,
        is_premium,
        provider,
        created_at,
        updated_at,
    })
}

fn map_insert_error(e: sqlx::Error, email: &str) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::already_exists(email),
        _ => StoreError::Database(e),
    }
}

/// Connects to the database named by `database_url` and returns an
/// initialized store.
///
/// `postgres://` and `postgresql://` URLs select [`PostgresUserStore`],
/// `sqlite:` URLs select [`SqliteUserStore`].
pub async fn connect(database_url: &str) -> StoreResult<Arc<dyn UserStore>> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {}", e)))?;
        let store = PostgresUserStore::new(pool);
        store.init().await?;
        tracing::info!(backend = "postgres", "User store connected");
        Ok(Arc::new(store))
    } else if database_url.starts_with("sqlite:") {
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {}", e)))?;
        let store = SqliteUserStore::new(pool);
        store.init().await?;
        tracing::info!(backend = "sqlite", "User store connected");
        Ok(Arc::new(store))
    } else {
        let scheme = database_url.split(':').next().unwrap_or_default();
        Err(StoreError::Unavailable(format!(
            "Unsupported database scheme: {}",
            scheme
        )))
    }
}

/// PostgreSQL user store.
#[derive(Clone)]
pub struct PostgresUserStore {
    pool: Pool<Postgres>,
}

impl PostgresUserStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Creates the `users` table if it does not exist.
    pub async fn init(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT,
                hashed_password TEXT,
                is_premium BOOLEAN NOT NULL DEFAULT FALSE,
                provider TEXT,
                provider_account_id TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (provider, provider_account_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{} WHERE email = $1", SELECT_USER))
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_user).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_USER))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_user).transpose()
    }

    async fn create_user(&self, mut user: UserRecord) -> StoreResult<UserRecord> {
        user.email = normalize_email(&user.email);
        let (provider, account_id) = split_account(user.provider.as_ref());

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, hashed_password, is_premium,
                               provider, provider_account_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.hashed_password)
        .bind(user.is_premium)
        .bind(provider)
        .bind(account_id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &user.email))?;

        Ok(user)
    }

    async fn upsert_federated_user(&self, profile: &FederatedProfile) -> StoreResult<UserRecord> {
        let email = normalize_email(&profile.email);
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let linked: Option<UserRow> = sqlx::query_as(&format!(
            "{} WHERE provider = $1 AND provider_account_id = $2",
            SELECT_USER
        ))
        .bind(&profile.account.provider)
        .bind(&profile.account.provider_account_id)
        .fetch_optional(&mut *tx)
        .await?;

        let email_owner: Option<(String,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(&email)
                .fetch_optional(&mut *tx)
                .await?;

        let user = match linked.map(row_to_user).transpose()? {
            Some(mut user) => {
                if email_owner.is_some_and(|(id,)| id != user.id.to_string()) {
                    return Err(StoreError::already_exists(email));
                }

                user.email = email;
                if profile.name.is_some() {
                    user.name = profile.name.clone();
                }
                user.updated_at = now;

                sqlx::query(
                    r#"
                    UPDATE users
                    SET email = $2, name = $3, updated_at = $4
                    WHERE id = $1
                    "#,
                )
                .bind(user.id.to_string())
                .bind(&user.email)
                .bind(&user.name)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_insert_error(e, &user.email))?;

                user
            }
            None if email_owner.is_some() => {
                return Err(StoreError::AccountNotLinked(email));
            }
            None => {
                let mut user = UserRecord::new(email).with_provider(profile.account.clone());
                user.name = profile.name.clone();

                sqlx::query(
                    r#"
                    INSERT INTO users (id, email, name, is_premium, provider,
                                       provider_account_id, created_at, updated_at)
                    VALUES ($1, $2, $3, FALSE, $4, $5, $6, $7)
                    "#,
                )
                .bind(user.id.to_string())
                .bind(&user.email)
                .bind(&user.name)
                .bind(&profile.account.provider)
                .bind(&profile.account.provider_account_id)
                .bind(user.created_at)
                .bind(user.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_insert_error(e, &user.email))?;

                user
            }
        };

        tx.commit().await?;
        Ok(user)
    }
}

/// SQLite user store.
#[derive(Clone)]
pub struct SqliteUserStore {
    pool: Pool<Sqlite>,
}

impl SqliteUserStore {
    /// Creates a new SQLite store.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Creates the `users` table if it does not exist.
    pub async fn init(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT,
                hashed_password TEXT,
                is_premium INTEGER NOT NULL DEFAULT 0,
                provider TEXT,
                provider_account_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (provider, provider_account_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{} WHERE email = ?", SELECT_USER))
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_user).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_USER))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_user).transpose()
    }

    async fn create_user(&self, mut user: UserRecord) -> StoreResult<UserRecord> {
        user.email = normalize_email(&user.email);
        let (provider, account_id) = split_account(user.provider.as_ref());

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, hashed_password, is_premium,
                               provider, provider_account_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.hashed_password)
        .bind(user.is_premium)
        .bind(provider)
        .bind(account_id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &user.email))?;

        Ok(user)
    }

    async fn upsert_federated_user(&self, profile: &FederatedProfile) -> StoreResult<UserRecord> {
        let email = normalize_email(&profile.email);
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let linked: Option<UserRow> = sqlx::query_as(&format!(
            "{} WHERE provider = ? AND provider_account_id = ?",
            SELECT_USER
        ))
        .bind(&profile.account.provider)
        .bind(&profile.account.provider_account_id)
        .fetch_optional(&mut *tx)
        .await?;

        let email_owner: Option<(String,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = ?")
                .bind(&email)
                .fetch_optional(&mut *tx)
                .await?;

        let user = match linked.map(row_to_user).transpose()? {
            Some(mut user) => {
                if email_owner.is_some_and(|(id,)| id != user.id.to_string()) {
                    return Err(StoreError::already_exists(email));
                }

                user.email = email;
                if profile.name.is_some() {
                    user.name = profile.name.clone();
                }
                user.updated_at = now;

                sqlx::query(
                    r#"
                    UPDATE users
                    SET email = ?, name = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&user.email)
                .bind(&user.name)
                .bind(now)
                .bind(user.id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_insert_error(e, &user.email))?;

                user
            }
            None if email_owner.is_some() => {
                return Err(StoreError::AccountNotLinked(email));
            }
            None => {
                let mut user = UserRecord::new(email).with_provider(profile.account.clone());
                user.name = profile.name.clone();

                sqlx::query(
                    r#"
                    INSERT INTO users (id, email, name, is_premium, provider,
                                       provider_account_id, created_at, updated_at)
                    VALUES (?, ?, ?, 0, ?, ?, ?, ?)
                    "#,
                )
                .bind(user.id.to_string())
                .bind(&user.email)
                .bind(&user.name)
                .bind(&profile.account.provider)
                .bind(&profile.account.provider_account_id)
                .bind(user.created_at)
                .bind(user.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_insert_error(e, &user.email))?;

                user
            }
        };

        tx.commit().await?;
        Ok(user)
    }
}

fn split_account(account: Option<&ProviderAccount>) -> (Option<&str>, Option<&str>) {
    match account {
        Some(a) => (Some(a.provider.as_str()), Some(a.provider_account_id.as_str())),
        None => (None, None),
    }
}
