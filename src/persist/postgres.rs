//! Postgres repositories

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{LoginAttemptRepository, NonceRepository, PersistError, UserRepository};
use crate::models::{LoginAttempt, Nonce, User, WalletAddress};

fn parse_address(raw: String) -> Result<WalletAddress, PersistError> {
    raw.parse()
        .map_err(|e: crate::models::InvalidAddress| PersistError::CorruptRecord(e.to_string()))
}

fn address_strings(addresses: &[WalletAddress]) -> Vec<String> {
    addresses.iter().map(|a| a.as_str().to_string()).collect()
}

#[derive(sqlx::FromRow)]
struct NonceRow {
    address: String,
    value: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<NonceRow> for Nonce {
    type Error = PersistError;

    fn try_from(row: NonceRow) -> Result<Self, Self::Error> {
        Ok(Nonce {
            address: parse_address(row.address)?,
            value: row.value,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: Option<String>,
    bio: Option<String>,
    addresses: Vec<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = PersistError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            bio: row.bio,
            addresses: row
                .addresses
                .into_iter()
                .map(parse_address)
                .collect::<Result<_, _>>()?,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PgNonceRepository {
    db_pool: PgPool,
}

impl PgNonceRepository {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl NonceRepository for PgNonceRepository {
    async fn get(&self, address: &WalletAddress) -> Result<Nonce, PersistError> {
        // `id` is a sequence, so the greatest id is the latest insert even
        // when two rotations share a timestamp
        let row: Option<NonceRow> = sqlx::query_as(
            r#"
            SELECT address, value, created_at
            FROM nonces
            WHERE address = $1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(address.as_str())
        .fetch_optional(&self.db_pool)
        .await?;

        row.ok_or_else(|| PersistError::NonceNotFoundForAddress(address.clone()))?
            .try_into()
    }

    async fn create(&self, nonce: Nonce) -> Result<Nonce, PersistError> {
        sqlx::query(
            r#"
            INSERT INTO nonces (address, value, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(nonce.address.as_str())
        .bind(&nonce.value)
        .bind(nonce.created_at)
        .execute(&self.db_pool)
        .await?;

        Ok(nonce)
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    db_pool: PgPool,
}

impl PgUserRepository {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

/// Serialize writers claiming any of `addresses` until the transaction ends.
///
/// Locks are taken in sorted order so two claims over overlapping sets
/// cannot deadlock.
async fn lock_addresses(
    conn: &mut PgConnection,
    addresses: &[WalletAddress],
) -> Result<(), PersistError> {
    let mut keys = address_strings(addresses);
    keys.sort();
    keys.dedup();

    for key in keys {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn ensure_unowned(
    conn: &mut PgConnection,
    user_id: Option<Uuid>,
    addresses: &[WalletAddress],
) -> Result<(), PersistError> {
    let owned: Option<Vec<String>> = sqlx::query_scalar(
        r#"
        SELECT addresses
        FROM users
        WHERE addresses && $1 AND ($2::uuid IS NULL OR id <> $2) AND deleted = FALSE
        LIMIT 1
        "#,
    )
    .bind(address_strings(addresses))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(owned) = owned {
        if let Some(taken) = addresses
            .iter()
            .find(|address| owned.iter().any(|o| o == address.as_str()))
        {
            return Err(PersistError::AddressAlreadyOwned(taken.clone()));
        }
    }
    Ok(())
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> Result<User, PersistError> {
        let mut tx = self.db_pool.begin().await?;
        lock_addresses(&mut tx, &user.addresses).await?;
        ensure_unowned(&mut tx, None, &user.addresses).await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, bio, addresses, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.bio)
        .bind(address_strings(&user.addresses))
        .bind(user.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, PersistError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, bio, addresses, created_at
            FROM users
            WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.ok_or(PersistError::UserNotFound)?.try_into()
    }

    async fn get_by_address(&self, address: &WalletAddress) -> Result<Option<User>, PersistError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, bio, addresses, created_at
            FROM users
            WHERE $1 = ANY(addresses) AND deleted = FALSE
            "#,
        )
        .bind(address.as_str())
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, PersistError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, bio, addresses, created_at
            FROM users
            WHERE lower(username) = lower($1) AND deleted = FALSE
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn add_addresses(
        &self,
        user_id: Uuid,
        addresses: &[WalletAddress],
    ) -> Result<(), PersistError> {
        let mut tx = self.db_pool.begin().await?;
        lock_addresses(&mut tx, addresses).await?;
        ensure_unowned(&mut tx, Some(user_id), addresses).await?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE users
            SET addresses = ARRAY(SELECT DISTINCT unnest(addresses || $2::text[]))
            WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(user_id)
        .bind(address_strings(addresses))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(PersistError::UserNotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove_addresses(
        &self,
        user_id: Uuid,
        addresses: &[WalletAddress],
    ) -> Result<(), PersistError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE users
            SET addresses = ARRAY(SELECT a FROM unnest(addresses) AS a WHERE a <> ALL($2::text[]))
            WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(user_id)
        .bind(address_strings(addresses))
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(PersistError::UserNotFound);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgLoginAttemptRepository {
    db_pool: PgPool,
}

impl PgLoginAttemptRepository {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl LoginAttemptRepository for PgLoginAttemptRepository {
    async fn create(&self, attempt: LoginAttempt) -> Result<Uuid, PersistError> {
        let id = Uuid::new_v4();
        let headers: Json<BTreeMap<String, Vec<String>>> = Json(attempt.req_headers);

        sqlx::query(
            r#"
            INSERT INTO login_attempts (id, address, signature, signature_valid, req_host_addr, req_headers, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(attempt.address.as_str())
        .bind(&attempt.signature)
        .bind(attempt.signature_valid)
        .bind(&attempt.req_host_addr)
        .bind(headers)
        .bind(attempt.created_at)
        .execute(&self.db_pool)
        .await?;

        Ok(id)
    }
}
