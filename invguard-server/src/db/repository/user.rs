//! Principal Repository

use super::{RepoError, RepoResult};
use shared::models::{UserAccount, UserCreate};
use sqlx::SqlitePool;

/// Hash password using argon2
fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(password_hash.to_string())
}

fn check_password(hash: &str, password: &str) -> Result<bool, argon2::password_hash::Error> {
    use argon2::{
        Argon2,
        password_hash::{PasswordHash, PasswordVerifier},
    };

    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<UserAccount>> {
    let user = sqlx::query_as::<_, UserAccount>(
        "SELECT id, username, role, created_at FROM app_user WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> RepoResult<Option<UserAccount>> {
    let user = sqlx::query_as::<_, UserAccount>(
        "SELECT id, username, role, created_at FROM app_user WHERE username = ? LIMIT 1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn create(pool: &SqlitePool, data: UserCreate) -> RepoResult<UserAccount> {
    if data.username.trim().is_empty() {
        return Err(RepoError::InvalidArgument("username must not be empty".into()));
    }
    if find_by_username(pool, &data.username).await?.is_some() {
        return Err(RepoError::Duplicate(format!(
            "Username '{}' already exists",
            data.username
        )));
    }

    let password_hash = hash_password(&data.password)
        .map_err(|e| RepoError::Database(format!("Failed to hash password: {e}")))?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO app_user (username, password_hash, role, created_at) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(&data.username)
    .bind(password_hash)
    .bind(data.role)
    .bind(shared::util::now_millis())
    .fetch_one(pool)
    .await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create user".into()))
}

/// Check credentials; `None` for an unknown user or a wrong password
pub async fn verify_password(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> RepoResult<Option<UserAccount>> {
    let hash = sqlx::query_scalar::<_, String>(
        "SELECT password_hash FROM app_user WHERE username = ? LIMIT 1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    let Some(hash) = hash else {
        return Ok(None);
    };
    let valid = check_password(&hash, password)
        .map_err(|e| RepoError::Database(format!("Corrupt password hash: {e}")))?;
    if !valid {
        return Ok(None);
    }
    find_by_username(pool, username).await
}
