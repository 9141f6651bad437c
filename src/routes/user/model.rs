use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::utils::{hash_password, verify_password};

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: String,
    pub nickname: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_temporary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRegisteredUserRequest {
    pub user_id: String,
    pub password: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user_id: String,
    pub nickname: String,
    pub token: (String, i64),
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub token: (String, i64),
}

#[derive(Debug, Serialize)]
pub struct CheckTokenResponse {
    pub user_id: String,
    pub is_temporary: bool,
}

const USER_COLUMNS: &str = "user_id, nickname, password_hash, is_temporary, created_at";

// 用户ID只允许字母、数字和下划线
pub fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id.len() <= 64
        && user_id.chars().all(|c| c.is_alphanumeric() || c == '_')
}

impl User {
    pub async fn create(
        pool: &PgPool,
        req: CreateRegisteredUserRequest,
    ) -> Result<Self, sqlx::Error> {
        let password_hash = hash_password(&req.password)
            .map_err(|e| sqlx::Error::Protocol(format!("Failed to hash password: {}", e)))?;

        let sql = format!(
            r#"
            INSERT INTO users (user_id, nickname, password_hash, is_temporary, created_at)
            VALUES ($1, $2, $3, false, NOW())
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(&req.user_id)
            .bind(&req.nickname)
            .bind(&password_hash)
            .fetch_one(pool)
            .await
    }

    pub async fn create_temporary(
        pool: &PgPool,
        user_id: &str,
        nickname: &str,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO users (user_id, nickname, password_hash, is_temporary, created_at)
            VALUES ($1, $2, NULL, true, NOW())
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .bind(nickname)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, user_id: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    // 分组列表展示成员昵称用
    pub async fn find_nicknames(
        pool: &PgPool,
        user_ids: &[String],
    ) -> Result<Vec<(String, String)>, sqlx::Error> {
        sqlx::query_as("SELECT user_id, nickname FROM users WHERE user_id = ANY($1)")
            .bind(user_ids)
            .fetch_all(pool)
            .await
    }

    pub async fn verify_login(&self, password: &str) -> Result<bool, sqlx::Error> {
        let Some(hash) = self.password_hash.as_deref() else {
            return Ok(false);
        };
        verify_password(password, hash)
            .map_err(|e| sqlx::Error::Protocol(format!("Password verification failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_charset() {
        assert!(is_valid_user_id("alice_01"));
        assert!(!is_valid_user_id(""));
        assert!(!is_valid_user_id("alice!"));
        assert!(!is_valid_user_id("a b"));
        assert!(!is_valid_user_id(&"x".repeat(65)));
    }
}
