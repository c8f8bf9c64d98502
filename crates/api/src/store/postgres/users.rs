//! User and auth-session queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;

use verdant_core::{Email, UserId};

use super::{PgStore, map_write_err, retry_read};
use crate::models::{ProfileUpdate, User};
use crate::store::{StoreError, UserStore};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, StoreError> {
        let email = Email::parse(&r.email)
            .map_err(|e| StoreError::DataCorruption(format!("invalid email in database: {e}")))?;
        Ok(Self {
            id: UserId::new(r.id),
            email,
            first_name: r.first_name,
            last_name: r.last_name,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const USER_RETURNING: &str = "RETURNING id, email, first_name, last_name, created_at, updated_at";

#[async_trait]
impl UserStore for PgStore {
    #[instrument(skip(self, password_hash, first_name, last_name))]
    async fn create_user(
        &self,
        email: &Email,
        password_hash: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_write_err)?;

        let sql = format!(
            "INSERT INTO app_user (email, first_name, last_name) VALUES ($1, $2, $3) {USER_RETURNING}"
        );
        let row: UserRow = sqlx::query_as(&sql)
            .bind(email.as_str())
            .bind(first_name)
            .bind(last_name)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return StoreError::Conflict("email already exists".to_owned());
                }
                map_write_err(e)
            })?;

        sqlx::query("INSERT INTO user_password (user_id, password_hash) VALUES ($1, $2)")
            .bind(row.id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await
            .map_err(map_write_err)?;

        tx.commit().await.map_err(map_write_err)?;

        User::try_from(row)
    }

    #[instrument(skip(self))]
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = retry_read(|| async {
            sqlx::query_as(
                "SELECT id, email, first_name, last_name, created_at, updated_at \
                 FROM app_user WHERE id = $1",
            )
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await
        })
        .await?;

        row.map(User::try_from).transpose()
    }

    #[instrument(skip(self, email))]
    async fn find_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, StoreError> {
        let row: Option<(i32, String, Option<String>, Option<String>, DateTime<Utc>, DateTime<Utc>, Option<String>)> =
            retry_read(|| async {
                sqlx::query_as(
                    "SELECT u.id, u.email, u.first_name, u.last_name, u.created_at, u.updated_at, \
                            p.password_hash \
                     FROM app_user u \
                     LEFT JOIN user_password p ON p.user_id = u.id \
                     WHERE u.email = $1",
                )
                .bind(email.as_str())
                .fetch_optional(&self.pool)
                .await
            })
            .await?;

        let Some((id, email, first_name, last_name, created_at, updated_at, password_hash)) = row
        else {
            return Ok(None);
        };

        let Some(password_hash) = password_hash else {
            return Ok(None);
        };

        let user = User::try_from(UserRow {
            id,
            email,
            first_name,
            last_name,
            created_at,
            updated_at,
        })?;

        Ok(Some((user, password_hash)))
    }

    #[instrument(skip(self, update))]
    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, StoreError> {
        let sql = format!(
            "UPDATE app_user SET \
                email = COALESCE($2, email), \
                first_name = COALESCE($3, first_name), \
                last_name = COALESCE($4, last_name), \
                updated_at = NOW() \
             WHERE id = $1 {USER_RETURNING}"
        );
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id.as_i32())
            .bind(update.email.as_ref().map(Email::as_str))
            .bind(update.first_name.as_deref())
            .bind(update.last_name.as_deref())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return StoreError::Conflict("email already exists".to_owned());
                }
                map_write_err(e)
            })?;

        row.map_or(Err(StoreError::NotFound), User::try_from)
    }

    #[instrument(skip(self, token))]
    async fn create_auth_session(&self, user: UserId, token: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO auth_session (token, user_id) VALUES ($1, $2)")
            .bind(token)
            .bind(user.as_i32())
            .execute(&self.pool)
            .await
            .map_err(map_write_err)?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = retry_read(|| async {
            sqlx::query_as(
                "SELECT u.id, u.email, u.first_name, u.last_name, u.created_at, u.updated_at \
                 FROM app_user u \
                 JOIN auth_session s ON s.user_id = u.id \
                 WHERE s.token = $1",
            )
            .bind(token)
            .fetch_optional(&self.pool)
            .await
        })
        .await?;

        row.map(User::try_from).transpose()
    }

    #[instrument(skip(self, token))]
    async fn delete_auth_session(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM auth_session WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(map_write_err)?;
        Ok(())
    }
}
