use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("email already registered")]
    Conflict,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Credential store. Email uniqueness is the store's job, not the caller's.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError>;
    /// Fails with `RepoError::Conflict` when the email is already taken.
    async fn create(&self, user: NewUser<'_>) -> Result<User, RepoError>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, email_verified_at, \
                            remember_token, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser<'_>) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation());
            if duplicate {
                RepoError::Conflict
            } else {
                RepoError::Database(e)
            }
        })
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryUserRepo;

#[cfg(test)]
mod memory {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    use time::OffsetDateTime;

    use super::*;

    /// In-process store for tests, with the same uniqueness rule as the table.
    #[derive(Default)]
    pub(crate) struct MemoryUserRepo {
        users: Mutex<Vec<User>>,
        unavailable: AtomicBool,
    }

    impl MemoryUserRepo {
        pub fn len(&self) -> usize {
            self.users.lock().unwrap().len()
        }

        /// Makes every subsequent call fail like a dropped connection.
        pub fn set_unavailable(&self, down: bool) {
            self.unavailable.store(down, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), RepoError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(RepoError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UserRepo for MemoryUserRepo {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
            self.check()?;
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| u.email == email).cloned())
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
            self.check()?;
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| u.id == id).cloned())
        }

        async fn create(&self, user: NewUser<'_>) -> Result<User, RepoError> {
            self.check()?;
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.email == user.email) {
                return Err(RepoError::Conflict);
            }
            let now = OffsetDateTime::now_utc();
            let created = User {
                id: users.len() as i64 + 1,
                name: user.name.to_string(),
                email: user.email.to_string(),
                password_hash: user.password_hash.to_string(),
                email_verified_at: None,
                remember_token: None,
                created_at: now,
                updated_at: now,
            };
            users.push(created.clone());
            Ok(created)
        }
    }

    #[tokio::test]
    async fn memory_repo_enforces_unique_email() {
        let repo = MemoryUserRepo::default();
        let new = || NewUser {
            name: "Ann",
            email: "ann@x.com",
            password_hash: "hash",
        };
        let first = repo.create(new()).await.unwrap();
        assert_eq!(first.id, 1);
        assert!(matches!(repo.create(new()).await, Err(RepoError::Conflict)));
        assert_eq!(repo.len(), 1);
        assert_eq!(
            repo.find_by_id(1).await.unwrap().map(|u| u.email),
            Some("ann@x.com".to_string())
        );
    }
}
