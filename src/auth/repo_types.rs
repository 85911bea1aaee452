use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,                           // unique, stored lower-cased
    pub password_hash: String,                   // Argon2 PHC string
    pub email_verified_at: Option<OffsetDateTime>,
    pub remember_token: Option<String>,          // up to 100 chars
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields supplied by registration; the rest is filled in by the store.
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}
