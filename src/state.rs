use std::sync::Arc;

use crate::{
    auth::{
        jwt::JwtKeys,
        repo::{PgUserRepo, UserRepo},
    },
    config::AppConfig,
    db,
};

/// Shared per-process handles. Everything inside is immutable or pooled.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepo>,
    pub jwt: JwtKeys,
}

impl AppState {
    /// Builds the signing keys, connects (with retry) and migrates the
    /// database. Any failure here aborts startup.
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let jwt = JwtKeys::new(&config.jwt.secret)?;
        let pool = db::connect(&config.database).await?;
        db::migrate(&pool).await?;
        Ok(Self::from_parts(Arc::new(PgUserRepo::new(pool)), jwt))
    }

    pub fn from_parts(users: Arc<dyn UserRepo>, jwt: JwtKeys) -> Self {
        Self { users, jwt }
    }
}
