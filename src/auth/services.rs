use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::UserRepo,
        repo_types::{NewUser, User},
    },
    error::AppError,
};

pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid");

    // Verified against when the email is unknown, so both login failures
    // cost one Argon2 run.
    static ref DUMMY_HASH: String = hash_password("no-such-user-password").unwrap_or_default();
}

/// A freshly signed token together with the user it was issued for.
pub struct Issued {
    pub token: String,
    pub user: User,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(input: &RegisterRequest) -> Result<(), AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    if !is_valid_email(&input.email) {
        return Err(AppError::Validation("invalid email".into()));
    }
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_login(input: &LoginRequest) -> Result<(), AppError> {
    if !is_valid_email(&input.email) {
        return Err(AppError::Validation("invalid email".into()));
    }
    if input.password.is_empty() {
        return Err(AppError::Validation("password is required".into()));
    }
    Ok(())
}

/// Validates, hashes, persists and signs. The lookup is a fast path for the
/// common duplicate; the unique constraint still decides races.
#[instrument(skip_all)]
pub async fn register(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    mut input: RegisterRequest,
) -> Result<Issued, AppError> {
    input.email = normalize_email(&input.email);
    if let Err(e) = validate_registration(&input) {
        warn!(email = %input.email, error = %e, "rejected registration");
        return Err(e);
    }

    if users.find_by_email(&input.email).await?.is_some() {
        warn!(email = %input.email, "email already registered");
        return Err(AppError::Conflict);
    }

    let hash = hash_password(&input.password)?;
    let user = users
        .create(NewUser {
            name: input.name.trim(),
            email: &input.email,
            password_hash: &hash,
        })
        .await?;

    let token = keys.issue(user.id)?;
    info!(
        user_id = user.id,
        email = %user.email,
        newsletter = input.subscribe_newsletter,
        "user registered"
    );
    Ok(Issued { token, user })
}

/// Unknown email and wrong password yield the same `InvalidCredentials`.
#[instrument(skip_all)]
pub async fn login(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    mut input: LoginRequest,
) -> Result<Issued, AppError> {
    input.email = normalize_email(&input.email);
    validate_login(&input)?;

    let Some(user) = users.find_by_email(&input.email).await? else {
        if !DUMMY_HASH.is_empty() {
            let _ = verify_password(&input.password, &DUMMY_HASH);
        }
        warn!(email = %input.email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&input.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = keys.issue(user.id)?;
    info!(user_id = user.id, "user logged in");
    Ok(Issued { token, user })
}

/// Loads the caller's profile. A valid token for a vanished user is treated
/// as unauthorized.
#[instrument(skip(users))]
pub async fn profile(users: &dyn UserRepo, user_id: i64) -> Result<User, AppError> {
    match users.find_by_id(user_id).await? {
        Some(user) => Ok(user),
        None => {
            warn!(user_id, "token for unknown user");
            Err(AppError::Unauthorized)
        }
    }
}
