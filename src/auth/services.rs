use lazy_static::lazy_static;
use regex::Regex;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginRequest, PublicUser, RegisterRequest, UpdateProfileRequest, VerifyTokenResponse},
        jwt::TokenService,
        password::{hash_password, verify_password, DUMMY_HASH},
        repo::UserStore,
        repo_types::{NewUser, ProfileUpdate},
    },
    error::{AppError, AppResult, FieldError},
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_register(username: &str, email: &str, password: &str) -> AppResult<()> {
    let mut errors = Vec::new();
    if username.is_empty() {
        errors.push(FieldError {
            field: "username",
            msg: "Username is required",
        });
    }
    if !is_valid_email(email) {
        errors.push(FieldError {
            field: "email",
            msg: "Please include a valid email",
        });
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError {
            field: "password",
            msg: "Please enter a password with 6 or more characters",
        });
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn validate_login(email: &str, password: &str) -> AppResult<()> {
    let mut errors = Vec::new();
    if !is_valid_email(email) {
        errors.push(FieldError {
            field: "email",
            msg: "Please include a valid email",
        });
    }
    if password.is_empty() {
        errors.push(FieldError {
            field: "password",
            msg: "Password is required",
        });
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

async fn hash_off_thread(plain: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(AppError::Internal)
}

async fn verify_off_thread(plain: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))
}

/// Creates the account and returns a fresh session token for it.
pub async fn register(
    users: &dyn UserStore,
    tokens: &TokenService,
    req: RegisterRequest,
) -> AppResult<String> {
    let username = req.username.trim().to_string();
    let email = normalize_email(&req.email);
    if let Err(e) = validate_register(&username, &email, &req.password) {
        warn!("register validation failed");
        return Err(e);
    }

    if users
        .find_by_username_or_email(&username, &email)
        .await?
        .is_some()
    {
        warn!(%username, %email, "user already exists");
        return Err(AppError::Conflict);
    }

    let password_hash = hash_off_thread(req.password).await?;

    // A concurrent registration can still win the race; the store's unique
    // constraint turns that into Conflict.
    let user = users
        .create(NewUser {
            username,
            email,
            password_hash,
        })
        .await?;

    let token = tokens.issue(user.id)?;
    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(token)
}

/// Unknown email and wrong password fail identically.
pub async fn login(
    users: &dyn UserStore,
    tokens: &TokenService,
    req: LoginRequest,
) -> AppResult<String> {
    let email = normalize_email(&req.email);
    if let Err(e) = validate_login(&email, &req.password) {
        warn!("login validation failed");
        return Err(e);
    }

    let Some(user) = users.find_by_email(&email).await? else {
        // same argon2 cost as a wrong password
        verify_off_thread(req.password, DUMMY_HASH.to_string()).await?;
        warn!(%email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_off_thread(req.password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = tokens.issue(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(token)
}

pub async fn current_user(users: &dyn UserStore, user_id: Uuid) -> AppResult<PublicUser> {
    match users.find_by_id(user_id).await? {
        Some(user) => Ok(user.into()),
        None => {
            warn!(%user_id, "token refers to a missing user");
            Err(AppError::NotFound)
        }
    }
}

fn clean_skills(skills: Vec<String>) -> Vec<String> {
    skills
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Only profile fields change; identity fields are never written here.
pub async fn update_profile(
    users: &dyn UserStore,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> AppResult<PublicUser> {
    let update = ProfileUpdate {
        bio: req.bio.map(|b| b.trim().to_string()),
        skills_offered: req.skills_offered.map(clean_skills),
        skills_sought: req.skills_sought.map(clean_skills),
    };
    match users.update_profile(user_id, update).await? {
        Some(user) => {
            info!(%user_id, "profile updated");
            Ok(user.into())
        }
        None => Err(AppError::NotFound),
    }
}

/// Diagnostic decode of a token: the claims plus a readable expiry.
pub fn inspect_token(tokens: &TokenService, token: &str) -> AppResult<VerifyTokenResponse> {
    let claims = tokens.verify(token)?;
    let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .ok_or_else(|| AppError::BadRequest("Token verification failed".into()))?;
    Ok(VerifyTokenResponse {
        success: true,
        data: claims,
        expires_at,
    })
}
