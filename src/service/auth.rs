use chrono::Utc;
use log::info;

use crate::dto::{AuthResponse, LoginRequest, NewUserDto, UpdateProfileDto};
use crate::errors::AppError;
use crate::models::{User, UserStatus};
use crate::service::crypto;
use crate::store::{next_id, Store};

pub const TOKEN_TTL_SECS: usize = 24 * 60 * 60;

pub mod jwt {
    use std::env;

    use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

    use crate::dto::Claims;
    use crate::errors::AppError;
    use crate::models::User;

    fn secret() -> String {
        env::var("JWT_SECRET")
            .unwrap_or_else(|_| "volunteerhub-secret-key-change-in-production".to_string())
    }

    pub fn create(user: &User) -> Result<String, AppError> {
        let exp = chrono::Utc::now().timestamp() as usize + super::TOKEN_TTL_SECS;
        let claims = Claims::new(user, exp);
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret().as_ref()),
        )
        .map_err(|_| AppError::InternalError)
    }

    /// Decodes and validates a token (signature + expiry).
    pub fn decode_claims(token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret().as_ref()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized)
    }
}

pub async fn login(store: &Store, request: LoginRequest) -> Result<AuthResponse, AppError> {
    let email = request.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::Validation("invalid email format".to_string()));
    }

    let user = match store.get_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            // Burn the same hashing time as a real comparison so a missing
            // account is not distinguishable by latency.
            let _ = crypto::hash_password("dummy");
            return Err(AppError::AuthError);
        }
    };

    if user.status == UserStatus::Locked {
        return Err(AppError::AccountLocked);
    }

    let stored_hash = store
        .get_password_hash(&user.email)
        .await?
        .ok_or(AppError::AuthError)?;
    if !crypto::verify_password(&request.password, &stored_hash) {
        return Err(AppError::AuthError);
    }

    let token = jwt::create(&user)?;
    info!("[auth] user authenticated: {}", user.email);
    Ok(AuthResponse { user, token })
}

pub async fn register(store: &Store, dto: NewUserDto) -> Result<AuthResponse, AppError> {
    let email = dto.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::Validation("invalid email format".to_string()));
    }
    validate_password(&dto.password)?;

    let full_name = dto.full_name.trim().to_string();
    if full_name.chars().count() < 2 {
        return Err(AppError::Validation(
            "full name must be at least 2 characters".to_string(),
        ));
    }

    if store.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict);
    }

    let now = Utc::now();
    let user = User {
        id: next_id(),
        email: email.clone(),
        full_name: full_name.clone(),
        role: dto.role,
        status: UserStatus::Active,
        avatar_url: Some(format!(
            "https://ui-avatars.com/api/?name={}&background=random",
            full_name.replace(' ', "+")
        )),
        created_at: now,
        updated_at: now,
    };

    store.add_user(&user).await?;
    store
        .set_password_hash(&user.email, &crypto::hash_password(&dto.password))
        .await?;

    let token = jwt::create(&user)?;
    info!("[auth] new user registered: {}", user.email);
    Ok(AuthResponse { user, token })
}

/// Resolves a bearer token back to its user, or `Unauthorized`.
pub async fn verify_token(store: &Store, token: &str) -> Result<User, AppError> {
    let claims = jwt::decode_claims(token)?;
    store
        .get_user(claims.user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub async fn change_password(
    store: &Store,
    user_id: i64,
    old_password: &str,
    new_password: &str,
) -> Result<(), AppError> {
    let user = store.get_user(user_id).await?.ok_or(AppError::NotFound)?;
    let stored_hash = store
        .get_password_hash(&user.email)
        .await?
        .ok_or(AppError::AuthError)?;
    if !crypto::verify_password(old_password, &stored_hash) {
        return Err(AppError::AuthError);
    }
    validate_password(new_password)?;
    store
        .set_password_hash(&user.email, &crypto::hash_password(new_password))
        .await?;
    info!("[auth] password changed for user {}", user.email);
    Ok(())
}

pub async fn update_profile(
    store: &Store,
    user_id: i64,
    updates: UpdateProfileDto,
) -> Result<User, AppError> {
    let mut user = store.get_user(user_id).await?.ok_or(AppError::NotFound)?;

    if let Some(full_name) = updates.full_name {
        let trimmed = full_name.trim().to_string();
        if trimmed.chars().count() < 2 {
            return Err(AppError::Validation(
                "full name must be at least 2 characters".to_string(),
            ));
        }
        user.full_name = trimmed;
    }

    if let Some(avatar_url) = updates.avatar_url {
        let trimmed = avatar_url.trim().to_string();
        if trimmed.is_empty() {
            user.avatar_url = None;
        } else if trimmed.starts_with("http") {
            user.avatar_url = Some(trimmed);
        } else {
            return Err(AppError::Validation(
                "avatar URL must be a valid URL".to_string(),
            ));
        }
    }

    user.updated_at = Utc::now();
    store.update_user(&user).await?;
    Ok(user)
}

fn is_valid_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn validate_password(password: &str) -> Result<(), AppError> {
    let mut errors: Vec<&str> = Vec::new();
    if password.chars().count() < 8 {
        errors.push("password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("password must contain lowercase letters");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("password must contain uppercase letters");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("password must contain numbers");
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::testutil;
    use tempfile::TempDir;

    fn new_user_dto(email: &str) -> NewUserDto {
        NewUserDto {
            email: email.to_string(),
            password: "Str0ngPass".to_string(),
            full_name: "Jamie Volunteer".to_string(),
            role: UserRole::Volunteer,
        }
    }

    #[tokio::test]
    async fn register_then_login_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = testutil::sqlite_store(&dir).await;

        let registered = register(&store, new_user_dto("Jamie@Example.org"))
            .await
            .unwrap();
        assert_eq!(registered.user.email, "jamie@example.org");
        assert!(!registered.token.is_empty());

        let logged_in = login(
            &store,
            LoginRequest {
                email: "jamie@example.org".to_string(),
                password: "Str0ngPass".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);

        let verified = verify_token(&store, &logged_in.token).await.unwrap();
        assert_eq!(verified.id, registered.user.id);
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials_and_locked_accounts() {
        let dir = TempDir::new().unwrap();
        let store = testutil::sqlite_store(&dir).await;
        let registered = register(&store, new_user_dto("a@example.org")).await.unwrap();

        let err = login(
            &store,
            LoginRequest {
                email: "a@example.org".to_string(),
                password: "WrongPass1".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err, AppError::AuthError);

        let err = login(
            &store,
            LoginRequest {
                email: "nobody@example.org".to_string(),
                password: "Str0ngPass".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err, AppError::AuthError);

        let mut locked = registered.user.clone();
        locked.status = UserStatus::Locked;
        store.update_user(&locked).await.unwrap();
        let err = login(
            &store,
            LoginRequest {
                email: "a@example.org".to_string(),
                password: "Str0ngPass".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err, AppError::AccountLocked);
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_weak_passwords() {
        let dir = TempDir::new().unwrap();
        let store = testutil::sqlite_store(&dir).await;
        register(&store, new_user_dto("dup@example.org")).await.unwrap();

        let err = register(&store, new_user_dto("dup@example.org"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Conflict);

        let mut weak = new_user_dto("weak@example.org");
        weak.password = "short".to_string();
        match register(&store, weak).await.unwrap_err() {
            AppError::Validation(message) => {
                assert!(message.contains("at least 8 characters"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn change_password_requires_the_old_one() {
        let dir = TempDir::new().unwrap();
        let store = testutil::sqlite_store(&dir).await;
        let registered = register(&store, new_user_dto("p@example.org")).await.unwrap();
        let user_id = registered.user.id;

        let err = change_password(&store, user_id, "WrongPass1", "N3wPassword")
            .await
            .unwrap_err();
        assert_eq!(err, AppError::AuthError);

        change_password(&store, user_id, "Str0ngPass", "N3wPassword")
            .await
            .unwrap();
        login(
            &store,
            LoginRequest {
                email: "p@example.org".to_string(),
                password: "N3wPassword".to_string(),
            },
        )
        .await
        .unwrap();
    }
}
