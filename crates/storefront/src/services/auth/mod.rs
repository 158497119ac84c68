//! Authentication service.
//!
//! Email/password accounts with Argon2id hashes, plus the profile fields
//! collected at registration.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use filamento_core::{Email, UserId};
use filamento_core::br::{Phone, format_phone};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::user::{ProfileUpdate, User, UserProfile};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Longest accepted display name.
const MAX_DISPLAY_NAME_LENGTH: usize = 120;

/// Registration request.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::InvalidProfile` if the name or phone is rejected.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        let email = Email::parse(&registration.email)?;
        validate_password(&registration.password)?;
        let profile = normalize_profile(&ProfileUpdate {
            display_name: registration.display_name.clone(),
            phone: registration.phone.clone(),
            photo_url: None,
        })?;

        let password_hash = hash_password(&registration.password)?;

        self.users
            .create_with_password(
                &NewUser {
                    email: &email,
                    display_name: profile.display_name.as_deref(),
                    phone: profile.phone.as_deref(),
                },
                &password_hash,
            )
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Load a user's profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn profile(&self, user_id: UserId) -> Result<UserProfile, AuthError> {
        self.users
            .get_profile(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Update profile fields. Absent fields keep their value; blank strings
    /// clear them.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidProfile` if a field is rejected.
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, AuthError> {
        let update = normalize_profile(update)?;
        self.users
            .update_profile(user_id, &update)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }
}

/// Trim fields, format the phone and check the photo URL.
///
/// `Some("")` survives as a request to clear the field.
fn normalize_profile(update: &ProfileUpdate) -> Result<ProfileUpdate, AuthError> {
    let display_name = update.display_name.as_deref().map(str::trim);
    if display_name.is_some_and(|n| n.chars().count() > MAX_DISPLAY_NAME_LENGTH) {
        return Err(AuthError::InvalidProfile(format!(
            "O nome deve ter no máximo {MAX_DISPLAY_NAME_LENGTH} caracteres"
        )));
    }

    let phone = match update.phone.as_deref().map(str::trim) {
        Some("") => Some(String::new()),
        Some(raw) => {
            let phone = Phone::parse(raw)
                .map_err(|_| AuthError::InvalidProfile("Telefone inválido".to_owned()))?;
            Some(format_phone(&format!("{}{}", phone.area_code, phone.number)))
        }
        None => None,
    };

    let photo_url = match update.photo_url.as_deref().map(str::trim) {
        Some("") => Some(String::new()),
        Some(raw) => {
            let url = url::Url::parse(raw)
                .map_err(|_| AuthError::InvalidProfile("URL da foto inválida".to_owned()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(AuthError::InvalidProfile("URL da foto inválida".to_owned()));
            }
            Some(url.to_string())
        }
        None => None,
    };

    Ok(ProfileUpdate {
        display_name: display_name.map(str::to_owned),
        phone,
        photo_url,
    })
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "A senha deve ter pelo menos {MIN_PASSWORD_LENGTH} caracteres"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            validate_password("curta"),
            Err(AuthError::WeakPassword(_))
        ));
        // Counted in characters, not bytes
        assert!(validate_password("çãõéíúâê").is_ok());
    }

    #[test]
    fn test_normalize_profile_formats_phone() {
        let update = normalize_profile(&ProfileUpdate {
            display_name: Some("  Ana Lima ".to_owned()),
            phone: Some("11987654321".to_owned()),
            photo_url: None,
        })
        .unwrap();
        assert_eq!(update.display_name.as_deref(), Some("Ana Lima"));
        assert_eq!(update.phone.as_deref(), Some("(11) 98765-4321"));
        assert_eq!(update.photo_url, None);
    }

    #[test]
    fn test_normalize_profile_blank_clears() {
        let update = normalize_profile(&ProfileUpdate {
            display_name: None,
            phone: Some("  ".to_owned()),
            photo_url: Some(String::new()),
        })
        .unwrap();
        assert_eq!(update.phone.as_deref(), Some(""));
        assert_eq!(update.photo_url.as_deref(), Some(""));
    }

    #[test]
    fn test_normalize_profile_rejects_bad_input() {
        assert!(matches!(
            normalize_profile(&ProfileUpdate {
                phone: Some("123".to_owned()),
                ..Default::default()
            }),
            Err(AuthError::InvalidProfile(_))
        ));
        assert!(matches!(
            normalize_profile(&ProfileUpdate {
                photo_url: Some("javascript:alert(1)".to_owned()),
                ..Default::default()
            }),
            Err(AuthError::InvalidProfile(_))
        ));
    }
}
