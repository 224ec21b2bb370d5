//! Password hashing, verification and strength rules.

use crate::config::PasswordConfig;
use crate::error::{AuthError, Result};
use crate::secret::SecretString;
use argon2::{Algorithm, Argon2, ParamsBuilder, Version};
use password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng,
};

/// Minimum password length in characters.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Characters accepted for the symbol class.
pub const PASSWORD_SYMBOLS: &str = r#"!@#$%^&*()_+-=[]{}|;':",.<>/?"#;

/// Argon2id password hasher.
///
/// Cheap to clone; clones share nothing mutable and can be moved onto the
/// blocking pool.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

impl PasswordHasher {
    /// Build a hasher with the given cost.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if Argon2 rejects the parameters.
    pub fn new(config: PasswordConfig) -> Result<Self> {
        let params = ParamsBuilder::new()
            .m_cost(config.memory_kib)
            .t_cost(config.iterations)
            .p_cost(config.parallelism)
            .build()
            .map_err(|e| AuthError::InternalError(format!("Invalid Argon2 parameters: {e}")))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password into a PHC string.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if hashing fails. Bad input never
    /// fails here; strength is checked separately.
    pub fn hash(&self, password: &SecretString) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.expose_secret().as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::InternalError(format!("Password hashing failed: {e}")))
    }

    /// Check a password against a stored PHC string.
    ///
    /// A mismatch is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if the stored hash is malformed.
    pub fn verify(&self, password: &SecretString, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::InternalError(format!("Invalid password hash: {e}")))?;

        match self
            .argon2
            .verify_password(password.expose_secret().as_bytes(), &parsed)
        {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::InternalError(format!(
                "Password verification failed: {e}"
            ))),
        }
    }

    /// [`Self::hash`] on the blocking pool.
    ///
    /// # Errors
    ///
    /// Same as [`Self::hash`], plus [`AuthError::InternalError`] if the
    /// blocking task panics or is cancelled.
    pub async fn hash_blocking(&self, password: &SecretString) -> Result<String> {
        let hasher = self.clone();
        let password = password.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::InternalError(format!("Hashing task failed: {e}")))?
    }

    /// [`Self::verify`] on the blocking pool.
    ///
    /// # Errors
    ///
    /// Same as [`Self::verify`], plus [`AuthError::InternalError`] if the
    /// blocking task panics or is cancelled.
    pub async fn verify_blocking(&self, password: &SecretString, hash: &str) -> Result<bool> {
        let hasher = self.clone();
        let password = password.clone();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::InternalError(format!("Verification task failed: {e}")))?
    }
}

/// Enforce the password policy.
///
/// Requires at least [`MIN_PASSWORD_LENGTH`] characters and one each of an
/// ASCII uppercase letter, an ASCII lowercase letter, a digit and a symbol
/// from [`PASSWORD_SYMBOLS`].
///
/// # Errors
///
/// Returns [`AuthError::Validation`] whose details list every failed rule.
///
/// # Examples
///
/// ```
/// # use ticketbook_auth::password::validate_password_strength;
/// assert!(validate_password_strength("GoodPass123!").is_ok());
///
/// let err = validate_password_strength("short1!").unwrap_err();
/// assert!(err.details().iter().any(|d| d.contains("length")));
/// assert!(err.details().iter().any(|d| d.contains("uppercase letter")));
/// ```
pub fn validate_password_strength(password: &str) -> Result<()> {
    let mut failed = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        failed.push(format!(
            "length: must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        failed.push("must contain an uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        failed.push("must contain a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        failed.push("must contain a digit".to_string());
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        failed.push("must contain a special character".to_string());
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(AuthError::validation_with(
            "password does not meet requirements",
            failed,
        ))
    }
}
