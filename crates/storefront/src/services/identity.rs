//! Session/identity resolver.
//!
//! A visitor is either anonymous or signed in. The signed-in identity and
//! its access token live in the visitor's store; accounts and roles live in
//! the Remote Data Service.

use thiserror::Error;

use district_vinyl_core::{Email, EmailError, UserRole};

use crate::backend::{
    AccessToken, AuthProvider, AuthSession, Backend, BackendError, DataService, Profile,
    SignUpMetadata,
};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::{CurrentUser, session_keys};
use crate::store::{KeyValueStore, KeyValueStoreExt, StoreError};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Email or password left blank.
    #[error("email and password are required")]
    MissingCredentials,

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password too short.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    /// Name or phone missing where registration requires them.
    #[error("name and phone are required")]
    MissingContactDetails,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account was created but must be confirmed before signing in.
    #[error("account confirmation required")]
    ConfirmationRequired,

    /// No signed-in identity.
    #[error("not signed in")]
    NotAuthenticated,

    /// Signed in, but the profile is not an admin.
    #[error("admin role required")]
    NotAdmin,

    /// Remote Data Service failure.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Session store failure.
    #[error("session error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Message shown inline on the form, or `None` for server-side failures.
    #[must_use]
    pub const fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::MissingCredentials => Some("EMAIL AND PASSWORD ARE REQUIRED"),
            Self::InvalidEmail(_) => Some("PLEASE ENTER A VALID EMAIL ADDRESS"),
            Self::WeakPassword => Some("PASSWORD MUST BE AT LEAST 6 CHARACTERS"),
            Self::MissingContactDetails => Some("NAME AND PHONE ARE REQUIRED FOR REGISTRATION"),
            Self::UserAlreadyExists => Some("EMAIL ALREADY REGISTERED"),
            Self::InvalidCredentials => Some("INVALID EMAIL OR PASSWORD"),
            Self::ConfirmationRequired => Some("CHECK YOUR INBOX TO CONFIRM YOUR ACCOUNT"),
            Self::NotAuthenticated => Some("PLEASE SIGN IN"),
            Self::NotAdmin => Some("ACCESS DENIED: ADMIN ACCOUNT REQUIRED"),
            Self::Backend(_) | Self::Store(_) => None,
        }
    }
}

/// Registration form input.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: String,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("full_name", &self.full_name)
            .field("phone", &self.phone)
            .finish()
    }
}

/// Resolves and changes the visitor's identity.
pub struct IdentityResolver<'a> {
    backend: &'a dyn Backend,
    store: &'a dyn KeyValueStore,
}

impl<'a> IdentityResolver<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend, store: &'a dyn KeyValueStore) -> Self {
        Self { backend, store }
    }

    /// The signed-in identity, read from the session only.
    ///
    /// An unreadable record counts as anonymous.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn current(&self) -> Result<Option<CurrentUser>, StoreError> {
        match self.store.get::<CurrentUser>(session_keys::CURRENT_USER).await {
            Ok(user) => Ok(user),
            Err(StoreError::Decode { source, .. }) => {
                tracing::warn!(error = %source, "Ignoring unreadable identity record");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The access token of the signed-in identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn access_token(&self) -> Result<Option<AccessToken>, StoreError> {
        match self.store.get::<AccessToken>(session_keys::ACCESS_TOKEN).await {
            Ok(token) => Ok(token),
            Err(StoreError::Decode { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create an account and sign it in.
    ///
    /// When `contact_required` is set (the checkout gateway), name and phone
    /// must be given as well.
    ///
    /// # Errors
    ///
    /// Returns a validation `AuthError` for bad input,
    /// `AuthError::UserAlreadyExists` for a taken email, or a backend/store
    /// error.
    pub async fn register(
        &self,
        input: &Registration,
        contact_required: bool,
    ) -> Result<CurrentUser, AuthError> {
        let email = validate_credentials(&input.email, &input.password)?;
        let full_name = input.full_name.trim();
        let phone = input.phone.trim();
        if contact_required && (full_name.is_empty() || phone.is_empty()) {
            return Err(AuthError::MissingContactDetails);
        }

        let metadata = SignUpMetadata {
            full_name: non_empty(full_name),
            phone: non_empty(phone),
        };

        let session = self
            .backend
            .sign_up(&email, &input.password, &metadata)
            .await
            .map_err(|e| match e {
                BackendError::Conflict(_) => AuthError::UserAlreadyExists,
                BackendError::NoSession => AuthError::ConfirmationRequired,
                other => AuthError::Backend(other),
            })?;

        let profile = Profile {
            id: session.user.id,
            email: session.user.email.clone(),
            full_name: metadata.full_name.clone(),
            role: UserRole::Customer,
        };
        if let Err(e) = self
            .backend
            .upsert_profile(&profile, Some(&session.access_token))
            .await
        {
            tracing::warn!(user_id = %profile.id, error = %e, "Failed to write customer profile");
        }

        let user = self.establish(session, UserRole::Customer).await?;
        tracing::info!(user_id = %user.id, "Account registered");
        Ok(user)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns a validation `AuthError` for bad input,
    /// `AuthError::InvalidCredentials` if the service rejects them, or a
    /// backend/store error.
    pub async fn login(&self, email: &str, password: &str) -> Result<CurrentUser, AuthError> {
        let email = validate_credentials(email, password)?;

        let session = self
            .backend
            .sign_in(&email, password)
            .await
            .map_err(|e| match e {
                BackendError::InvalidCredentials => AuthError::InvalidCredentials,
                BackendError::NoSession => AuthError::ConfirmationRequired,
                other => AuthError::Backend(other),
            })?;

        let role = self
            .backend
            .get_profile(session.user.id, Some(&session.access_token))
            .await?
            .map(|profile| profile.role)
            .unwrap_or_default();

        let user = self.establish(session, role).await?;
        tracing::info!(user_id = %user.id, "Signed in");
        Ok(user)
    }

    /// Sign out.
    ///
    /// Revoking the token remotely is best effort. The cart is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the session keys cannot be removed.
    pub async fn logout(&self) -> Result<(), StoreError> {
        if let Some(token) = self.access_token().await?
            && let Err(e) = self.backend.sign_out(&token).await
        {
            tracing::warn!(error = %e, "Failed to revoke access token");
        }

        self.store.remove(session_keys::CURRENT_USER).await?;
        self.store.remove(session_keys::ACCESS_TOKEN).await?;
        self.store.remove(session_keys::CHECKOUT_STAGE).await?;
        clear_sentry_user();
        Ok(())
    }

    /// The signed-in identity, if its profile has the admin role.
    ///
    /// The access token is checked with the auth service and the role is
    /// looked up again on every call. A signed-in visitor without the role,
    /// or whose token was revoked, is signed out.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` when anonymous or when the token
    /// is no longer valid,
    /// `AuthError::NotAdmin` when the role check fails, or a backend/store
    /// error.
    pub async fn require_admin(&self) -> Result<CurrentUser, AuthError> {
        let Some(mut user) = self.current().await? else {
            return Err(AuthError::NotAuthenticated);
        };
        let Some(token) = self.access_token().await? else {
            self.logout().await?;
            return Err(AuthError::NotAuthenticated);
        };

        let session_user = self.backend.get_user(&token).await?;
        if session_user.is_none_or(|session_user| session_user.id != user.id) {
            tracing::info!(user_id = %user.id, "Access token no longer valid; signing out");
            self.logout().await?;
            return Err(AuthError::NotAuthenticated);
        }

        let role = match self.backend.get_profile(user.id, Some(&token)).await {
            Ok(profile) => profile.map(|profile| profile.role).unwrap_or_default(),
            Err(BackendError::Unauthorized) => {
                self.logout().await?;
                return Err(AuthError::NotAuthenticated);
            }
            Err(e) => return Err(e.into()),
        };

        if !role.is_admin() {
            tracing::warn!(user_id = %user.id, "Non-admin reached admin area; signing out");
            self.logout().await?;
            return Err(AuthError::NotAdmin);
        }

        if user.role != role {
            user.role = role;
            self.store.set(session_keys::CURRENT_USER, &user).await?;
        }
        Ok(user)
    }

    async fn establish(
        &self,
        session: AuthSession,
        role: UserRole,
    ) -> Result<CurrentUser, StoreError> {
        let AuthSession { user, access_token } = session;
        let current = CurrentUser::from_auth_user(user, role);

        self.store
            .set(session_keys::CURRENT_USER, &current)
            .await?;
        self.store
            .set(session_keys::ACCESS_TOKEN, &access_token)
            .await?;
        set_sentry_user(&current.id, Some(current.email.as_str()));

        Ok(current)
    }
}

/// Check presence and shape of an email/password pair.
///
/// # Errors
///
/// Returns `MissingCredentials`, `InvalidEmail` or `WeakPassword`.
pub fn validate_credentials(email: &str, password: &str) -> Result<Email, AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    let email = Email::parse(email)?;
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword);
    }
    Ok(email)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
