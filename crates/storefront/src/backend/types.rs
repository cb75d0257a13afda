//! Row and session types exchanged with the Remote Data Service.

use serde::{Deserialize, Serialize};

use district_vinyl_core::{Email, UserId, UserRole};

/// Bearer token for a signed-in user.
///
/// Implements `Debug` manually so the token never lands in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// The raw token, for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// A user as known to the authentication service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Email,
    /// Display name from sign-up metadata.
    pub full_name: Option<String>,
    /// Phone number from sign-up metadata.
    pub phone: Option<String>,
}

/// Result of a successful sign-up or sign-in.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: AuthUser,
    pub access_token: AccessToken,
}

/// Extra fields attached to a new account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignUpMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A row of the `profiles` resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Same value as the auth user id.
    pub id: UserId,
    pub email: Email,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

/// A row of the `contact_messages` resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("eyJhbGciOiJIUzI1NiJ9.secret".to_string());
        let debug = format!("{token:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_profile_role_defaults_to_customer() {
        let json = format!(
            r#"{{"id":"{}","email":"a@b.co"}}"#,
            UserId::generate()
        );
        let profile: Profile = serde_json::from_str(&json).unwrap();
        assert_eq!(profile.role, UserRole::Customer);
        assert!(profile.full_name.is_none());
    }

    #[test]
    fn test_contact_message_omits_missing_order_number() {
        let message = ContactMessage {
            first_name: "Ana".to_string(),
            last_name: "P".to_string(),
            email: Email::parse("ana@example.com").unwrap(),
            order_number: None,
            message: "Hi".to_string(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("order_number").is_none());
    }
}
