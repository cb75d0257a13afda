//! Session-related types.
//!
//! Types stored in the visitor's session.

use serde::{Deserialize, Serialize};

use district_vinyl_core::{Email, UserId, UserRole};

use crate::backend::AuthUser;

/// Session-stored user identity.
///
/// Minimal data kept in the session to identify the signed-in user and
/// pre-fill checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Auth service user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub full_name: String,
    /// Phone number captured at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Role as of the last profile lookup.
    #[serde(default)]
    pub role: UserRole,
}

impl CurrentUser {
    /// Build the session identity from an auth user.
    ///
    /// Falls back to the local part of the email when no name was given.
    #[must_use]
    pub fn from_auth_user(user: AuthUser, role: UserRole) -> Self {
        let full_name = user
            .full_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| user.email.local_part().to_string());

        Self {
            id: user.id,
            email: user.email,
            full_name,
            phone: user.phone,
            role,
        }
    }
}

/// How far the visitor got through checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStage {
    /// Gateway passed; shipping details may be entered.
    Finalization,
}

/// Session keys.
pub mod keys {
    /// Key for the cart line items.
    pub const CART: &str = "cart";

    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the auth service access token.
    pub const ACCESS_TOKEN: &str = "access_token";

    /// Key for the checkout stage.
    pub const CHECKOUT_STAGE: &str = "checkout_stage";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_auth_user_falls_back_to_local_part() {
        let user = AuthUser {
            id: UserId::generate(),
            email: Email::parse("crate.digger@example.com").unwrap(),
            full_name: Some("  ".to_string()),
            phone: None,
        };
        let current = CurrentUser::from_auth_user(user, UserRole::Customer);
        assert_eq!(current.full_name, "crate.digger");
    }
}
