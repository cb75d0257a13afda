//! In-process Remote Data Service.
//!
//! Keeps users, sessions and every table in memory behind a
//! `std::sync::RwLock`. The lock is never held across an `.await`.
//! Passwords are stored as Argon2id hashes and session tokens are random
//! 256-bit values.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

use district_vinyl_core::{
    Email, NewProduct, Order, Product, ProductId, UserId, UserRole,
};

use super::{
    AccessToken, AuthProvider, AuthSession, AuthUser, BackendError, ContactMessage, DataService,
    Profile, SignUpMetadata,
};

struct StoredUser {
    user: AuthUser,
    password_hash: String,
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, StoredUser>,
    emails: HashMap<Email, UserId>,
    tokens: HashMap<String, UserId>,
    profiles: HashMap<UserId, Profile>,
    /// Insertion order; listings reverse it.
    products: Vec<Product>,
    last_product_id: i64,
    orders: Vec<Order>,
    newsletter: HashSet<Email>,
    contact_messages: Vec<ContactMessage>,
}

/// Remote Data Service kept in process memory.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, BackendError> {
        self.tables
            .read()
            .map_err(|_| BackendError::Internal("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, BackendError> {
        self.tables
            .write()
            .map_err(|_| BackendError::Internal("memory store lock poisoned".to_string()))
    }

    /// Add a catalog product without going through the inventory form.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Internal` if the store lock is poisoned.
    pub fn seed_product(&self, product: NewProduct) -> Result<Product, BackendError> {
        let mut tables = self.write()?;
        let product = product.into_product(next_product_id(&mut tables));
        tables.products.push(product.clone());
        Ok(product)
    }

    /// Create an account with the admin role.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Conflict` if the email is taken.
    pub fn create_admin(
        &self,
        email: &Email,
        password: &str,
        full_name: &str,
    ) -> Result<UserId, BackendError> {
        let metadata = SignUpMetadata {
            full_name: Some(full_name.to_string()),
            phone: None,
        };
        let user = self.create_user(email, password, &metadata)?;
        let mut tables = self.write()?;
        tables.profiles.insert(
            user.id,
            Profile {
                id: user.id,
                email: email.clone(),
                full_name: Some(full_name.to_string()),
                role: UserRole::Admin,
            },
        );
        Ok(user.id)
    }

    /// Every stored order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Internal` if the store lock is poisoned.
    pub fn orders(&self) -> Result<Vec<Order>, BackendError> {
        Ok(self.read()?.orders.clone())
    }

    /// Every stored contact message, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Internal` if the store lock is poisoned.
    pub fn contact_messages(&self) -> Result<Vec<ContactMessage>, BackendError> {
        Ok(self.read()?.contact_messages.clone())
    }

    /// Whether an email is on the newsletter list.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Internal` if the store lock is poisoned.
    pub fn is_subscribed(&self, email: &Email) -> Result<bool, BackendError> {
        Ok(self.read()?.newsletter.contains(email))
    }

    fn create_user(
        &self,
        email: &Email,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<AuthUser, BackendError> {
        // Hash before taking the lock.
        let password_hash = hash_password(password)?;

        let mut tables = self.write()?;
        if tables.emails.contains_key(email) {
            return Err(BackendError::Conflict(format!(
                "user already registered: {email}"
            )));
        }

        let user = AuthUser {
            id: UserId::generate(),
            email: email.clone(),
            full_name: metadata.full_name.clone(),
            phone: metadata.phone.clone(),
        };
        tables.emails.insert(email.clone(), user.id);
        tables.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash,
            },
        );
        Ok(user)
    }

    fn issue_token(&self, user: AuthUser) -> Result<AuthSession, BackendError> {
        let token = generate_token();
        self.write()?.tokens.insert(token.clone(), user.id);
        Ok(AuthSession {
            user,
            access_token: AccessToken::new(token),
        })
    }
}

#[async_trait]
impl DataService for MemoryBackend {
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        Ok(self.read()?.products.iter().rev().cloned().collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, BackendError> {
        Ok(self
            .read()?
            .products
            .iter()
            .find(|product| product.id == id)
            .cloned())
    }

    async fn insert_product(
        &self,
        product: &NewProduct,
        _token: Option<&AccessToken>,
    ) -> Result<Product, BackendError> {
        self.seed_product(product.clone())
    }

    async fn insert_order(
        &self,
        order: &Order,
        _token: Option<&AccessToken>,
    ) -> Result<(), BackendError> {
        let mut tables = self.write()?;
        if tables
            .orders
            .iter()
            .any(|existing| existing.order_number == order.order_number)
        {
            return Err(BackendError::Conflict(format!(
                "order number already used: {}",
                order.order_number
            )));
        }
        tables.orders.push(order.clone());
        Ok(())
    }

    async fn orders_for_user(
        &self,
        user_id: UserId,
        _token: Option<&AccessToken>,
    ) -> Result<Vec<Order>, BackendError> {
        let mut orders: Vec<Order> = self
            .read()?
            .orders
            .iter()
            .filter(|order| order.user_id == Some(user_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn get_profile(
        &self,
        user_id: UserId,
        _token: Option<&AccessToken>,
    ) -> Result<Option<Profile>, BackendError> {
        Ok(self.read()?.profiles.get(&user_id).cloned())
    }

    async fn upsert_profile(
        &self,
        profile: &Profile,
        _token: Option<&AccessToken>,
    ) -> Result<(), BackendError> {
        self.write()?.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn set_profile_role(&self, email: &Email, role: UserRole) -> Result<bool, BackendError> {
        let mut tables = self.write()?;
        let Some(profile) = tables
            .profiles
            .values_mut()
            .find(|profile| &profile.email == email)
        else {
            return Ok(false);
        };
        profile.role = role;
        Ok(true)
    }

    async fn subscribe_newsletter(&self, email: &Email) -> Result<(), BackendError> {
        if self.write()?.newsletter.insert(email.clone()) {
            Ok(())
        } else {
            Err(BackendError::Conflict(format!("already subscribed: {email}")))
        }
    }

    async fn insert_contact_message(&self, message: &ContactMessage) -> Result<(), BackendError> {
        self.write()?.contact_messages.push(message.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.read().map(|_| ())
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<AuthSession, BackendError> {
        let user = self.create_user(email, password, metadata)?;
        self.issue_token(user)
    }

    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthSession, BackendError> {
        let (user, password_hash) = {
            let tables = self.read()?;
            let stored = tables
                .emails
                .get(email)
                .and_then(|id| tables.users.get(id))
                .ok_or(BackendError::InvalidCredentials)?;
            (stored.user.clone(), stored.password_hash.clone())
        };

        verify_password(password, &password_hash)?;
        self.issue_token(user)
    }

    async fn sign_out(&self, token: &AccessToken) -> Result<(), BackendError> {
        self.write()?.tokens.remove(token.expose());
        Ok(())
    }

    async fn get_user(&self, token: &AccessToken) -> Result<Option<AuthUser>, BackendError> {
        let tables = self.read()?;
        Ok(tables
            .tokens
            .get(token.expose())
            .and_then(|id| tables.users.get(id))
            .map(|stored| stored.user.clone()))
    }
}

/// Product ids follow the millisecond clock, bumped to stay unique.
fn next_product_id(tables: &mut Tables) -> ProductId {
    let now = chrono::Utc::now().timestamp_millis();
    let id = now.max(tables.last_product_id + 1);
    tables.last_product_id = id;
    ProductId::new(id)
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, BackendError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| BackendError::Internal("password hashing failed".to_string()))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), BackendError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| BackendError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| BackendError::InvalidCredentials)
}
