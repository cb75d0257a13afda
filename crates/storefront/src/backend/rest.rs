//! Supabase-compatible Remote Data Service client.
//!
//! Tables are reached through `PostgREST` (`/rest/v1/<table>`) and accounts
//! through `GoTrue` (`/auth/v1`). Every request carries the project key in
//! the `apikey` header and a bearer token: the user's access token when one
//! is given, the project key otherwise.
//!
//! The product listing is cached with `moka` (5-minute TTL) and invalidated
//! whenever a product is inserted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use uuid::Uuid;

use district_vinyl_core::{Email, NewProduct, Order, Product, ProductId, UserId, UserRole};

use super::{
    AccessToken, AuthProvider, AuthSession, AuthUser, BackendError, ContactMessage, DataService,
    Profile, SignUpMetadata,
};

const PRODUCTS_CACHE_KEY: &str = "products:all";

/// Client for a Supabase-compatible backend.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestBackendInner>,
}

struct RestBackendInner {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    products: Cache<&'static str, Arc<Vec<Product>>>,
}

impl RestBackend {
    /// Create a client for the service at `base_url`.
    ///
    /// `api_key` is the anon key for the storefront or the service key for
    /// operator tooling.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` if the HTTP client fails to build.
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("district-vinyl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let products = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(RestBackendInner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
                products,
            }),
        })
    }

    /// Build a request with the key and bearer headers set.
    fn request(&self, method: Method, path: &str, token: Option<&AccessToken>) -> RequestBuilder {
        let key = self.inner.api_key.expose_secret();
        let bearer = token.map_or(key, AccessToken::expose);

        self.inner
            .client
            .request(method, format!("{}{path}", self.inner.base_url))
            .header("apikey", key)
            .bearer_auth(bearer)
    }

    /// Insert one row into a table and return the stored representation.
    async fn insert<T, R>(
        &self,
        table: &str,
        row: &T,
        token: Option<&AccessToken>,
    ) -> Result<Vec<R>, BackendError>
    where
        T: serde::Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .request(Method::POST, &format!("/rest/v1/{table}"), token)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;

        decode(check(response).await?).await
    }

    /// Insert one row without reading it back.
    async fn insert_minimal<T>(
        &self,
        table: &str,
        row: &T,
        token: Option<&AccessToken>,
    ) -> Result<(), BackendError>
    where
        T: serde::Serialize + Sync + ?Sized,
    {
        let response = self
            .request(Method::POST, &format!("/rest/v1/{table}"), token)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;

        check(response).await.map(|_| ())
    }

    /// Select rows from a table with a raw `PostgREST` query string.
    async fn select<R>(
        &self,
        table: &str,
        query: &str,
        token: Option<&AccessToken>,
    ) -> Result<Vec<R>, BackendError>
    where
        R: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, &format!("/rest/v1/{table}?{query}"), token)
            .send()
            .await?;

        decode(check(response).await?).await
    }

    /// Drop the cached product listing.
    pub async fn invalidate_products(&self) {
        self.inner.products.invalidate(PRODUCTS_CACHE_KEY).await;
    }
}

#[async_trait]
impl DataService for RestBackend {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        if let Some(products) = self.inner.products.get(PRODUCTS_CACHE_KEY).await {
            debug!("Cache hit for products");
            return Ok(products.as_ref().clone());
        }

        let products: Vec<Product> = self
            .select("products", "select=*&order=id.desc", None)
            .await?;

        self.inner
            .products
            .insert(PRODUCTS_CACHE_KEY, Arc::new(products.clone()))
            .await;

        Ok(products)
    }

    /// Served from the cached listing when it has the product. A miss still
    /// asks the service, since other writers do not invalidate this cache.
    #[instrument(skip(self), fields(product_id = %id))]
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, BackendError> {
        if let Some(products) = self.inner.products.get(PRODUCTS_CACHE_KEY).await
            && let Some(product) = products.iter().find(|product| product.id == id)
        {
            debug!("Cache hit for product");
            return Ok(Some(product.clone()));
        }

        let rows: Vec<Product> = self
            .select("products", &format!("select=*&id=eq.{id}&limit=1"), None)
            .await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, product, token), fields(name = %product.name()))]
    async fn insert_product(
        &self,
        product: &NewProduct,
        token: Option<&AccessToken>,
    ) -> Result<Product, BackendError> {
        let rows: Vec<Product> = self.insert("products", product, token).await?;
        self.invalidate_products().await;

        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Parse("insert returned no product row".to_string()))
    }

    #[instrument(skip(self, order, token), fields(order_number = %order.order_number))]
    async fn insert_order(
        &self,
        order: &Order,
        token: Option<&AccessToken>,
    ) -> Result<(), BackendError> {
        self.insert_minimal("orders", order, token).await
    }

    #[instrument(skip(self, token), fields(user_id = %user_id))]
    async fn orders_for_user(
        &self,
        user_id: UserId,
        token: Option<&AccessToken>,
    ) -> Result<Vec<Order>, BackendError> {
        self.select(
            "orders",
            &format!("select=*&user_id=eq.{user_id}&order=created_at.desc"),
            token,
        )
        .await
    }

    #[instrument(skip(self, token), fields(user_id = %user_id))]
    async fn get_profile(
        &self,
        user_id: UserId,
        token: Option<&AccessToken>,
    ) -> Result<Option<Profile>, BackendError> {
        let rows: Vec<Profile> = self
            .select(
                "profiles",
                &format!("select=*&id=eq.{user_id}&limit=1"),
                token,
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, profile, token), fields(user_id = %profile.id))]
    async fn upsert_profile(
        &self,
        profile: &Profile,
        token: Option<&AccessToken>,
    ) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, "/rest/v1/profiles", token)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(profile)
            .send()
            .await?;

        check(response).await.map(|_| ())
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn set_profile_role(&self, email: &Email, role: UserRole) -> Result<bool, BackendError> {
        let path = format!(
            "/rest/v1/profiles?email=eq.{}",
            urlencoding::encode(email.as_str())
        );
        let response = self
            .request(Method::PATCH, &path, None)
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "role": role }))
            .send()
            .await?;

        let rows: Vec<Profile> = decode(check(response).await?).await?;
        Ok(!rows.is_empty())
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn subscribe_newsletter(&self, email: &Email) -> Result<(), BackendError> {
        self.insert_minimal("newsletter", &serde_json::json!({ "email": email }), None)
            .await
    }

    #[instrument(skip(self, message), fields(email = %message.email))]
    async fn insert_contact_message(&self, message: &ContactMessage) -> Result<(), BackendError> {
        self.insert_minimal("contact_messages", message, None).await
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let response = self
            .request(Method::GET, "/auth/v1/health", None)
            .send()
            .await?;
        check(response).await.map(|_| ())
    }
}

#[async_trait]
impl AuthProvider for RestBackend {
    #[instrument(skip(self, password, metadata), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<AuthSession, BackendError> {
        let response = self
            .request(Method::POST, "/auth/v1/signup", None)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::BAD_REQUEST {
            let message = response.text().await.unwrap_or_default();
            let lower = message.to_lowercase();
            if lower.contains("already registered") || lower.contains("already exists") {
                return Err(BackendError::Conflict(message));
            }
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GoTrueSession = decode(check(response).await?).await?;
        body.into_session().ok_or(BackendError::NoSession)
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthSession, BackendError> {
        let response = self
            .request(Method::POST, "/auth/v1/token?grant_type=password", None)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::BAD_REQUEST {
            let message = response.text().await.unwrap_or_default();
            if message.contains("invalid_grant") || message.contains("Invalid login credentials")
            {
                return Err(BackendError::InvalidCredentials);
            }
            return Err(BackendError::Api {
                status: StatusCode::BAD_REQUEST.as_u16(),
                message,
            });
        }

        let body: GoTrueSession = decode(check(response).await?).await?;
        body.into_session().ok_or(BackendError::NoSession)
    }

    #[instrument(skip(self, token))]
    async fn sign_out(&self, token: &AccessToken) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, "/auth/v1/logout", Some(token))
            .send()
            .await?;
        check(response).await.map(|_| ())
    }

    #[instrument(skip(self, token))]
    async fn get_user(&self, token: &AccessToken) -> Result<Option<AuthUser>, BackendError> {
        let response = self
            .request(Method::GET, "/auth/v1/user", Some(token))
            .send()
            .await?;

        match check(response).await {
            Ok(response) => {
                let user: GoTrueUser = decode(response).await?;
                user.into_auth_user().map(Some)
            }
            Err(BackendError::Unauthorized) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// Response helpers
// =============================================================================

/// Map non-success statuses to `BackendError`.
async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    let message: String = message.chars().take(500).collect();

    match status {
        StatusCode::CONFLICT => Err(BackendError::Conflict(message)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            debug!(status = %status, body = %message, "Backend rejected credentials");
            Err(BackendError::Unauthorized)
        }
        _ => {
            tracing::error!(
                status = %status,
                body = %message,
                "Backend returned non-success status"
            );
            Err(BackendError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Decode a JSON body, keeping the text for diagnostics.
async fn decode<R: DeserializeOwned>(response: Response) -> Result<R, BackendError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %text.chars().take(500).collect::<String>(),
            "Failed to parse backend response"
        );
        BackendError::Parse(e.to_string())
    })
}

// =============================================================================
// GoTrue wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: Option<String>,
    user: Option<GoTrueUser>,
}

impl GoTrueSession {
    fn into_session(self) -> Option<AuthSession> {
        let access_token = self.access_token?;
        let user = self.user?.into_auth_user().ok()?;
        Some(AuthSession {
            user,
            access_token: AccessToken::new(access_token),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: SignUpMetadata,
}

impl GoTrueUser {
    fn into_auth_user(self) -> Result<AuthUser, BackendError> {
        let email = self
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| BackendError::Parse(format!("invalid email from auth service: {e}")))?
            .ok_or_else(|| BackendError::Parse("auth user has no email".to_string()))?;

        Ok(AuthUser {
            id: UserId::new(self.id),
            email,
            full_name: self.user_metadata.full_name,
            phone: self.user_metadata.phone,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use axum::{
        Json, Router,
        extract::{Query, State},
        routing::get,
    };

    use super::*;

    type Rows = Arc<Mutex<Vec<serde_json::Value>>>;

    fn product_row(id: i64, name: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": name,
            "price": "24.00",
            "category": "Vinyl",
            "images": [format!("https://img.example/{id}.jpg")],
        })
    }

    async fn products_table(
        State(rows): State<Rows>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<Vec<serde_json::Value>> {
        let rows = rows.lock().unwrap().clone();
        let rows = match query.get("id").and_then(|id| id.strip_prefix("eq.")) {
            Some(id) => rows
                .into_iter()
                .filter(|row| row["id"].to_string() == id)
                .collect(),
            None => rows,
        };
        Json(rows)
    }

    /// Serve a `products` table on a local port.
    async fn spawn_products_service(rows: Rows) -> String {
        let app = Router::new()
            .route("/rest/v1/products", get(products_table))
            .with_state(rows);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_get_product_missing_from_cached_listing_asks_service() {
        let rows: Rows = Arc::new(Mutex::new(vec![product_row(1, "Blue Train")]));
        let base_url = spawn_products_service(Arc::clone(&rows)).await;
        let backend =
            RestBackend::new(&base_url, SecretString::from("anon-key".to_string())).unwrap();

        assert_eq!(backend.list_products().await.unwrap().len(), 1);

        // Written by another instance; this cache was never invalidated.
        rows.lock().unwrap().push(product_row(2, "Rumours"));

        let cached = backend.get_product(ProductId::new(1)).await.unwrap();
        assert_eq!(cached.unwrap().name, "Blue Train");

        let fresh = backend.get_product(ProductId::new(2)).await.unwrap();
        assert_eq!(fresh.unwrap().name, "Rumours");

        assert!(backend.get_product(ProductId::new(3)).await.unwrap().is_none());
    }

    #[test]
    fn test_go_true_session_with_token() {
        let json = r#"{
            "access_token": "tok",
            "token_type": "bearer",
            "user": {
                "id": "6f1c1f0e-8a3b-4d5e-9f00-123456789abc",
                "email": "Ana@Example.com",
                "user_metadata": {"full_name": "Ana", "phone": "070"}
            }
        }"#;
        let body: GoTrueSession = serde_json::from_str(json).unwrap();
        let session = body.into_session().unwrap();

        assert_eq!(session.access_token.expose(), "tok");
        assert_eq!(session.user.email.as_str(), "ana@example.com");
        assert_eq!(session.user.full_name.as_deref(), Some("Ana"));
        assert_eq!(session.user.phone.as_deref(), Some("070"));
    }

    #[test]
    fn test_go_true_session_without_token() {
        // Sign-up with email confirmation enabled returns the bare user.
        let json = r#"{"id": "6f1c1f0e-8a3b-4d5e-9f00-123456789abc", "email": "a@b.co"}"#;
        let body: GoTrueSession = serde_json::from_str(json).unwrap();
        assert!(body.into_session().is_none());
    }

    #[test]
    fn test_go_true_user_requires_email() {
        let user = GoTrueUser {
            id: Uuid::new_v4(),
            email: None,
            user_metadata: SignUpMetadata::default(),
        };
        assert!(matches!(
            user.into_auth_user(),
            Err(BackendError::Parse(_))
        ));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let backend =
            RestBackend::new("https://abc.supabase.co/", SecretString::from("key")).unwrap();
        assert_eq!(backend.inner.base_url, "https://abc.supabase.co");
    }
}
