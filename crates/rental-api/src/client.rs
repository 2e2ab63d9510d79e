//! reqwest client for the rental listing API.

use crate::error::{ApiError, ApiResult};
use crate::models::{AuthSession, FavoriteListing, User};
use crate::traits::{AuthApi, FavoritesApi, ProfileApi};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";
const REFRESH_FAILED: &str = "Failed to refresh token";
const CURRENT_USER_FAILED: &str = "Failed to fetch current user";
const PROFILE_FAILED: &str = "Failed to fetch profile";
const FAVORITES_FAILED: &str = "Failed to update favorites";

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_connect() || e.is_timeout() {
        ApiError::NetworkUnavailable
    } else {
        ApiError::Http(e)
    }
}

/// Server-provided failure text: `error`, then `message`, then `fallback`.
fn failure_message(body: &Value, fallback: &str) -> String {
    ["error", "message"]
        .iter()
        .filter_map(|field| body.get(field).and_then(Value::as_str))
        .find(|message| !message.trim().is_empty())
        .unwrap_or(fallback)
        .to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthPayload {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

impl AuthPayload {
    fn into_session(self) -> Option<AuthSession> {
        let access_token = self
            .access_token
            .or(self.token)
            .filter(|token| !token.is_empty())?;
        Some(AuthSession {
            access_token,
            refresh_token: self.refresh_token.filter(|token| !token.is_empty()),
            user: self.user,
        })
    }
}

/// Login and register answer with top-level tokens; refresh nests them under
/// `data` and may call the access token `token`. Both shapes are accepted.
#[derive(Debug, Deserialize)]
struct AuthEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<AuthPayload>,
    #[serde(flatten)]
    top_level: AuthPayload,
}

fn parse_auth_session(body: Value, fallback: &str) -> ApiResult<AuthSession> {
    let message = failure_message(&body, fallback);
    let envelope: AuthEnvelope =
        serde_json::from_value(body).map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

    if !envelope.success {
        return Err(ApiError::Rejected {
            status: None,
            message,
        });
    }

    envelope
        .data
        .and_then(AuthPayload::into_session)
        .or_else(|| envelope.top_level.into_session())
        .ok_or_else(|| ApiError::MalformedResponse("missing access token".to_string()))
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Option<User>,
}

fn parse_user(body: Value, fallback: &str) -> ApiResult<User> {
    let message = failure_message(&body, fallback);
    let envelope: UserEnvelope =
        serde_json::from_value(body).map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

    if envelope.success == Some(false) {
        return Err(ApiError::Rejected {
            status: None,
            message,
        });
    }
    envelope
        .data
        .ok_or_else(|| ApiError::MalformedResponse("missing user record".to_string()))
}

/// Favorites listing envelope.
///
/// `{ "data": [...] }` is canonical. The nested `{ "data": { "favorites": [...] } }`
/// and bare-array shapes are older server versions, accepted for compatibility.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FavoritesEnvelope {
    Canonical { data: Vec<FavoriteListing> },
    Nested { data: NestedFavorites },
    Bare(Vec<FavoriteListing>),
}

#[derive(Debug, Deserialize)]
struct NestedFavorites {
    #[serde(default)]
    favorites: Vec<FavoriteListing>,
}

fn parse_favorites(body: Value) -> ApiResult<Vec<FavoriteListing>> {
    if body.is_null() {
        debug!("Empty favorites response");
        return Ok(Vec::new());
    }
    let envelope: FavoritesEnvelope = serde_json::from_value(body)
        .map_err(|_| ApiError::MalformedResponse("unrecognised favorites envelope".to_string()))?;
    Ok(match envelope {
        FavoritesEnvelope::Canonical { data } => data,
        FavoritesEnvelope::Nested { data } => {
            debug!("Favorites returned in legacy nested envelope");
            data.favorites
        }
        FavoritesEnvelope::Bare(listings) => {
            debug!("Favorites returned as a bare array");
            listings
        }
    })
}

/// HTTP client for the rental API.
#[derive(Clone)]
pub struct RentalApiClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl RentalApiClient {
    /// Create a client with its own connection pool and request timeout.
    pub fn new(base_url: Url, timeout: Duration) -> ApiResult<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_http_client(base_url, http_client)
    }

    /// Create a client around an existing reqwest client.
    pub fn with_http_client(base_url: Url, http_client: reqwest::Client) -> ApiResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            ));
        }
        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL below the base URL. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn favorite_endpoint(&self, user_id: &str, listing_id: &str) -> Url {
        self.endpoint(&["api", "users", user_id, "favorites", listing_id])
    }

    /// Send a request and return its JSON body (`Null` when empty).
    ///
    /// Non-2xx answers become [`ApiError::Rejected`] carrying the server's
    /// message. Bodies are only ever logged as a length and digest.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
        fallback: &str,
    ) -> ApiResult<Value> {
        let response = request.send().await.map_err(|e| {
            warn!(operation, error = %e, "Request failed before a response arrived");
            transport_error(e)
        })?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let body_summary = summarize_response_body(&body);
            let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            warn!(operation, status = %status, body_summary = %body_summary, "Request rejected");
            return Err(ApiError::Rejected {
                status: Some(status.as_u16()),
                message: failure_message(&parsed, fallback),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| {
            let body_summary = summarize_response_body(&body);
            warn!(operation, body_summary = %body_summary, "Response is not JSON");
            ApiError::MalformedResponse(format!("{}: {}", operation, e))
        })
    }

    fn bearer(request: reqwest::RequestBuilder, access_token: &str) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bearer {}", access_token))
    }
}

#[async_trait]
impl AuthApi for RentalApiClient {
    async fn login(&self, email: &str, password: &str) -> ApiResult<AuthSession> {
        debug!("Logging in");
        let request = self
            .http_client
            .post(self.endpoint(&["api", "auth", "login"]))
            .json(&serde_json::json!({ "email": email, "password": password }));
        let body = self.execute(request, "login", LOGIN_FAILED).await?;
        parse_auth_session(body, LOGIN_FAILED)
    }

    async fn register(&self, name: &str, email: &str, password: &str) -> ApiResult<AuthSession> {
        debug!("Registering account");
        let request = self
            .http_client
            .post(self.endpoint(&["api", "auth", "register"]))
            .json(&serde_json::json!({ "name": name, "email": email, "password": password }));
        let body = self.execute(request, "register", REGISTRATION_FAILED).await?;
        parse_auth_session(body, REGISTRATION_FAILED)
    }

    async fn current_user(&self, access_token: &str) -> ApiResult<User> {
        let request = Self::bearer(
            self.http_client.get(self.endpoint(&["api", "auth", "me"])),
            access_token,
        );
        let body = self.execute(request, "current_user", CURRENT_USER_FAILED).await?;
        parse_user(body, CURRENT_USER_FAILED)
    }

    async fn logout(&self, access_token: &str) -> ApiResult<()> {
        let request = Self::bearer(
            self.http_client.post(self.endpoint(&["api", "auth", "logout"])),
            access_token,
        )
        .json(&serde_json::json!({}));
        self.execute(request, "logout", "Logout failed").await?;
        info!("Remote session closed");
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> ApiResult<AuthSession> {
        debug!("Refreshing access token");
        let request = self
            .http_client
            .post(self.endpoint(&["api", "auth", "refresh"]))
            .json(&serde_json::json!({ "refreshToken": refresh_token }));
        let body = self.execute(request, "refresh", REFRESH_FAILED).await?;
        parse_auth_session(body, REFRESH_FAILED)
    }
}

#[async_trait]
impl FavoritesApi for RentalApiClient {
    async fn get_favorites(&self, user_id: &str, access_token: &str) -> ApiResult<Vec<FavoriteListing>> {
        let request = Self::bearer(
            self.http_client
                .get(self.endpoint(&["api", "users", user_id, "favorites"])),
            access_token,
        );
        let body = self.execute(request, "get_favorites", FAVORITES_FAILED).await?;
        let favorites = parse_favorites(body)?;
        debug!(count = favorites.len(), "Fetched favorites");
        Ok(favorites)
    }

    async fn add_favorite(&self, user_id: &str, listing_id: &str, access_token: &str) -> ApiResult<()> {
        let request = Self::bearer(
            self.http_client.post(self.favorite_endpoint(user_id, listing_id)),
            access_token,
        )
        .json(&serde_json::json!({}));
        self.execute(request, "add_favorite", FAVORITES_FAILED).await?;
        Ok(())
    }

    async fn remove_favorite(&self, user_id: &str, listing_id: &str, access_token: &str) -> ApiResult<()> {
        let request = Self::bearer(
            self.http_client.delete(self.favorite_endpoint(user_id, listing_id)),
            access_token,
        );
        self.execute(request, "remove_favorite", FAVORITES_FAILED).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileApi for RentalApiClient {
    async fn get_user_profile(&self, user_id: &str, access_token: &str) -> ApiResult<User> {
        let request = Self::bearer(
            self.http_client.get(self.endpoint(&["api", "users", user_id])),
            access_token,
        );
        let body = self.execute(request, "get_user_profile", PROFILE_FAILED).await?;
        parse_user(body, PROFILE_FAILED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn test_client(base: &str) -> RentalApiClient {
        let http_client = reqwest::Client::builder().no_proxy().build().unwrap();
        RentalApiClient::with_http_client(Url::parse(base).unwrap(), http_client).unwrap()
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let content_length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Serve one canned response; the join handle yields the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            request
        });
        (format!("http://{}/", addr), handle)
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes_segments() {
        let client = test_client("https://api.rental.test/v1/");
        assert_eq!(
            client.favorite_endpoint("u 1", "L1").as_str(),
            "https://api.rental.test/v1/api/users/u%201/favorites/L1"
        );

        let client = test_client("https://api.rental.test");
        assert_eq!(
            client.endpoint(&["api", "auth", "me"]).as_str(),
            "https://api.rental.test/api/auth/me"
        );
    }

    #[test]
    fn test_rejects_cannot_be_a_base_url() {
        let result =
            RentalApiClient::new(Url::parse("mailto:team@rental.app").unwrap(), Duration::from_secs(1));
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_summarize_response_body_hides_content() {
        let summary = summarize_response_body(r#"{"accessToken":"secret"}"#);
        assert!(summary.starts_with("len=24,digest="));
        assert!(!summary.contains("secret"));
    }

    #[test]
    fn test_failure_message_precedence() {
        assert_eq!(
            failure_message(&json!({"error": "Bad password", "message": "nope"}), "Login failed"),
            "Bad password"
        );
        assert_eq!(failure_message(&json!({"message": "Locked"}), "Login failed"), "Locked");
        assert_eq!(failure_message(&json!({"error": ""}), "Login failed"), "Login failed");
        assert_eq!(failure_message(&Value::Null, "Login failed"), "Login failed");
    }

    #[test]
    fn test_parse_auth_session_top_level() {
        let session = parse_auth_session(
            json!({
                "success": true,
                "accessToken": "T1",
                "refreshToken": "R1",
                "user": {"id": "u1", "favorites": []}
            }),
            LOGIN_FAILED,
        )
        .unwrap();
        assert_eq!(session.access_token, "T1");
        assert_eq!(session.refresh_token.as_deref(), Some("R1"));
        assert_eq!(session.user.unwrap().id, "u1");
    }

    #[test]
    fn test_parse_auth_session_nested_refresh_shape() {
        let session = parse_auth_session(
            json!({
                "success": true,
                "data": {"token": "T2", "refreshToken": "R2", "user": {"id": "u1"}}
            }),
            REFRESH_FAILED,
        )
        .unwrap();
        assert_eq!(session.access_token, "T2");
        assert_eq!(session.refresh_token.as_deref(), Some("R2"));
    }

    #[test]
    fn test_parse_auth_session_without_refresh_token() {
        let session = parse_auth_session(
            json!({"success": true, "data": {"accessToken": "T1", "user": {"id": "u1", "favorites": []}}}),
            LOGIN_FAILED,
        )
        .unwrap();
        assert_eq!(session.access_token, "T1");
        assert_eq!(session.refresh_token, None);
    }

    #[test]
    fn test_parse_auth_session_unsuccessful() {
        let err = parse_auth_session(json!({"success": false}), REGISTRATION_FAILED).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Rejected { status: None, ref message } if message == REGISTRATION_FAILED
        ));
    }

    #[test]
    fn test_parse_auth_session_missing_token() {
        let err = parse_auth_session(json!({"success": true, "user": {"id": "u1"}}), LOGIN_FAILED)
            .unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_user() {
        let user = parse_user(json!({"success": true, "data": {"id": "u1"}}), CURRENT_USER_FAILED).unwrap();
        assert_eq!(user.id, "u1");

        let err = parse_user(json!({"success": true}), CURRENT_USER_FAILED).unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));

        let err = parse_user(json!({"success": false, "message": "gone"}), CURRENT_USER_FAILED)
            .unwrap_err();
        assert_eq!(err.user_message(CURRENT_USER_FAILED), "gone");
    }

    #[test]
    fn test_parse_favorites_envelopes() {
        let item = json!({"id": "L1", "title": "Loft", "location": "Porto", "price": 90, "image": "l.jpg"});

        let canonical = parse_favorites(json!({ "data": [item.clone()] })).unwrap();
        let nested = parse_favorites(json!({ "data": { "favorites": [item.clone()] } })).unwrap();
        let bare = parse_favorites(json!([item])).unwrap();

        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical, nested);
        assert_eq!(canonical, bare);
        assert!(parse_favorites(Value::Null).unwrap().is_empty());
        assert!(matches!(
            parse_favorites(json!({"data": "nope"})),
            Err(ApiError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = test_client(&format!("http://{}/", addr));
        let err = client.login("a@b.com", "pw").await.unwrap_err();
        assert!(err.is_network());
        assert_eq!(err.user_message(LOGIN_FAILED), crate::NETWORK_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_login_posts_credentials() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"success":true,"accessToken":"T1","refreshToken":"R1","user":{"id":"u1","favorites":[]}}"#,
        )
        .await;

        let session = test_client(&base).login("a@b.com", "pw").await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /api/auth/login HTTP/1.1"));
        assert!(request.contains(r#""email":"a@b.com""#));
        assert_eq!(session.access_token, "T1");
    }

    #[tokio::test]
    async fn test_login_rejection_carries_server_message() {
        let (base, server) = serve_once("401 Unauthorized", r#"{"error":"Invalid credentials"}"#).await;

        let err = test_client(&base).login("a@b.com", "bad").await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(
            err,
            ApiError::Rejected { status: Some(401), ref message } if message == "Invalid credentials"
        ));
    }

    #[tokio::test]
    async fn test_remove_favorite_sends_bearer_token() {
        let (base, server) = serve_once("200 OK", "").await;

        test_client(&base)
            .remove_favorite("u1", "L1", "T1")
            .await
            .unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("DELETE /api/users/u1/favorites/L1 HTTP/1.1"));
        assert!(request.to_lowercase().contains("authorization: bearer t1"));
    }
}
