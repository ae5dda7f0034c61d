//! REST collaborator client.
//!
//! Every HTTP call the backend offers goes through here: auth, the user
//! roster, message history, and the send endpoint. The backend's HTTP-only
//! auth cookie lives in the reqwest cookie jar, so a successful login
//! authenticates every later call on the same client.
//!
//! Responses use the backend's `{"data": …}` envelope; errors carry a
//! `message` (or `error`) field that is surfaced verbatim in
//! [`RequestError::Status`] for the UI banner.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use causerie_shared::error::{AuthError, RequestError, Result};
use causerie_shared::types::{Message, User, UserId};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> std::result::Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| RequestError::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a response to its body, turning 401 into [`AuthError`] and any
    /// other non-success status into [`RequestError::Status`] with the
    /// backend's message.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized.into());
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message.or(body.error))
            .unwrap_or_else(|| status.to_string());

        Err(RequestError::Status {
            status: status.as_u16(),
            message,
        }
        .into())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| RequestError::Http(e.to_string()))?;

        Self::check(response)
            .await?
            .json::<T>()
            .await
            .map_err(|e| RequestError::Decode(e.to_string()).into())
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| RequestError::Http(e.to_string()))?;

        Self::check(response)
            .await?
            .json::<T>()
            .await
            .map_err(|e| RequestError::Decode(e.to_string()).into())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let envelope: Envelope<User> = self
            .post_json(
                "/auth/login",
                &json!({ "email": email, "password": password }),
            )
            .await?;

        info!(user = %envelope.data.id, "Logged in");
        Ok(envelope.data)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let envelope: Envelope<User> = self
            .post_json(
                "/auth/register",
                &json!({ "name": name, "email": email, "password": password }),
            )
            .await?;

        info!(user = %envelope.data.id, "Registered");
        Ok(envelope.data)
    }

    pub async fn logout(&self) -> Result<()> {
        let response = self
            .http
            .get(self.url("/auth/logout"))
            .send()
            .await
            .map_err(|e| RequestError::Http(e.to_string()))?;

        Self::check(response).await?;
        info!("Logged out");
        Ok(())
    }

    /// The currently authenticated user, per the auth cookie.
    pub async fn current_user(&self) -> Result<User> {
        let envelope: Envelope<User> = self.get_json("/auth/me").await?;
        Ok(envelope.data)
    }

    /// Short-lived token that authenticates the real-time session. Kept in
    /// memory only, never persisted.
    pub async fn socket_token(&self) -> Result<String> {
        let response: TokenResponse = self.get_json("/auth/token").await?;
        Ok(response.token)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let envelope: Envelope<Vec<User>> = self.get_json("/users/list").await?;
        debug!(count = envelope.data.len(), "Fetched user roster");
        Ok(envelope.data)
    }

    /// Message history with one peer, oldest first, as the backend stores it.
    pub async fn message_history(&self, peer: &UserId) -> Result<Vec<Message>> {
        let envelope: Envelope<Vec<Message>> =
            self.get_json(&format!("/messages/{peer}")).await?;
        debug!(peer = %peer, count = envelope.data.len(), "Fetched history");
        Ok(envelope.data)
    }

    /// Send a message. The stored message is not returned here; it arrives
    /// via the `message:sent` echo on the real-time session.
    pub async fn send_message(&self, receiver: &UserId, content: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_json(
                "/messages/send",
                &json!({ "receiverId": receiver, "content": content }),
            )
            .await?;

        debug!(receiver = %receiver, "Message posted");
        Ok(())
    }
}
