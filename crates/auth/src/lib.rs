//! Auth client for FridgeFriend
//!
//! Password sign up / sign in, session management, and user lookup
//! against the hosted auth REST API (`{url}/auth/v1/*`).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing session")]
    MissingSession,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl User {
    /// The part of the email address before `@`
    pub fn email_local_part(&self) -> Option<&str> {
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|local| !local.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub token_type: String,
    pub user: User,
}

/// Result of a sign up: projects with email confirmation enabled return
/// only the user until the address is confirmed.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationRequired(User),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

#[derive(Serialize)]
struct PasswordCredentials<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
}

pub struct Auth {
    url: String,
    key: String,
    http_client: Client,
    current_session: Arc<RwLock<Option<Session>>>,
    events: broadcast::Sender<AuthChangeEvent>,
}

impl Auth {
    pub fn new(url: &str, key: &str, http_client: Client) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http_client,
            current_session: Arc::new(RwLock::new(None)),
            events,
        }
    }

    /// Subscribes to sign in / sign out / refresh notifications
    pub fn on_auth_state_change(&self) -> broadcast::Receiver<AuthChangeEvent> {
        self.events.subscribe()
    }

    /// Registers a new account. `phone` is stored on the auth user when given.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        phone: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        let url = format!("{}/auth/v1/signup", self.url);
        let payload = PasswordCredentials {
            email,
            password,
            phone: phone.filter(|p| !p.trim().is_empty()),
        };

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        let body: serde_json::Value = response.json().await?;
        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            self.store_session(session.clone(), AuthChangeEvent::SignedIn)
                .await;
            Ok(SignUpOutcome::SignedIn(session))
        } else {
            // Some deployments wrap the user, others return it bare.
            let user_value = body.get("user").cloned().unwrap_or(body);
            let user: User = serde_json::from_value(user_value)?;
            log::info!("sign up for {} awaits email confirmation", user.id);
            Ok(SignUpOutcome::ConfirmationRequired(user))
        }
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.url);
        let payload = PasswordCredentials {
            email,
            password,
            phone: None,
        };

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        let session: Session = response.json().await?;
        self.store_session(session.clone(), AuthChangeEvent::SignedIn)
            .await;

        Ok(session)
    }

    pub async fn get_session(&self) -> Option<Session> {
        self.current_session.read().await.clone()
    }

    /// Restores a previously obtained session
    pub async fn set_session(&self, session: Session) {
        self.store_session(session, AuthChangeEvent::SignedIn).await;
    }

    /// Fetches the user behind the current access token
    pub async fn get_user(&self) -> Result<User, AuthError> {
        let session = self.get_session().await.ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/user", self.url);

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        Ok(response.json().await?)
    }

    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let session = self.get_session().await.ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.url);
        let payload = serde_json::json!({
            "refresh_token": session.refresh_token,
        });

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        let new_session: Session = response.json().await?;
        self.store_session(new_session.clone(), AuthChangeEvent::TokenRefreshed)
            .await;

        Ok(new_session)
    }

    /// Revokes the session remotely and clears it locally
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.get_session().await.ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/logout", self.url);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        *self.current_session.write().await = None;
        let _ = self.events.send(AuthChangeEvent::SignedOut);

        Ok(())
    }

    async fn store_session(&self, session: Session, event: AuthChangeEvent) {
        *self.current_session.write().await = Some(session);
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_local_part() {
        let user = User {
            id: "u1".to_string(),
            email: Some("sam.jones@example.com".to_string()),
            phone: None,
            user_metadata: serde_json::Value::Null,
            created_at: None,
        };
        assert_eq!(user.email_local_part(), Some("sam.jones"));

        let no_email = User { email: None, ..user };
        assert_eq!(no_email.email_local_part(), None);
    }
}
