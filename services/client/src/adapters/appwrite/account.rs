//! services/client/src/adapters/appwrite/account.rs
//!
//! `AccountService` implementation: account creation, email sessions and avatars.

use super::{AppwriteAdapter, FALLBACK_COOKIES_HEADER, UNIQUE_ID};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use sora_core::domain::{Account, Session, SessionToken};
use sora_core::ports::{AccountService, PortError, PortResult};
use std::collections::HashMap;
use tracing::debug;

//=========================================================================================
// Remote Record Structs
//=========================================================================================

#[derive(Deserialize)]
struct AccountRecord {
    #[serde(rename = "$id")]
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
}
impl AccountRecord {
    fn to_domain(self) -> Account {
        Account {
            id: self.id,
            email: self.email,
            name: self.name,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    #[serde(rename = "$id")]
    id: String,
    user_id: String,
    #[serde(default)]
    expire: Option<DateTime<Utc>>,
    /// Only filled in for server-side callers; clients get it via fallback cookies.
    #[serde(default)]
    secret: String,
}

impl AppwriteAdapter {
    /// Extracts the session secret from the `X-Fallback-Cookies` header value,
    /// a JSON object keyed by `a_session_<project>`.
    pub(crate) fn secret_from_fallback_cookies(&self, raw: &str) -> Option<String> {
        let cookies: HashMap<String, String> = serde_json::from_str(raw).ok()?;
        let key = format!("a_session_{}", self.config.project_id);
        cookies.get(&key).filter(|s| !s.is_empty()).cloned()
    }
}

//=========================================================================================
// `AccountService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountService for AppwriteAdapter {
    async fn create_account(&self, email: &str, password: &str, name: &str) -> PortResult<Account> {
        let url = self.url(&["account"])?;
        let body = serde_json::json!({
            "userId": UNIQUE_ID,
            "email": email,
            "password": password,
            "name": name,
        });

        let record: AccountRecord = self
            .send(self.request(Method::POST, url, None).json(&body))
            .await?;
        Ok(record.to_domain())
    }

    async fn create_email_session(&self, email: &str, password: &str) -> PortResult<Session> {
        let url = self.url(&["account", "sessions", "email"])?;
        let body = serde_json::json!({
            "email": email,
            "password": password,
        });

        let response = self
            .execute(self.request(Method::POST, url, None).json(&body))
            .await?;

        // Read the header before the body consumes the response.
        let fallback = response
            .headers()
            .get(FALLBACK_COOKIES_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let record: SessionRecord = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to parse session: {}", e)))?;

        let secret = if record.secret.is_empty() {
            fallback
                .as_deref()
                .and_then(|raw| self.secret_from_fallback_cookies(raw))
                .ok_or_else(|| {
                    PortError::Unexpected("Session response carried no secret".to_string())
                })?
        } else {
            record.secret
        };
        debug!("Created session {} for account {}", record.id, record.user_id);

        Ok(Session {
            id: record.id,
            account_id: record.user_id,
            expires_at: record.expire,
            token: SessionToken::new(secret),
        })
    }

    async fn get_account(&self, token: &SessionToken) -> PortResult<Account> {
        let url = self.url(&["account"])?;
        let record: AccountRecord = self
            .send(self.request(Method::GET, url, Some(token)))
            .await?;
        Ok(record.to_domain())
    }

    async fn delete_session(&self, token: &SessionToken) -> PortResult<()> {
        let url = self.url(&["account", "sessions", "current"])?;
        self.execute(self.request(Method::DELETE, url, Some(token)))
            .await?;
        Ok(())
    }

    fn avatar_url(&self, name: &str) -> PortResult<String> {
        self.public_url(&["avatars", "initials"], &[("name", name.to_string())])
    }
}
