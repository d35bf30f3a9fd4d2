//! services/client/src/state.rs
//!
//! Defines the application state owned by the composition root: the service
//! clients plus who is signed in.

use crate::config::Config;
use crate::content::ContentClient;
use crate::error::{ClientError, ClientResult};
use crate::identity::{IdentityClient, SignedIn};
use sora_core::domain::{Profile, ProfileLookup, SessionToken};
use sora_core::ports::{AccountService, DatabaseService, StorageService};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

//=========================================================================================
// AuthState (What the UI Renders From)
//=========================================================================================

/// Who is signed in, as last resolved against the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub is_logged_in: bool,
    pub token: Option<SessionToken>,
    pub user: Option<Profile>,
    /// True until the first `initialize` completes.
    pub loading: bool,
    /// Why the last resolution could not tell whether anyone is signed in.
    pub last_error: Option<String>,
}

impl AuthState {
    fn starting() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    fn signed_in(token: SessionToken, user: Profile) -> Self {
        Self {
            is_logged_in: true,
            token: Some(token),
            user: Some(user),
            loading: false,
            last_error: None,
        }
    }
}

//=========================================================================================
// AppState (Shared Across the Application)
//=========================================================================================

/// The shared application state, created once at startup and handed to every screen.
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: IdentityClient,
    pub content: ContentClient,
    auth: RwLock<AuthState>,
}

impl AppState {
    pub fn new(config: Arc<Config>, identity: IdentityClient, content: ContentClient) -> Self {
        Self {
            config,
            identity,
            content,
            auth: RwLock::new(AuthState::starting()),
        }
    }

    /// Wires both clients to a single backend implementing every port.
    pub fn with_backend<B>(config: Arc<Config>, backend: Arc<B>) -> Self
    where
        B: AccountService + DatabaseService + StorageService + 'static,
    {
        let identity = IdentityClient::new(backend.clone(), backend.clone());
        let content = ContentClient::new(backend.clone(), backend);
        Self::new(config, identity, content)
    }

    pub async fn snapshot(&self) -> AuthState {
        self.auth.read().await.clone()
    }

    pub async fn token(&self) -> Option<SessionToken> {
        self.auth.read().await.token.clone()
    }

    /// Resolves who is signed in, from a restored session token if any.
    pub async fn initialize(&self, token: Option<SessionToken>) -> AuthState {
        let lookup = self.identity.get_current_profile(token.as_ref()).await;

        let next = match lookup {
            ProfileLookup::Authenticated(profile) => match token {
                Some(token) => AuthState::signed_in(token, profile),
                None => AuthState::default(),
            },
            ProfileLookup::NotAuthenticated => AuthState::default(),
            // Keep the token: the session may still be valid once the backend is reachable.
            ProfileLookup::Unavailable(reason) => AuthState {
                token,
                last_error: Some(reason),
                ..AuthState::default()
            },
        };
        info!(
            "Auth state resolved: logged_in={}, user={:?}",
            next.is_logged_in,
            next.user.as_ref().map(|u| u.username.as_str())
        );

        let mut auth = self.auth.write().await;
        *auth = next.clone();
        next
    }

    /// Re-resolves the current user with the token already held.
    pub async fn refresh(&self) -> AuthState {
        let token = self.token().await;
        self.initialize(token).await
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> ClientResult<AuthState> {
        let SignedIn { session, profile } =
            self.identity.create_account(email, password, username).await?;

        let next = AuthState::signed_in(session.token, profile);
        *self.auth.write().await = next.clone();
        Ok(next)
    }

    /// Opens a session and resolves its profile. The token is held even when no
    /// profile resolves, so `sign_out` can still end the session.
    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<AuthState> {
        let session = self.identity.sign_in(email, password).await?;
        let next = match self.identity.get_current_profile(Some(&session.token)).await {
            ProfileLookup::Authenticated(profile) => AuthState::signed_in(session.token, profile),
            ProfileLookup::NotAuthenticated => AuthState {
                is_logged_in: true,
                token: Some(session.token),
                ..AuthState::default()
            },
            ProfileLookup::Unavailable(reason) => AuthState {
                is_logged_in: true,
                token: Some(session.token),
                last_error: Some(reason),
                ..AuthState::default()
            },
        };
        info!(
            "Signed in: user={:?}",
            next.user.as_ref().map(|u| u.username.as_str())
        );

        *self.auth.write().await = next.clone();
        Ok(next)
    }

    /// Ends the held session and forgets the user.
    pub async fn sign_out(&self) -> ClientResult<()> {
        let token = self
            .token()
            .await
            .ok_or(ClientError::MissingResult("active session"))?;
        self.identity.sign_out(&token).await?;

        *self.auth.write().await = AuthState::default();
        Ok(())
    }

    /// Drops in-memory state. The remote session stays alive for the next start.
    pub async fn shutdown(&self) {
        *self.auth.write().await = AuthState::default();
        info!("Application state torn down");
    }
}
