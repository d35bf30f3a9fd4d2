//! services/client/src/identity.rs
//!
//! Registration, sign in/out and current-user resolution on top of the
//! account and database ports.

use crate::error::ClientResult;
use sora_core::domain::{fields, Account, NewProfile, Profile, ProfileLookup, Query, Session, SessionToken};
use sora_core::ports::{AccountService, DatabaseService, PortError, PortResult};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The outcome of a successful registration: the new session and its profile.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub session: Session,
    pub profile: Profile,
}

#[derive(Clone)]
pub struct IdentityClient {
    accounts: Arc<dyn AccountService>,
    database: Arc<dyn DatabaseService>,
}

impl IdentityClient {
    pub fn new(accounts: Arc<dyn AccountService>, database: Arc<dyn DatabaseService>) -> Self {
        Self { accounts, database }
    }

    /// Registers an account, signs it in and creates its profile document.
    ///
    /// Steps run in order and the first failure is returned. Nothing done by an
    /// earlier step is undone.
    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> ClientResult<SignedIn> {
        let account = self
            .accounts
            .create_account(email, password, username)
            .await
            .map_err(|e| {
                error!("Failed to create account: {:?}", e);
                e
            })?;

        let avatar = self.accounts.avatar_url(username)?;

        let session = self.sign_in(email, password).await?;

        let profile = self
            .database
            .create_profile(
                &session.token,
                &NewProfile {
                    account_id: account.id.clone(),
                    email: email.to_string(),
                    username: username.to_string(),
                    avatar,
                },
            )
            .await
            .map_err(|e| {
                error!("Failed to create profile for account {}: {:?}", account.id, e);
                e
            })?;

        info!("Registered account {} with profile {}", account.id, profile.id);
        Ok(SignedIn { session, profile })
    }

    /// Exchanges credentials for a new session.
    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<Session> {
        let session = self
            .accounts
            .create_email_session(email, password)
            .await
            .map_err(|e| {
                error!("Failed to create session: {:?}", e);
                e
            })?;
        Ok(session)
    }

    pub async fn get_current_account(&self, token: &SessionToken) -> ClientResult<Account> {
        Ok(self.accounts.get_account(token).await?)
    }

    /// Resolves the profile of the signed-in account. Never fails: a missing or
    /// rejected session is `NotAuthenticated`, anything else is `Unavailable`.
    pub async fn get_current_profile(&self, token: Option<&SessionToken>) -> ProfileLookup {
        let Some(token) = token else {
            return ProfileLookup::NotAuthenticated;
        };

        match self.resolve_profile(token).await {
            Ok(Some(profile)) => ProfileLookup::Authenticated(profile),
            Ok(None) => {
                info!("Signed-in account has no profile document");
                ProfileLookup::NotAuthenticated
            }
            Err(PortError::Unauthorized) => {
                info!("Session rejected by the backend; treating as signed out");
                ProfileLookup::NotAuthenticated
            }
            Err(e) => {
                warn!("Failed to resolve current profile: {:?}", e);
                ProfileLookup::Unavailable(e.to_string())
            }
        }
    }

    async fn resolve_profile(&self, token: &SessionToken) -> PortResult<Option<Profile>> {
        let account = self.accounts.get_account(token).await?;
        let profiles = self
            .database
            .list_profiles(Some(token), &[Query::equal(fields::ACCOUNT_ID, account.id)])
            .await?;
        Ok(profiles.into_iter().next())
    }

    /// Ends the session behind `token`. Fails if it is no longer active.
    pub async fn sign_out(&self, token: &SessionToken) -> ClientResult<()> {
        self.accounts.delete_session(token).await.map_err(|e| {
            error!("Failed to delete session: {:?}", e);
            e
        })?;
        info!("Signed out");
        Ok(())
    }
}
