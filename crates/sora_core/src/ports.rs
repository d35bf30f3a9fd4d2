//! crates/sora_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete backend (Appwrite over HTTPS, in-memory, ...).

use async_trait::async_trait;
use crate::domain::{
    Account, MediaFile, NewPost, NewProfile, Post, PreviewOptions, Profile, Query, Session,
    SessionToken, StoredFile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, backend).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AccountService: Send + Sync {
    /// Registers a new account. The backend assigns the id.
    async fn create_account(&self, email: &str, password: &str, name: &str) -> PortResult<Account>;

    /// Exchanges email and password for a new session.
    async fn create_email_session(&self, email: &str, password: &str) -> PortResult<Session>;

    /// Returns the account bound to `token`.
    async fn get_account(&self, token: &SessionToken) -> PortResult<Account>;

    /// Terminates the session identified by `token`.
    async fn delete_session(&self, token: &SessionToken) -> PortResult<()>;

    /// Derives the initials avatar URL for a display name. No request is made.
    fn avatar_url(&self, name: &str) -> PortResult<String>;
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Profiles ---
    async fn create_profile(&self, token: &SessionToken, profile: &NewProfile) -> PortResult<Profile>;

    async fn list_profiles(
        &self,
        token: Option<&SessionToken>,
        queries: &[Query],
    ) -> PortResult<Vec<Profile>>;

    // --- Posts ---
    async fn create_post(&self, token: &SessionToken, post: &NewPost) -> PortResult<Post>;

    async fn list_posts(
        &self,
        token: Option<&SessionToken>,
        queries: &[Query],
    ) -> PortResult<Vec<Post>>;
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Uploads a file into the configured bucket.
    async fn upload_file(&self, token: &SessionToken, file: MediaFile) -> PortResult<StoredFile>;

    /// Direct view URL of a stored file.
    fn file_view_url(&self, file_id: &str) -> PortResult<String>;

    /// Rendered preview URL of a stored image.
    fn file_preview_url(&self, file_id: &str, options: &PreviewOptions) -> PortResult<String>;
}
