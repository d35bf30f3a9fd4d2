//! services/client/src/lib.rs
//!
//! Client-side integration layer between the Sora app and its hosted backend:
//! accounts and sessions, the profile and post collections, and media storage.

pub mod adapters;
pub mod config;
pub mod content;
pub mod error;
pub mod identity;
pub mod state;

pub use content::{ContentClient, PostForm, DEFAULT_LATEST_LIMIT};
pub use error::{ClientError, ClientResult};
pub use identity::{IdentityClient, SignedIn};
pub use state::{AppState, AuthState};
