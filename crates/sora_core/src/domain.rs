//! crates/sora_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any backend or serialization format.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Attribute the backend stamps on every document at creation time.
pub const CREATED_AT: &str = "$createdAt";

/// Attribute names of the profile and post collections.
pub mod fields {
    pub const ACCOUNT_ID: &str = "accountId";
    pub const EMAIL: &str = "email";
    pub const USERNAME: &str = "username";
    pub const AVATAR: &str = "avatar";
    pub const TITLE: &str = "title";
    pub const THUMBNAIL: &str = "thumbnail";
    pub const VIDEO: &str = "video";
    pub const PROMPT: &str = "prompt";
    pub const CREATOR: &str = "creator";
}

//=========================================================================================
// Identity
//=========================================================================================

/// A remote identity record. Credentials never leave the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// The opaque secret that authenticates requests on behalf of a session.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the raw secret, for the adapter that has to put it on the wire.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// A live authenticated connection bound to one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub account_id: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub token: SessionToken,
}

/// The application-level user record linked to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub account_id: String,
    pub email: String,
    pub username: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub account_id: String,
    pub email: String,
    pub username: String,
    pub avatar: String,
}

/// Outcome of resolving the profile behind the current session.
///
/// "Logged out" is a normal steady state for callers, so it is a variant here
/// rather than an error. `Unavailable` carries the reason the lookup could not
/// complete (network, backend failure) so it is not mistaken for a log out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileLookup {
    Authenticated(Profile),
    NotAuthenticated,
    Unavailable(String),
}

impl ProfileLookup {
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            ProfileLookup::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn into_profile(self) -> Option<Profile> {
        match self {
            ProfileLookup::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }
}

//=========================================================================================
// Content
//=========================================================================================

/// A user-created video post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub video: String,
    pub prompt: String,
    pub creator_id: String,
    /// Present when the backend expands the creator relationship.
    pub creator: Option<Profile>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub thumbnail: String,
    pub video: String,
    pub prompt: String,
    pub creator_id: String,
}

/// A file picked on the device, ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A file as recorded by remote storage after upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Image,
    Video,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Video => "video",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid file type: {0}")]
pub struct UnknownFileKind(pub String);

impl FromStr for FileKind {
    type Err = UnknownFileKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(FileKind::Image),
            "video" => Ok(FileKind::Video),
            other => Err(UnknownFileKind(other.to_string())),
        }
    }
}

/// Crop anchor used when rendering an image preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    Center,
    Top,
    TopLeft,
    TopRight,
    Left,
    Right,
    Bottom,
    BottomLeft,
    BottomRight,
}

impl Gravity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gravity::Center => "center",
            Gravity::Top => "top",
            Gravity::TopLeft => "top-left",
            Gravity::TopRight => "top-right",
            Gravity::Left => "left",
            Gravity::Right => "right",
            Gravity::Bottom => "bottom",
            Gravity::BottomLeft => "bottom-left",
            Gravity::BottomRight => "bottom-right",
        }
    }
}

/// Rendering parameters for a preview URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewOptions {
    pub width: u32,
    pub height: u32,
    pub gravity: Gravity,
    pub quality: u8,
}

impl PreviewOptions {
    /// The box every uploaded thumbnail is rendered into.
    pub const THUMBNAIL: PreviewOptions = PreviewOptions {
        width: 2000,
        height: 2000,
        gravity: Gravity::Top,
        quality: 100,
    };
}

//=========================================================================================
// Queries
//=========================================================================================

/// A filter, ordering or paging clause evaluated by the remote document database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Equal { attribute: String, value: String },
    /// Full-text match; requires a search index on the attribute.
    Search { attribute: String, value: String },
    OrderDesc(String),
    OrderAsc(String),
    Limit(usize),
}

impl Query {
    pub fn equal(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Equal {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn search(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Search {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn order_desc(attribute: impl Into<String>) -> Self {
        Query::OrderDesc(attribute.into())
    }

    pub fn order_asc(attribute: impl Into<String>) -> Self {
        Query::OrderAsc(attribute.into())
    }

    pub fn limit(limit: usize) -> Self {
        Query::Limit(limit)
    }

    /// Newest first, by backend creation time.
    pub fn newest_first() -> Self {
        Query::order_desc(CREATED_AT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_kind_parses_known_kinds_only() {
        assert_eq!("image".parse::<FileKind>(), Ok(FileKind::Image));
        assert_eq!("video".parse::<FileKind>(), Ok(FileKind::Video));
        assert_eq!(
            "audio".parse::<FileKind>(),
            Err(UnknownFileKind("audio".to_string()))
        );
    }

    #[test]
    fn session_token_debug_hides_secret() {
        let token = SessionToken::new("super-secret");
        assert_eq!(format!("{:?}", token), "SessionToken(***)");
        assert_eq!(token.expose(), "super-secret");
    }

    #[test]
    fn profile_lookup_only_yields_authenticated_profiles() {
        let profile = Profile {
            id: "p1".into(),
            account_id: "a1".into(),
            email: "a@b.c".into(),
            username: "ana".into(),
            avatar: "https://avatar".into(),
        };
        assert_eq!(
            ProfileLookup::Authenticated(profile.clone()).into_profile(),
            Some(profile)
        );
        assert!(ProfileLookup::NotAuthenticated.profile().is_none());
        assert!(ProfileLookup::Unavailable("offline".into()).profile().is_none());
    }
}
