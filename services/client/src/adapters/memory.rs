//! services/client/src/adapters/memory.rs
//!
//! An in-process backend implementing every port against local state.
//! Used by the test suites and by the `sora` binary with `SORA_BACKEND=memory`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sora_core::domain::{
    fields, Account, MediaFile, NewPost, NewProfile, Post, PreviewOptions, Profile, Query,
    Session, SessionToken, StoredFile, CREATED_AT,
};
use sora_core::ports::{
    AccountService, DatabaseService, PortError, PortResult, StorageService,
};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use url::Url;
use uuid::Uuid;

/// Attributes that carry a fulltext index; searching anything else fails.
const SEARCH_INDEXED: &[&str] = &[fields::TITLE];

//=========================================================================================
// Stored State
//=========================================================================================

struct StoredAccount {
    account: Account,
    password: String,
}

/// A document together with its creation stamp and insertion order.
struct Stored<T> {
    seq: u64,
    created_at: DateTime<Utc>,
    value: T,
}

#[derive(Default)]
struct MemoryState {
    accounts: Vec<StoredAccount>,
    /// Live sessions keyed by secret: (session id, account id).
    sessions: HashMap<String, (String, String)>,
    profiles: Vec<Stored<Profile>>,
    posts: Vec<Stored<Post>>,
    files: HashMap<String, (StoredFile, MediaFile)>,
    seq: u64,
    calls: usize,
    failing_mime_prefixes: Vec<String>,
}

impl MemoryState {
    fn next_stamp(&mut self, epoch: DateTime<Utc>) -> (u64, DateTime<Utc>) {
        self.seq += 1;
        // One millisecond apart keeps creation order strict.
        (self.seq, epoch + Duration::milliseconds(self.seq as i64))
    }

    fn account_for(&self, token: &SessionToken) -> PortResult<&Account> {
        let (_, account_id) = self
            .sessions
            .get(token.expose())
            .ok_or(PortError::Unauthorized)?;
        self.accounts
            .iter()
            .map(|stored| &stored.account)
            .find(|account| &account.id == account_id)
            .ok_or(PortError::Unauthorized)
    }

    fn check_optional(&self, token: Option<&SessionToken>) -> PortResult<()> {
        match token {
            Some(token) => self.account_for(token).map(|_| ()),
            None => Ok(()),
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    epoch: DateTime<Utc>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            epoch: Utc::now(),
        }
    }

    fn state(&self) -> PortResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| PortError::Unexpected("Memory backend lock poisoned".to_string()))
    }

    /// Locks the state and counts one remote call.
    fn call(&self) -> PortResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.state()?;
        state.calls += 1;
        Ok(state)
    }

    /// Makes every upload whose mime type starts with `prefix` fail.
    pub fn fail_uploads_matching(&self, prefix: impl Into<String>) {
        if let Ok(mut state) = self.state() {
            state.failing_mime_prefixes.push(prefix.into());
        }
    }

    /// Number of port calls that would have reached the network.
    pub fn remote_calls(&self) -> usize {
        self.state().map(|s| s.calls).unwrap_or_default()
    }

    pub fn stored_files(&self) -> Vec<StoredFile> {
        self.state()
            .map(|s| s.files.values().map(|(stored, _)| stored.clone()).collect())
            .unwrap_or_default()
    }

    pub fn post_count(&self) -> usize {
        self.state().map(|s| s.posts.len()).unwrap_or_default()
    }

    pub fn active_sessions(&self) -> usize {
        self.state().map(|s| s.sessions.len()).unwrap_or_default()
    }
}

//=========================================================================================
// Query Evaluation
//=========================================================================================

trait Document {
    fn attribute(&self, name: &str) -> Option<&str>;
}

impl Document for Profile {
    fn attribute(&self, name: &str) -> Option<&str> {
        match name {
            "$id" => Some(&self.id),
            fields::ACCOUNT_ID => Some(&self.account_id),
            fields::EMAIL => Some(&self.email),
            fields::USERNAME => Some(&self.username),
            fields::AVATAR => Some(&self.avatar),
            _ => None,
        }
    }
}

impl Document for Post {
    fn attribute(&self, name: &str) -> Option<&str> {
        match name {
            "$id" => Some(&self.id),
            fields::TITLE => Some(&self.title),
            fields::THUMBNAIL => Some(&self.thumbnail),
            fields::VIDEO => Some(&self.video),
            fields::PROMPT => Some(&self.prompt),
            fields::CREATOR => Some(&self.creator_id),
            _ => None,
        }
    }
}

/// Word-prefix matching: every term of `needle` must start some word of `haystack`.
fn matches_search(haystack: &str, needle: &str) -> bool {
    let words: Vec<String> = haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let mut terms = needle.split_whitespace().map(str::to_lowercase).peekable();
    if terms.peek().is_none() {
        return false;
    }
    terms.all(|term| words.iter().any(|word| word.starts_with(&term)))
}

fn compare<T: Document>(a: &Stored<T>, b: &Stored<T>, attribute: &str) -> Ordering {
    if attribute == CREATED_AT {
        return a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq));
    }
    a.value.attribute(attribute).cmp(&b.value.attribute(attribute))
}

fn run_queries<T: Document + Clone>(documents: &[Stored<T>], queries: &[Query]) -> PortResult<Vec<T>> {
    let mut selected: Vec<&Stored<T>> = documents.iter().collect();
    let mut limit = None;

    for query in queries {
        match query {
            Query::Equal { attribute, value } => {
                selected.retain(|d| d.value.attribute(attribute) == Some(value.as_str()));
            }
            Query::Search { attribute, value } => {
                if !SEARCH_INDEXED.contains(&attribute.as_str()) {
                    return Err(PortError::Unexpected(format!(
                        "Searching by attribute \"{}\" requires a fulltext index.",
                        attribute
                    )));
                }
                selected.retain(|d| {
                    d.value
                        .attribute(attribute)
                        .is_some_and(|text| matches_search(text, value))
                });
            }
            Query::OrderDesc(attribute) => selected.sort_by(|a, b| compare(b, a, attribute)),
            Query::OrderAsc(attribute) => selected.sort_by(|a, b| compare(a, b, attribute)),
            Query::Limit(n) => limit = Some(*n),
        }
    }

    let limit = limit.unwrap_or(usize::MAX);
    Ok(selected.into_iter().take(limit).map(|d| d.value.clone()).collect())
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl AccountService for MemoryBackend {
    async fn create_account(&self, email: &str, password: &str, name: &str) -> PortResult<Account> {
        let mut state = self.call()?;
        if state.accounts.iter().any(|a| a.account.email == email) {
            return Err(PortError::Conflict(format!(
                "A user with the same email {} already exists",
                email
            )));
        }
        let account = Account {
            id: Uuid::new_v4().simple().to_string(),
            email: email.to_string(),
            name: name.to_string(),
        };
        state.accounts.push(StoredAccount {
            account: account.clone(),
            password: password.to_string(),
        });
        Ok(account)
    }

    async fn create_email_session(&self, email: &str, password: &str) -> PortResult<Session> {
        let mut state = self.call()?;
        let account_id = state
            .accounts
            .iter()
            .find(|a| a.account.email == email && a.password == password)
            .map(|a| a.account.id.clone())
            .ok_or(PortError::Unauthorized)?;

        let session_id = Uuid::new_v4().simple().to_string();
        let secret = Uuid::new_v4().to_string();
        state
            .sessions
            .insert(secret.clone(), (session_id.clone(), account_id.clone()));

        Ok(Session {
            id: session_id,
            account_id,
            expires_at: Some(Utc::now() + Duration::days(365)),
            token: SessionToken::new(secret),
        })
    }

    async fn get_account(&self, token: &SessionToken) -> PortResult<Account> {
        let state = self.call()?;
        state.account_for(token).cloned()
    }

    async fn delete_session(&self, token: &SessionToken) -> PortResult<()> {
        let mut state = self.call()?;
        state
            .sessions
            .remove(token.expose())
            .map(|_| ())
            .ok_or(PortError::Unauthorized)
    }

    fn avatar_url(&self, name: &str) -> PortResult<String> {
        Url::parse_with_params("memory://avatars/initials", &[("name", name)])
            .map(String::from)
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

#[async_trait]
impl DatabaseService for MemoryBackend {
    async fn create_profile(&self, token: &SessionToken, profile: &NewProfile) -> PortResult<Profile> {
        let mut state = self.call()?;
        state.account_for(token)?;

        let (seq, created_at) = state.next_stamp(self.epoch);
        let profile = Profile {
            id: Uuid::new_v4().simple().to_string(),
            account_id: profile.account_id.clone(),
            email: profile.email.clone(),
            username: profile.username.clone(),
            avatar: profile.avatar.clone(),
        };
        state.profiles.push(Stored {
            seq,
            created_at,
            value: profile.clone(),
        });
        Ok(profile)
    }

    async fn list_profiles(
        &self,
        token: Option<&SessionToken>,
        queries: &[Query],
    ) -> PortResult<Vec<Profile>> {
        let state = self.call()?;
        state.check_optional(token)?;
        run_queries(&state.profiles, queries)
    }

    async fn create_post(&self, token: &SessionToken, post: &NewPost) -> PortResult<Post> {
        let mut state = self.call()?;
        state.account_for(token)?;

        let creator = state
            .profiles
            .iter()
            .find(|p| p.value.id == post.creator_id)
            .map(|p| p.value.clone());
        let (seq, created_at) = state.next_stamp(self.epoch);
        let post = Post {
            id: Uuid::new_v4().simple().to_string(),
            title: post.title.clone(),
            thumbnail: post.thumbnail.clone(),
            video: post.video.clone(),
            prompt: post.prompt.clone(),
            creator_id: post.creator_id.clone(),
            creator,
            created_at,
        };
        state.posts.push(Stored {
            seq,
            created_at,
            value: post.clone(),
        });
        Ok(post)
    }

    async fn list_posts(
        &self,
        token: Option<&SessionToken>,
        queries: &[Query],
    ) -> PortResult<Vec<Post>> {
        let state = self.call()?;
        state.check_optional(token)?;
        run_queries(&state.posts, queries)
    }
}

#[async_trait]
impl StorageService for MemoryBackend {
    async fn upload_file(&self, token: &SessionToken, file: MediaFile) -> PortResult<StoredFile> {
        let mut state = self.call()?;
        state.account_for(token)?;

        if state
            .failing_mime_prefixes
            .iter()
            .any(|prefix| file.mime_type.starts_with(prefix.as_str()))
        {
            return Err(PortError::Unexpected(format!(
                "Storage rejected upload of {}",
                file.name
            )));
        }

        let stored = StoredFile {
            id: Uuid::new_v4().simple().to_string(),
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.size() as u64,
        };
        state
            .files
            .insert(stored.id.clone(), (stored.clone(), file));
        Ok(stored)
    }

    fn file_view_url(&self, file_id: &str) -> PortResult<String> {
        Ok(format!("memory://storage/files/{}/view", file_id))
    }

    fn file_preview_url(&self, file_id: &str, options: &PreviewOptions) -> PortResult<String> {
        Ok(format!(
            "memory://storage/files/{}/preview?width={}&height={}&gravity={}&quality={}",
            file_id,
            options.width,
            options.height,
            options.gravity.as_str(),
            options.quality
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_matches_word_prefixes_case_insensitively() {
        assert!(matches_search("Cats on the Moon", "cat"));
        assert!(matches_search("Cats on the Moon", "MOON cats"));
        assert!(!matches_search("Cats on the Moon", "dog"));
        assert!(!matches_search("Cats on the Moon", "   "));
    }

    #[tokio::test]
    async fn search_without_index_fails() {
        let backend = MemoryBackend::new();
        let err = backend
            .list_posts(None, &[Query::search(fields::PROMPT, "cats")])
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Unexpected(_)));
    }

    #[tokio::test]
    async fn sessions_end_once() {
        let backend = MemoryBackend::new();
        backend.create_account("a@example.com", "password1", "ana").await.unwrap();
        let session = backend
            .create_email_session("a@example.com", "password1")
            .await
            .unwrap();

        assert_eq!(backend.active_sessions(), 1);
        backend.delete_session(&session.token).await.unwrap();
        assert!(matches!(
            backend.delete_session(&session.token).await,
            Err(PortError::Unauthorized)
        ));
        assert!(matches!(
            backend.get_account(&session.token).await,
            Err(PortError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let backend = MemoryBackend::new();
        backend.create_account("a@example.com", "password1", "ana").await.unwrap();
        assert!(matches!(
            backend.create_email_session("a@example.com", "nope").await,
            Err(PortError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let backend = MemoryBackend::new();
        backend.create_account("a@example.com", "password1", "ana").await.unwrap();
        assert!(matches!(
            backend.create_account("a@example.com", "password2", "ana2").await,
            Err(PortError::Conflict(_))
        ));
    }
}
