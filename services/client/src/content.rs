//! services/client/src/content.rs
//!
//! Post listing, search, media upload and post creation on top of the
//! database and storage ports.

use crate::error::{ClientError, ClientResult};
use sora_core::domain::{
    fields, FileKind, MediaFile, NewPost, Post, PreviewOptions, Query, SessionToken,
};
use sora_core::ports::{DatabaseService, StorageService};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// How many posts the "latest" shelf shows unless told otherwise.
pub const DEFAULT_LATEST_LIMIT: usize = 7;

/// Everything the create screen collects for a new post.
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub title: String,
    pub prompt: String,
    /// Profile id of the author.
    pub creator_id: String,
    pub thumbnail: Option<MediaFile>,
    pub video: Option<MediaFile>,
}

#[derive(Clone)]
pub struct ContentClient {
    database: Arc<dyn DatabaseService>,
    storage: Arc<dyn StorageService>,
}

impl ContentClient {
    pub fn new(database: Arc<dyn DatabaseService>, storage: Arc<dyn StorageService>) -> Self {
        Self { database, storage }
    }

    /// Every post, newest first.
    pub async fn list_all_posts(&self, token: Option<&SessionToken>) -> ClientResult<Vec<Post>> {
        self.list(token, &[Query::newest_first()]).await
    }

    /// At most `limit` posts, newest first.
    pub async fn list_latest_posts(
        &self,
        token: Option<&SessionToken>,
        limit: usize,
    ) -> ClientResult<Vec<Post>> {
        self.list(token, &[Query::newest_first(), Query::limit(limit)])
            .await
    }

    /// Posts whose title matches `query` under the backend's fulltext rules.
    /// No match is an empty list, not an error.
    pub async fn search_posts(
        &self,
        token: Option<&SessionToken>,
        query: &str,
    ) -> ClientResult<Vec<Post>> {
        self.list(token, &[Query::search(fields::TITLE, query)])
            .await
    }

    /// Posts created by the profile `creator_id`, newest first.
    pub async fn list_user_posts(
        &self,
        token: Option<&SessionToken>,
        creator_id: &str,
    ) -> ClientResult<Vec<Post>> {
        self.list(
            token,
            &[
                Query::equal(fields::CREATOR, creator_id),
                Query::newest_first(),
            ],
        )
        .await
    }

    async fn list(&self, token: Option<&SessionToken>, queries: &[Query]) -> ClientResult<Vec<Post>> {
        let posts = self
            .database
            .list_posts(token, queries)
            .await
            .map_err(|e| {
                error!("Failed to list posts: {:?}", e);
                e
            })?;
        Ok(posts)
    }

    /// Uploads `file` and returns the URL the UI should display for it.
    ///
    /// An absent file is a no-op returning `None`. `kind` must be `image` or
    /// `video`; anything else fails before any request is made.
    pub async fn upload_file(
        &self,
        token: &SessionToken,
        file: Option<MediaFile>,
        kind: &str,
    ) -> ClientResult<Option<String>> {
        let Some(file) = file else {
            return Ok(None);
        };
        let kind = kind.parse::<FileKind>()?;
        self.upload_media(token, file, kind).await.map(Some)
    }

    async fn upload_media(
        &self,
        token: &SessionToken,
        file: MediaFile,
        kind: FileKind,
    ) -> ClientResult<String> {
        let name = file.name.clone();
        let stored = self.storage.upload_file(token, file).await.map_err(|e| {
            error!("Failed to upload {} {}: {:?}", kind, name, e);
            e
        })?;

        let url = match kind {
            FileKind::Video => self.storage.file_view_url(&stored.id)?,
            FileKind::Image => self
                .storage
                .file_preview_url(&stored.id, &PreviewOptions::THUMBNAIL)?,
        };
        Ok(url)
    }

    fn spawn_upload(
        &self,
        token: &SessionToken,
        file: MediaFile,
        kind: FileKind,
    ) -> JoinHandle<ClientResult<String>> {
        let client = self.clone();
        let token = token.clone();
        tokio::spawn(async move { client.upload_media(&token, file, kind).await })
    }

    /// Uploads the thumbnail and the video concurrently, then records the post.
    ///
    /// The first upload failure is returned and no post is created. The other
    /// upload keeps running in the background and, if it succeeds, stays in storage.
    pub async fn create_post(&self, token: &SessionToken, form: PostForm) -> ClientResult<Post> {
        let PostForm {
            title,
            prompt,
            creator_id,
            thumbnail,
            video,
        } = form;
        let thumbnail = thumbnail.ok_or(ClientError::MissingResult("thumbnail file"))?;
        let video = video.ok_or(ClientError::MissingResult("video file"))?;

        // Each upload is its own task so a failure here never aborts the other.
        let thumbnail_task = self.spawn_upload(token, thumbnail, FileKind::Image);
        let video_task = self.spawn_upload(token, video, FileKind::Video);
        let (thumbnail_url, video_url) =
            futures::try_join!(join_upload(thumbnail_task), join_upload(video_task))?;

        let post = self
            .database
            .create_post(
                token,
                &NewPost {
                    title,
                    thumbnail: thumbnail_url,
                    video: video_url,
                    prompt,
                    creator_id,
                },
            )
            .await
            .map_err(|e| {
                error!("Failed to create post document: {:?}", e);
                e
            })?;

        info!("Created post {} by {}", post.id, post.creator_id);
        Ok(post)
    }
}

/// Dropping the handle detaches the task, it does not cancel it.
async fn join_upload(handle: JoinHandle<ClientResult<String>>) -> ClientResult<String> {
    handle
        .await
        .map_err(|e| ClientError::Internal(format!("Upload task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryBackend;
    use crate::identity::{IdentityClient, SignedIn};
    use async_trait::async_trait;
    use sora_core::domain::StoredFile;
    use sora_core::ports::{PortError, PortResult};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct Fixture {
        backend: Arc<MemoryBackend>,
        content: ContentClient,
        user: SignedIn,
    }

    async fn fixture() -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        let identity = IdentityClient::new(backend.clone(), backend.clone());
        let user = identity
            .create_account("ana@example.com", "password1", "ana")
            .await
            .unwrap();
        let content = ContentClient::new(backend.clone(), backend.clone());
        Fixture {
            backend,
            content,
            user,
        }
    }

    fn form(title: &str, creator_id: &str) -> PostForm {
        PostForm {
            title: title.to_string(),
            prompt: format!("prompt for {}", title),
            creator_id: creator_id.to_string(),
            thumbnail: Some(MediaFile::new("thumb.png", "image/png", vec![1u8, 2, 3])),
            video: Some(MediaFile::new("clip.mp4", "video/mp4", vec![4u8, 5, 6, 7])),
        }
    }

    async fn publish(f: &Fixture, titles: &[&str]) {
        for title in titles {
            f.content
                .create_post(&f.user.session.token, form(title, &f.user.profile.id))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn upload_without_file_makes_no_calls() {
        let f = fixture().await;
        let before = f.backend.remote_calls();

        let url = f
            .content
            .upload_file(&f.user.session.token, None, "image")
            .await
            .unwrap();
        assert!(url.is_none());
        assert_eq!(f.backend.remote_calls(), before);
    }

    #[tokio::test]
    async fn upload_of_unknown_kind_fails_without_calls() {
        let f = fixture().await;
        let before = f.backend.remote_calls();

        let err = f
            .content
            .upload_file(
                &f.user.session.token,
                Some(MediaFile::new("song.mp3", "audio/mpeg", vec![0u8; 4])),
                "audio",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidFileType(_)));
        assert_eq!(f.backend.remote_calls(), before);
        assert!(f.backend.stored_files().is_empty());
    }

    #[tokio::test]
    async fn uploads_resolve_to_view_or_preview_urls() {
        let f = fixture().await;
        let token = &f.user.session.token;

        let video = f
            .content
            .upload_file(token, Some(MediaFile::new("a.mp4", "video/mp4", vec![1u8])), "video")
            .await
            .unwrap()
            .unwrap();
        assert!(video.ends_with("/view"));

        let image = f
            .content
            .upload_file(token, Some(MediaFile::new("a.png", "image/png", vec![1u8])), "image")
            .await
            .unwrap()
            .unwrap();
        assert!(image.contains("/preview?width=2000&height=2000&gravity=top&quality=100"));
    }

    #[tokio::test]
    async fn latest_posts_are_capped_and_newest_first() {
        let f = fixture().await;
        publish(&f, &["one", "two", "three", "four", "five", "six", "seven", "eight", "nine"]).await;

        let latest = f
            .content
            .list_latest_posts(None, DEFAULT_LATEST_LIMIT)
            .await
            .unwrap();
        assert_eq!(latest.len(), DEFAULT_LATEST_LIMIT);
        assert_eq!(latest[0].title, "nine");
        assert!(latest.windows(2).all(|w| w[0].created_at > w[1].created_at));

        let two = f.content.list_latest_posts(None, 2).await.unwrap();
        let titles: Vec<_> = two.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["nine", "eight"]);
    }

    #[tokio::test]
    async fn all_posts_come_back_newest_first() {
        let f = fixture().await;
        publish(&f, &["first", "second", "third"]).await;

        let all = f.content.list_all_posts(Some(&f.user.session.token)).await.unwrap();
        let titles: Vec<_> = all.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn user_posts_only_contain_that_creator() {
        let f = fixture().await;
        publish(&f, &["mine"]).await;
        f.content
            .create_post(&f.user.session.token, form("someone else's", "other-profile"))
            .await
            .unwrap();

        let mine = f
            .content
            .list_user_posts(None, &f.user.profile.id)
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert!(mine.iter().all(|p| p.creator_id == f.user.profile.id));
        assert_eq!(mine[0].creator.as_ref().unwrap().username, "ana");

        let nobody = f.content.list_user_posts(None, "nobody").await.unwrap();
        assert!(nobody.is_empty());
    }

    #[tokio::test]
    async fn search_without_matches_is_empty() {
        let f = fixture().await;
        publish(&f, &["Neon city at night", "Forest walk"]).await;

        let found = f.content.search_posts(None, "neon").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Neon city at night");

        let none = f.content.search_posts(None, "volcano").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn failed_video_upload_creates_no_post() {
        let f = fixture().await;
        f.backend.fail_uploads_matching("video/");

        let err = f
            .content
            .create_post(&f.user.session.token, form("doomed", &f.user.profile.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Port(PortError::Unexpected(_))));
        assert_eq!(f.backend.post_count(), 0);
    }

    /// Rejects images at once and stores videos after a short delay.
    struct SlowVideoStorage {
        video_stored: Arc<AtomicBool>,
    }

    #[async_trait]
    impl StorageService for SlowVideoStorage {
        async fn upload_file(&self, _token: &SessionToken, file: MediaFile) -> PortResult<StoredFile> {
            if file.mime_type.starts_with("image/") {
                return Err(PortError::Unexpected("thumbnail rejected".into()));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.video_stored.store(true, Ordering::SeqCst);
            Ok(StoredFile {
                id: "video-1".into(),
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
                size: file.size() as u64,
            })
        }

        fn file_view_url(&self, file_id: &str) -> PortResult<String> {
            Ok(format!("http://storage/{}/view", file_id))
        }

        fn file_preview_url(&self, file_id: &str, _options: &PreviewOptions) -> PortResult<String> {
            Ok(format!("http://storage/{}/preview", file_id))
        }
    }

    #[tokio::test]
    async fn failed_thumbnail_lets_the_video_upload_finish() {
        let f = fixture().await;
        let video_stored = Arc::new(AtomicBool::new(false));
        let storage = Arc::new(SlowVideoStorage {
            video_stored: video_stored.clone(),
        });
        let content = ContentClient::new(f.backend.clone(), storage);

        let err = content
            .create_post(&f.user.session.token, form("half", &f.user.profile.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Port(PortError::Unexpected(_))));
        assert!(!video_stored.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(video_stored.load(Ordering::SeqCst));
        assert_eq!(f.backend.post_count(), 0);
    }

    #[tokio::test]
    async fn missing_media_creates_nothing() {
        let f = fixture().await;
        let mut incomplete = form("no video", &f.user.profile.id);
        incomplete.video = None;

        let err = f
            .content
            .create_post(&f.user.session.token, incomplete)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MissingResult("video file")));
        assert!(f.backend.stored_files().is_empty());
        assert_eq!(f.backend.post_count(), 0);
    }

    #[tokio::test]
    async fn created_post_references_both_uploads() {
        let f = fixture().await;
        let post = f
            .content
            .create_post(&f.user.session.token, form("Sunrise", &f.user.profile.id))
            .await
            .unwrap();

        assert_eq!(f.backend.stored_files().len(), 2);
        assert!(post.thumbnail.contains("/preview?"));
        assert!(post.video.ends_with("/view"));
        assert_eq!(post.creator_id, f.user.profile.id);
    }
}
