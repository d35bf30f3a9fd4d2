//! services/client/src/adapters/appwrite/database.rs
//!
//! `DatabaseService` implementation over the profile and video collections.

use super::{encode_query, AppwriteAdapter, UNIQUE_ID};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sora_core::domain::{NewPost, NewProfile, Post, Profile, Query, SessionToken};
use sora_core::ports::{DatabaseService, PortResult};
use tracing::debug;

//=========================================================================================
// Remote Record Structs
//=========================================================================================

#[derive(Deserialize)]
struct DocumentList<T> {
    total: u64,
    documents: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRecord {
    #[serde(rename = "$id")]
    id: String,
    account_id: String,
    email: String,
    username: String,
    #[serde(default)]
    avatar: String,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            id: self.id,
            account_id: self.account_id,
            email: self.email,
            username: self.username,
            avatar: self.avatar,
        }
    }
}

/// The `creator` relationship comes back either as a bare document id or,
/// when the backend expands it, as the whole profile document.
#[derive(Deserialize)]
#[serde(untagged)]
enum CreatorField {
    Expanded(ProfileRecord),
    Id(String),
}

#[derive(Deserialize)]
struct PostRecord {
    #[serde(rename = "$id")]
    id: String,
    title: String,
    thumbnail: String,
    video: String,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    creator: Option<CreatorField>,
    #[serde(rename = "$createdAt")]
    created_at: DateTime<Utc>,
}
impl PostRecord {
    fn to_domain(self) -> Post {
        let (creator_id, creator) = match self.creator {
            Some(CreatorField::Expanded(record)) => {
                let profile = record.to_domain();
                (profile.id.clone(), Some(profile))
            }
            Some(CreatorField::Id(id)) => (id, None),
            // A dangling relationship after the profile was removed.
            None => (String::new(), None),
        };
        Post {
            id: self.id,
            title: self.title,
            thumbnail: self.thumbnail,
            video: self.video,
            prompt: self.prompt,
            creator_id,
            creator,
            created_at: self.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDocument<'a, T: Serialize> {
    document_id: &'a str,
    data: T,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileData<'a> {
    account_id: &'a str,
    email: &'a str,
    username: &'a str,
    avatar: &'a str,
}

#[derive(Serialize)]
struct PostData<'a> {
    title: &'a str,
    thumbnail: &'a str,
    video: &'a str,
    prompt: &'a str,
    creator: &'a str,
}

//=========================================================================================
// Collection Helpers
//=========================================================================================

impl AppwriteAdapter {
    async fn list_documents<T: DeserializeOwned>(
        &self,
        collection_id: &str,
        token: Option<&SessionToken>,
        queries: &[Query],
    ) -> PortResult<Vec<T>> {
        let url = self.url(&[
            "databases",
            self.config.database_id.as_str(),
            "collections",
            collection_id,
            "documents",
        ])?;
        let params: Vec<(&str, String)> = queries
            .iter()
            .map(|q| ("queries[]", encode_query(q)))
            .collect();

        let list: DocumentList<T> = self
            .send(self.request(Method::GET, url, token).query(&params))
            .await?;
        debug!(
            "Listed {} of {} documents from collection {}",
            list.documents.len(),
            list.total,
            collection_id
        );
        Ok(list.documents)
    }

    async fn create_document<T: DeserializeOwned, D: Serialize + Send>(
        &self,
        collection_id: &str,
        token: &SessionToken,
        data: D,
    ) -> PortResult<T> {
        let url = self.url(&[
            "databases",
            self.config.database_id.as_str(),
            "collections",
            collection_id,
            "documents",
        ])?;
        let body = CreateDocument {
            document_id: UNIQUE_ID,
            data,
        };
        self.send(self.request(Method::POST, url, Some(token)).json(&body))
            .await
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for AppwriteAdapter {
    async fn create_profile(&self, token: &SessionToken, profile: &NewProfile) -> PortResult<Profile> {
        let data = ProfileData {
            account_id: &profile.account_id,
            email: &profile.email,
            username: &profile.username,
            avatar: &profile.avatar,
        };
        let record: ProfileRecord = self
            .create_document(&self.config.user_collection_id, token, data)
            .await?;
        Ok(record.to_domain())
    }

    async fn list_profiles(
        &self,
        token: Option<&SessionToken>,
        queries: &[Query],
    ) -> PortResult<Vec<Profile>> {
        let records: Vec<ProfileRecord> = self
            .list_documents(&self.config.user_collection_id, token, queries)
            .await?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_post(&self, token: &SessionToken, post: &NewPost) -> PortResult<Post> {
        let data = PostData {
            title: &post.title,
            thumbnail: &post.thumbnail,
            video: &post.video,
            prompt: &post.prompt,
            creator: &post.creator_id,
        };
        let record: PostRecord = self
            .create_document(&self.config.video_collection_id, token, data)
            .await?;
        Ok(record.to_domain())
    }

    async fn list_posts(
        &self,
        token: Option<&SessionToken>,
        queries: &[Query],
    ) -> PortResult<Vec<Post>> {
        let records: Vec<PostRecord> = self
            .list_documents(&self.config.video_collection_id, token, queries)
            .await?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_creator_decodes_from_id_or_expanded_profile() {
        let bare: PostRecord = serde_json::from_value(serde_json::json!({
            "$id": "post-1",
            "title": "Sunrise",
            "thumbnail": "https://t",
            "video": "https://v",
            "prompt": "a sunrise",
            "creator": "profile-1",
            "$createdAt": "2024-07-11T10:00:00.000+00:00",
        }))
        .unwrap();
        let post = bare.to_domain();
        assert_eq!(post.creator_id, "profile-1");
        assert!(post.creator.is_none());

        let expanded: PostRecord = serde_json::from_value(serde_json::json!({
            "$id": "post-2",
            "title": "Sunset",
            "thumbnail": "https://t",
            "video": "https://v",
            "prompt": "a sunset",
            "creator": {
                "$id": "profile-2",
                "accountId": "acc-2",
                "email": "b@example.com",
                "username": "bea",
                "avatar": "https://a",
            },
            "$createdAt": "2024-07-11T11:00:00.000+00:00",
        }))
        .unwrap();
        let post = expanded.to_domain();
        assert_eq!(post.creator_id, "profile-2");
        assert_eq!(post.creator.unwrap().username, "bea");
    }

    #[test]
    fn create_document_body_wraps_data() {
        let body = CreateDocument {
            document_id: UNIQUE_ID,
            data: ProfileData {
                account_id: "acc",
                email: "a@example.com",
                username: "ana",
                avatar: "https://a",
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "documentId": "unique()",
                "data": {
                    "accountId": "acc",
                    "email": "a@example.com",
                    "username": "ana",
                    "avatar": "https://a",
                },
            })
        );
    }
}
