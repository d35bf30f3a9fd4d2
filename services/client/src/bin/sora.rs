//! services/client/src/bin/sora.rs
//!
//! Composition root: loads configuration, wires the backend into `AppState`,
//! restores the persisted session and prints a feed.
//!
//! Usage: `sora [latest [N] | all | search <text> | mine]`

use client_lib::{
    adapters::{AppwriteAdapter, MemoryBackend},
    config::{BackendKind, Config},
    error::ClientError,
    state::AppState,
    DEFAULT_LATEST_LIMIT,
};
use sora_core::domain::{Post, SessionToken};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Backend: {:?}", config.backend);

    // --- 2. Build the Shared AppState ---
    let app_state = match config.backend {
        BackendKind::Appwrite => {
            let adapter = Arc::new(AppwriteAdapter::new(config.appwrite.clone())?);
            info!("Using Appwrite at {}", adapter.config().endpoint);
            AppState::with_backend(config.clone(), adapter)
        }
        BackendKind::Memory => {
            AppState::with_backend(config.clone(), Arc::new(MemoryBackend::new()))
        }
    };

    // --- 3. Restore the Session ---
    let restored = config.session_secret.clone().map(SessionToken::new);
    let auth = app_state.initialize(restored).await;
    if let Some(reason) = &auth.last_error {
        info!("Could not resolve the current user: {}", reason);
    }

    // --- 4. Run the Requested Listing ---
    let args: Vec<String> = std::env::args().skip(1).collect();
    let token = auth.token.as_ref();
    let content = &app_state.content;
    let posts = match args.first().map(String::as_str) {
        None | Some("latest") => {
            let limit = match args.get(1) {
                Some(raw) => raw.parse::<usize>().map_err(|e| {
                    ClientError::Internal(format!("Invalid limit '{}': {}", raw, e))
                })?,
                None => DEFAULT_LATEST_LIMIT,
            };
            content.list_latest_posts(token, limit).await?
        }
        Some("all") => content.list_all_posts(token).await?,
        Some("search") => {
            let query = args[1..].join(" ");
            content.search_posts(token, &query).await?
        }
        Some("mine") => {
            let user = auth
                .user
                .as_ref()
                .ok_or(ClientError::MissingResult("signed-in user"))?;
            content.list_user_posts(token, &user.id).await?
        }
        Some(other) => {
            return Err(ClientError::Internal(format!("Unknown command '{}'", other)));
        }
    };
    print_posts(&posts);

    // --- 5. Tear Down ---
    app_state.shutdown().await;
    Ok(())
}

fn print_posts(posts: &[Post]) {
    if posts.is_empty() {
        println!("No posts found.");
        return;
    }
    for post in posts {
        let creator = post
            .creator
            .as_ref()
            .map(|c| c.username.as_str())
            .unwrap_or(post.creator_id.as_str());
        println!(
            "{}  {:<40}  by {:<16}  {}",
            post.created_at.format("%Y-%m-%d %H:%M"),
            post.title,
            creator,
            post.video
        );
    }
}
