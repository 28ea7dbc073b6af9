//! # skillfeed
//!
//! Assembles a backend chosen at compile time, loads the session's
//! following feed and the community directory, and prints both.

#[cfg(all(feature = "api-memory", not(feature = "api-http")))]
mod demo;

use std::sync::Arc;

use configs::AppConfig;
use sf_core::{CommunityApi, FetchScope, Interactable, InteractableApi, Post, Session};
use sf_engine::{CommunityDirectory, Feed};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(feature = "api-http")]
use sf_api_http::HttpApi;

#[cfg(not(any(feature = "api-http", feature = "api-memory")))]
compile_error!("enable a backend feature: `api-http` or `api-memory`");

struct Backend {
    posts: Arc<dyn InteractableApi<Post>>,
    communities: Arc<dyn CommunityApi>,
    session: Session,
}

#[cfg(feature = "api-http")]
fn backend(config: &AppConfig) -> anyhow::Result<Backend> {
    let api = Arc::new(HttpApi::new(&config.api.base_url, config.api.timeout())?);
    info!(base_url = %config.api.base_url, "using http backend");
    Ok(Backend {
        posts: api.clone(),
        communities: api,
        session: config.session()?,
    })
}

#[cfg(all(feature = "api-memory", not(feature = "api-http")))]
fn backend(config: &AppConfig) -> anyhow::Result<Backend> {
    let session = match config.session() {
        Ok(session) => session,
        Err(configs::ConfigError::MissingSession) => demo::session(),
        Err(err) => return Err(err.into()),
    };
    let (posts, communities) = demo::seed(&session);
    info!("using seeded in-memory backend");
    Ok(Backend {
        posts: Arc::new(posts),
        communities: Arc::new(communities),
        session,
    })
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    let json = config.log.json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config);

    let Backend {
        posts,
        communities,
        session,
    } = backend(&config)?;
    info!(user_id = %session.user_id, following = session.following.len(), "session ready");

    let feed = Feed::following(posts, &session);
    feed.set_sort(config.feed.sort);
    feed.set_search(config.feed.search.clone());
    feed.set_category(config.feed.category.clone());

    if let Err(err) = feed.refresh(&session, FetchScope::All).await {
        warn!(error = %err, "could not load the feed");
        eprintln!("{}", err.user_message());
    }

    println!("== Feed ({:?}) ==", config.feed.sort);
    let visible = feed.visible();
    if visible.is_empty() {
        println!("  nothing from the people you follow yet");
    }
    for post in &visible {
        println!(
            "  {} {}{}: {}  [{} likes{}, {} comments]",
            post.created_at.format("%Y-%m-%d %H:%M"),
            post.user_name,
            if post.was_edited() { " (updated)" } else { "" },
            post.content,
            post.likes.len(),
            if post.is_liked_by(session.user_id) { ", incl. you" } else { "" },
            post.comments.len(),
        );
    }

    let directory = CommunityDirectory::new(communities);
    if let Err(err) = directory.refresh(&session).await {
        warn!(error = %err, "could not load communities");
        eprintln!("{}", err.user_message());
    }

    println!("== Communities ==");
    for community in directory.visible() {
        let card = match directory.mount_card(community.id, &session).await {
            Ok(card) => card,
            Err(err) => {
                warn!(community_id = %community.id, error = %err, "membership unknown");
                continue;
            }
        };
        println!(
            "  {}{} [{}]: {}",
            community.name,
            if community.is_private { " (private)" } else { "" },
            community.category,
            if card.is_member() { "member" } else { "not a member" },
        );
    }
    directory.unmount();

    Ok(())
}
