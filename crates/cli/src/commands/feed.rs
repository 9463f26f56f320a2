//! Feed command - list canonical posts

use anyhow::{Context, Result};
use skillfeed_adapters::store::SqliteStore;
use skillfeed_domain::{FeedQuery, PostStore, SocialPost};
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;

use crate::args::FeedArgs;
use crate::config::AppConfig;

const PREVIEW_CHARS: usize = 80;

pub async fn execute(args: FeedArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let store = SqliteStore::new(&config.general.database_path)
        .await
        .context("Failed to open database")?;

    let query = FeedQuery {
        platform: args.platform,
        featured_only: args.featured,
        include_hidden: args.include_hidden,
        limit: args.limit,
    };

    let posts = store.list(&query).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
        return Ok(());
    }

    if posts.is_empty() {
        println!("No posts");
        return Ok(());
    }

    for post in &posts {
        print_post(post)?;
    }

    Ok(())
}

fn print_post(post: &SocialPost) -> Result<()> {
    let mut flags = String::new();
    if post.is_featured {
        flags.push_str(" *featured*");
    }
    if post.is_hidden {
        flags.push_str(" (hidden)");
    }

    println!(
        "{} [{}] {} (@{}) score={}{}",
        post.published_at.format(&Rfc3339)?,
        post.platform.label(),
        post.author_name,
        post.author_handle,
        post.engagement_score,
        flags
    );
    println!("  {}", preview(&post.content));
    println!("  {}", post.post_url);

    Ok(())
}

fn preview(content: &str) -> String {
    let single_line = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= PREVIEW_CHARS {
        return single_line;
    }
    let truncated: String = single_line.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", truncated)
}
