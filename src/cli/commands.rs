use std::sync::Arc;

use crate::app::{AppContext, Result, WatcherError};
use crate::config::{ConfigProvider, StaticConfigProvider};
use crate::domain::BlogTarget;
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::store::{HistoryStore, StateStore};

pub async fn run(
    ctx: &AppContext,
    provider: Arc<dyn ConfigProvider>,
    once: bool,
    interval: Option<&str>,
) -> Result<()> {
    let watcher = Arc::new(ctx.watcher(provider));

    if once {
        let summary = watcher.check_all().await;
        println!(
            "Checked {} blogs: {} updated, {} initial, {} failed",
            summary.checked, summary.changed, summary.initial, summary.failed
        );
        return Ok(());
    }

    let interval_secs = match interval {
        Some(s) => SchedulerConfig::parse_interval(s).map_err(WatcherError::Config)?,
        None => ctx.config.watcher.interval_secs,
    };

    let scheduler = Scheduler::new(
        watcher,
        SchedulerConfig {
            interval_secs,
            update_on_start: ctx.config.watcher.update_on_start,
        },
    );
    scheduler.run().await;
    Ok(())
}

pub async fn check(ctx: &AppContext, url: &str) -> Result<()> {
    let blog = find_blog(ctx, url)?;
    let provider = Arc::new(StaticConfigProvider::new(ctx.config.clone()));
    let watcher = ctx.watcher(provider);

    let result = watcher.check_blog(&blog).await?;

    println!("{} ({})", blog.display_name(), blog.id);
    println!("  HTTP status: {}", result.http_status);
    let verdict = match (result.is_initial, result.changed) {
        (true, _) => "initial sync",
        (false, true) => "changed",
        (false, false) => "unchanged",
    };
    println!("  Result:      {}", verdict);
    if let Some(fingerprint) = &result.url_fingerprint {
        println!("  Fingerprint: {}", fingerprint);
    }
    Ok(())
}

pub fn history(ctx: &AppContext, url: &str, limit: usize) -> Result<()> {
    let blog = find_blog(ctx, url)?;
    let entries = ctx.store.list_by_blog(&blog.id, limit)?;

    if entries.is_empty() {
        println!("No checks recorded for {}", blog.id);
        return Ok(());
    }

    for entry in entries {
        let status = entry
            .http_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "---".to_string());
        let outcome = match (&entry.error_message, entry.changed) {
            (Some(error), _) => format!("error: {}", error),
            (None, true) => "changed".to_string(),
            (None, false) => "unchanged".to_string(),
        };
        println!(
            "{} {} {}",
            entry.checked_at.format("%Y-%m-%d %H:%M:%S"),
            status,
            outcome
        );
    }

    Ok(())
}

pub fn list_states(ctx: &AppContext) -> Result<()> {
    let states = ctx.store.list_all()?;

    if states.is_empty() {
        println!("No blogs checked yet");
        return Ok(());
    }

    for state in states {
        let changed = state
            .last_changed_at
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{}\n  checked {}, last change {}, {} entries",
            state.blog_id,
            state.last_checked_at.format("%Y-%m-%d %H:%M"),
            changed,
            state.entry_keys().len()
        );
        if let Some(feed) = &state.feed_url {
            println!("  feed:    {}", feed);
        }
        if let Some(sitemap) = &state.sitemap_url {
            println!("  sitemap: {}", sitemap);
        }
    }

    Ok(())
}

pub fn forget(ctx: &AppContext, url: &str) -> Result<()> {
    let blog = find_blog(ctx, url)?;

    if ctx.store.get(&blog.id)?.is_none() {
        println!("No stored state for {}", blog.id);
        return Ok(());
    }

    ctx.store.delete(&blog.id)?;
    println!("Forgot {}", blog.id);
    Ok(())
}

/// The configured blog with the same id as `url`, or an unnamed target.
fn find_blog(ctx: &AppContext, url: &str) -> Result<BlogTarget> {
    let target = BlogTarget::new("", url)?;
    let configured = ctx.config.blogs()?.into_iter().find(|blog| blog.id == target.id);
    Ok(configured.unwrap_or(target))
}
