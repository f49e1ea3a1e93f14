//! The scrape pipeline: resolve subreddits and queries, fan out searches,
//! persist posts. Per-query errors and timeouts are swallowed (logged and
//! skipped); an all-failure run completes with zero posts.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use insight_core::models::{product_key, JobResults, Post, ScrapeParams, ScrapeResults};

use super::{finalize_failure, finalize_success, is_cancelled, start_job, RunnerContext};

pub(crate) async fn run(
    ctx: RunnerContext,
    job_id: String,
    user_id: String,
    params: ScrapeParams,
    debited: i64,
) {
    let started = Utc::now();
    if !start_job(&ctx, &job_id).await {
        return;
    }

    // Step 1: resolve the subreddit set.
    let supplied = params
        .subreddits
        .as_ref()
        .map(|subs| {
            subs.iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|subs| !subs.is_empty());

    let (subreddits, suggested_queries) = match supplied {
        Some(subs) => (subs, None),
        None => match ctx
            .analyzer
            .suggest_subreddits(&params.topic, params.is_custom)
            .await
        {
            Ok(suggestion) if !suggestion.subreddits.is_empty() => {
                let queries = (!suggestion.search_queries.is_empty())
                    .then_some(suggestion.search_queries);
                (suggestion.subreddits, queries)
            }
            Ok(_) => {
                warn!(job_id, topic = %params.topic, "analyzer suggested no subreddits; using defaults");
                (ctx.config.scrape.default_subreddits.clone(), None)
            }
            Err(e) => {
                warn!(job_id, error = %e, "subreddit suggestion failed; using defaults");
                (ctx.config.scrape.default_subreddits.clone(), None)
            }
        },
    };

    log_step(
        &ctx,
        &job_id,
        "subreddits",
        format!("Searching {} subreddits", subreddits.len()),
        Some(json!(subreddits)),
    )
    .await;
    if is_cancelled(&ctx, &job_id).await {
        return;
    }

    // Step 2: resolve search queries; analyzer output wins, otherwise the
    // product-mention defaults.
    let queries = suggested_queries.unwrap_or_else(|| default_queries(&params.topic));
    log_step(
        &ctx,
        &job_id,
        "search_queries",
        format!("Running {} search queries", queries.len()),
        Some(json!(queries)),
    )
    .await;

    // Step 3: fan out, swallowing per-query failures.
    let per_query_limit = (params.limit / queries.len() as u32).max(1);
    let timeout = Duration::from_secs(ctx.config.scrape.per_subreddit_timeout_secs);
    let mut found: Vec<Post> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for query in &queries {
        if is_cancelled(&ctx, &job_id).await {
            return;
        }
        match ctx
            .scraper
            .search(query, &subreddits, per_query_limit, params.time_filter, timeout)
            .await
        {
            Ok(posts) => {
                for post in posts {
                    if seen.insert(post.id.clone()) {
                        found.push(post);
                    }
                }
                log_step(
                    &ctx,
                    &job_id,
                    "find_posts",
                    format!("Found {} posts so far", found.len()),
                    None,
                )
                .await;
            }
            Err(e) => {
                warn!(job_id, query, error = %e, "search failed; continuing with next query");
                log_step(
                    &ctx,
                    &job_id,
                    "find_posts",
                    format!("Search '{query}' failed: {e}"),
                    None,
                )
                .await;
            }
        }
    }

    // Step 4: persist with product attribution.
    let product = product_key(&params.topic);
    let mut saved = 0usize;
    for post in &found {
        let mut post = post.clone();
        post.product = product.clone();
        match ctx.store.save_post(&post).await {
            Ok(()) => saved += 1,
            Err(e) => {
                error!(job_id, post_id = %post.id, error = %e, "failed to save post");
                finalize_failure(&ctx, &job_id, &user_id, &format!("Failed to save posts: {e}"), debited)
                    .await;
                return;
            }
        }
    }
    log_step(
        &ctx,
        &job_id,
        "save_posts",
        format!("Saved {saved} posts"),
        None,
    )
    .await;

    let results = ScrapeResults {
        posts_count: saved,
        total_posts_found: found.len(),
        subreddits_used: subreddits,
        topic: params.topic.clone(),
        duration_minutes: super::minutes_since(started),
    };
    info!(job_id, posts = saved, topic = %params.topic, "scrape finished");
    finalize_success(
        &ctx,
        &job_id,
        format!("Scraped {saved} posts for '{}'", params.topic),
        JobResults::Scrape(results),
        debited,
    )
    .await;
}

/// The classic product-mention query variants, used when the analyzer
/// supplies none.
fn default_queries(topic: &str) -> Vec<String> {
    vec![
        topic.to_string(),
        format!("{topic} issue"),
        format!("{topic} problem"),
        format!("{topic} bug"),
        format!("{topic} feature request"),
    ]
}

async fn log_step(
    ctx: &RunnerContext,
    job_id: &str,
    step: &str,
    message: String,
    details: Option<serde_json::Value>,
) {
    if let Err(e) = ctx.registry.append_log(job_id, step, message, details).await {
        error!(job_id, step, error = %e, "failed to append step log");
    }
}
