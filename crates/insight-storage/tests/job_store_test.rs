//! Job rows: creation, conditional state updates, log appends, listing,
//! and the stuck-job scan.

use chrono::{Duration, Utc};

use insight_core::models::{
    AnalysisParams, JobParameters, JobState, LogEntry, ScrapeParams, TimeFilter,
};
use insight_storage::{JobPatch, StorageEngine};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn scrape_params(topic: &str) -> JobParameters {
    JobParameters::Scrape(ScrapeParams {
        topic: topic.to_string(),
        limit: 10,
        time_filter: TimeFilter::Day,
        is_custom: false,
        subreddits: None,
    })
}

fn analysis_params(product: &str) -> JobParameters {
    JobParameters::Analysis(AnalysisParams {
        product: product.to_string(),
        max_posts: 500,
        skip_recommendations: false,
        regenerate: false,
    })
}

async fn engine() -> StorageEngine {
    StorageEngine::open_in_memory().unwrap()
}

#[tokio::test]
async fn create_job_starts_pending_with_typed_parameters() {
    let engine = engine().await;
    let job_id = engine.create_job("alice", &scrape_params("Notion")).await.unwrap();

    let job = engine.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.user_id, "alice");
    assert_eq!(job.state, JobState::Pending);
    assert!(job.started_at.is_none());
    assert!(job.completed_at.is_none());
    assert!(job.results.is_none());
    assert!(job.credits_used.is_none());
    assert!(job.logs.is_empty());
    match job.parameters {
        JobParameters::Scrape(p) => assert_eq!(p.topic, "Notion"),
        other => panic!("unexpected parameters: {other:?}"),
    }
}

#[tokio::test]
async fn in_progress_defaults_started_at() {
    let engine = engine().await;
    let job_id = engine.create_job("alice", &scrape_params("Notion")).await.unwrap();

    let updated = engine
        .update_job_state(&job_id, JobState::InProgress, &JobPatch::default(), None)
        .await
        .unwrap();
    assert!(updated);

    let job = engine.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::InProgress);
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_none());
}

#[tokio::test]
async fn terminal_defaults_completed_at_and_sets_patch_fields() {
    let engine = engine().await;
    let job_id = engine.create_job("alice", &scrape_params("Notion")).await.unwrap();
    engine
        .update_job_state(&job_id, JobState::InProgress, &JobPatch::default(), None)
        .await
        .unwrap();

    let patch = JobPatch {
        error: Some("boom".to_string()),
        credits_used: Some(2),
        ..Default::default()
    };
    engine
        .update_job_state(&job_id, JobState::Failed, &patch, None)
        .await
        .unwrap();

    let job = engine.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error.as_deref(), Some("boom"));
    assert_eq!(job.credits_used, Some(2));
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn from_state_predicate_rejects_transitions_out_of_terminal() {
    let engine = engine().await;
    let job_id = engine.create_job("alice", &scrape_params("Notion")).await.unwrap();

    engine
        .update_job_state(
            &job_id,
            JobState::Cancelled,
            &JobPatch::default(),
            Some(&[JobState::Pending]),
        )
        .await
        .unwrap();

    // A runner trying to complete afterwards must be rejected.
    let won = engine
        .update_job_state(
            &job_id,
            JobState::Completed,
            &JobPatch::default(),
            Some(&[JobState::InProgress]),
        )
        .await
        .unwrap();
    assert!(!won);

    let job = engine.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Cancelled);
}

#[tokio::test]
async fn log_appends_preserve_order() {
    let engine = engine().await;
    let job_id = engine.create_job("alice", &scrape_params("Notion")).await.unwrap();

    for step in ["subreddits", "search_queries", "find_posts", "completed"] {
        let appended = engine
            .append_job_log(&job_id, &LogEntry::new(step, format!("msg {step}"), None))
            .await
            .unwrap();
        assert!(appended);
    }

    let job = engine.get_job(&job_id).await.unwrap().unwrap();
    let steps: Vec<&str> = job.logs.iter().map(|l| l.step.as_str()).collect();
    assert_eq!(steps, ["subreddits", "search_queries", "find_posts", "completed"]);
    assert!(job
        .logs
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
}

#[tokio::test]
async fn log_append_against_unknown_job_is_rejected() {
    let engine = engine().await;
    let appended = engine
        .append_job_log("no-such-job", &LogEntry::new("step", "msg", None))
        .await
        .unwrap();
    assert!(!appended);
}

#[tokio::test]
async fn list_user_jobs_newest_first_with_state_filter() {
    let engine = engine().await;
    let first = engine.create_job("alice", &scrape_params("Notion")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = engine.create_job("alice", &analysis_params("notion")).await.unwrap();
    engine.create_job("bob", &scrape_params("Slack")).await.unwrap();

    engine
        .update_job_state(&first, JobState::InProgress, &JobPatch::default(), None)
        .await
        .unwrap();

    let all = engine.list_user_jobs("alice", None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, second, "newest first");
    assert_eq!(all[1].id, first);

    let pending = engine
        .list_user_jobs("alice", Some(JobState::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second);
}

#[tokio::test]
async fn find_stuck_jobs_splits_by_state_and_cutoff() {
    let engine = engine().await;

    let stuck_running = engine.create_job("alice", &scrape_params("Notion")).await.unwrap();
    let old_start = JobPatch {
        started_at: Some(Utc::now() - Duration::minutes(45)),
        ..Default::default()
    };
    engine
        .update_job_state(&stuck_running, JobState::InProgress, &old_start, None)
        .await
        .unwrap();

    let fresh_running = engine.create_job("alice", &scrape_params("Slack")).await.unwrap();
    engine
        .update_job_state(&fresh_running, JobState::InProgress, &JobPatch::default(), None)
        .await
        .unwrap();

    // A pending job created now is not stuck; only backdated rows are.
    engine.create_job("alice", &analysis_params("slack")).await.unwrap();

    let cutoff = Utc::now() - Duration::minutes(30);
    let (in_progress, pending) = engine.find_stuck_jobs(cutoff).await.unwrap();

    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].id, stuck_running);
    assert!(pending.is_empty());
}

#[tokio::test]
async fn list_products_is_distinct_over_user_jobs() {
    let engine = engine().await;
    engine.create_job("alice", &scrape_params("Notion")).await.unwrap();
    engine.create_job("alice", &analysis_params("notion")).await.unwrap();
    engine.create_job("alice", &scrape_params("Figma")).await.unwrap();
    engine.create_job("bob", &scrape_params("Slack")).await.unwrap();

    let products = engine.list_products("alice").await.unwrap();
    assert_eq!(products, ["figma", "notion"]);
}
