//! v001: users, jobs, job logs, posts, pain points, analyses,
//! recommendations.

use rusqlite::Connection;

use insight_core::errors::InsightResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> InsightResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL,
            email         TEXT,
            credits       INTEGER NOT NULL DEFAULT 0 CHECK (credits >= 0),
            created_at    TEXT NOT NULL,
            last_login    TEXT
        );

        CREATE TABLE IF NOT EXISTS jobs (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL,
            job_type     TEXT NOT NULL,
            state        TEXT NOT NULL,
            product      TEXT,
            parameters   TEXT NOT NULL,
            results      TEXT,
            error        TEXT,
            credits_used INTEGER,
            created_at   TEXT NOT NULL,
            started_at   TEXT,
            completed_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_user
            ON jobs(user_id);
        CREATE INDEX IF NOT EXISTS idx_jobs_state
            ON jobs(state);
        CREATE INDEX IF NOT EXISTS idx_jobs_user_created
            ON jobs(user_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS job_logs (
            seq       INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id    TEXT NOT NULL,
            step      TEXT NOT NULL,
            message   TEXT NOT NULL,
            details   TEXT,
            timestamp TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_job_logs_job
            ON job_logs(job_id, seq);

        CREATE TABLE IF NOT EXISTS posts (
            id           TEXT PRIMARY KEY,
            title        TEXT NOT NULL,
            content      TEXT NOT NULL,
            author       TEXT NOT NULL,
            subreddit    TEXT NOT NULL,
            url          TEXT NOT NULL,
            created_utc  TEXT NOT NULL,
            score        INTEGER NOT NULL,
            num_comments INTEGER NOT NULL,
            product      TEXT NOT NULL,
            saved_at     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_product
            ON posts(product);
        CREATE INDEX IF NOT EXISTS idx_posts_product_subreddit
            ON posts(product, subreddit);

        CREATE TABLE IF NOT EXISTS pain_points (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL,
            product             TEXT NOT NULL,
            topic               TEXT NOT NULL,
            description         TEXT NOT NULL,
            severity            TEXT NOT NULL,
            potential_solutions TEXT NOT NULL,
            related_keywords    TEXT NOT NULL,
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_pain_points_user_product
            ON pain_points(user_id, product);
        CREATE INDEX IF NOT EXISTS idx_pain_points_product
            ON pain_points(product);

        CREATE TABLE IF NOT EXISTS analyses (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            product     TEXT NOT NULL,
            summary     TEXT NOT NULL,
            pain_points TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_analyses_user_product
            ON analyses(user_id, product);

        CREATE TABLE IF NOT EXISTS recommendations (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL,
            product             TEXT NOT NULL,
            recommendation_type TEXT NOT NULL,
            recommendations     TEXT NOT NULL,
            summary             TEXT,
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_recommendations_product
            ON recommendations(product);
        ",
    )
    .map_err(to_storage_err)?;
    Ok(())
}
