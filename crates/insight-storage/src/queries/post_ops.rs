//! Scraped post rows: upsert-by-id with product attribution.

use chrono::Utc;
use rusqlite::{params, Connection};

use insight_core::errors::InsightResult;
use insight_core::models::Post;

use super::parse_dt;
use crate::to_storage_err;

/// Insert or update a post by its external id.
pub fn save_post(conn: &Connection, post: &Post) -> InsightResult<()> {
    conn.execute(
        "INSERT INTO posts (
            id, title, content, author, subreddit, url, created_utc,
            score, num_comments, product, saved_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            content = excluded.content,
            author = excluded.author,
            subreddit = excluded.subreddit,
            url = excluded.url,
            created_utc = excluded.created_utc,
            score = excluded.score,
            num_comments = excluded.num_comments,
            product = excluded.product",
        params![
            post.id,
            post.title,
            post.content,
            post.author,
            post.subreddit,
            post.url,
            post.created_utc.to_rfc3339(),
            post.score,
            post.num_comments,
            post.product,
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(to_storage_err)?;
    Ok(())
}

pub fn count_posts_for_product(conn: &Connection, product: &str) -> InsightResult<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE product = ?1",
        params![product],
        |row| row.get::<_, i64>(0),
    )
    .map(|c| c as u64)
    .map_err(to_storage_err)
}

/// Load up to `limit` posts for a product, most recent first.
pub fn load_posts_for_product(
    conn: &Connection,
    product: &str,
    limit: u32,
) -> InsightResult<Vec<Post>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, title, content, author, subreddit, url, created_utc,
                    score, num_comments, product
             FROM posts WHERE product = ?1
             ORDER BY created_utc DESC
             LIMIT ?2",
        )
        .map_err(to_storage_err)?;

    let rows = stmt
        .query_map(params![product, limit], |row| Ok(row_to_post(row)))
        .map_err(to_storage_err)?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row.map_err(to_storage_err)??);
    }
    Ok(posts)
}

fn row_to_post(row: &rusqlite::Row<'_>) -> InsightResult<Post> {
    let created_utc: String = row.get(6).map_err(to_storage_err)?;
    Ok(Post {
        id: row.get(0).map_err(to_storage_err)?,
        title: row.get(1).map_err(to_storage_err)?,
        content: row.get(2).map_err(to_storage_err)?,
        author: row.get(3).map_err(to_storage_err)?,
        subreddit: row.get(4).map_err(to_storage_err)?,
        url: row.get(5).map_err(to_storage_err)?,
        created_utc: parse_dt(&created_utc)?,
        score: row.get(7).map_err(to_storage_err)?,
        num_comments: row.get(8).map_err(to_storage_err)?,
        product: row.get(9).map_err(to_storage_err)?,
    })
}
