//! Pain points, analyses, and recommendation sets: upsert-by-key and
//! delete-by-(user, product[, type]).

use chrono::Utc;
use rusqlite::{params, Connection};

use insight_core::errors::InsightResult;
use insight_core::models::{
    Analysis, PainPoint, RecommendationKind, RecommendationSet, Severity,
};

use super::{parse_dt, OptionalRow};
use crate::to_storage_err;

pub fn save_pain_point(conn: &Connection, pain_point: &PainPoint) -> InsightResult<()> {
    let keywords = serde_json::to_string(&pain_point.related_keywords)?;
    conn.execute(
        "INSERT INTO pain_points (
            id, user_id, product, topic, description, severity,
            potential_solutions, related_keywords, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            description = excluded.description,
            severity = excluded.severity,
            potential_solutions = excluded.potential_solutions,
            related_keywords = excluded.related_keywords",
        params![
            pain_point.stable_id(),
            pain_point.user_id,
            pain_point.product,
            pain_point.topic,
            pain_point.description,
            pain_point.severity.as_str(),
            pain_point.potential_solutions,
            keywords,
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(to_storage_err)?;
    Ok(())
}

pub fn list_pain_points(
    conn: &Connection,
    user_id: &str,
    product: Option<&str>,
) -> InsightResult<Vec<PainPoint>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match product {
        Some(p) => (
            "SELECT user_id, product, topic, description, severity,
                    potential_solutions, related_keywords
             FROM pain_points WHERE user_id = ?1 AND product = ?2"
                .to_string(),
            vec![
                Box::new(user_id.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(p.to_string()),
            ],
        ),
        None => (
            "SELECT user_id, product, topic, description, severity,
                    potential_solutions, related_keywords
             FROM pain_points WHERE user_id = ?1"
                .to_string(),
            vec![Box::new(user_id.to_string()) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql).map_err(to_storage_err)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let rows = stmt
        .query_map(params_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .map_err(to_storage_err)?;

    let mut out = Vec::new();
    for row in rows {
        let (user_id, product, topic, description, severity, potential_solutions, keywords_json) =
            row.map_err(to_storage_err)?;
        out.push(PainPoint {
            user_id,
            product,
            topic,
            description,
            severity: parse_severity(&severity)?,
            potential_solutions,
            related_keywords: serde_json::from_str(&keywords_json)?,
        });
    }
    Ok(out)
}

pub fn count_pain_points(conn: &Connection, user_id: &str, product: &str) -> InsightResult<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM pain_points WHERE user_id = ?1 AND product = ?2",
        params![user_id, product],
        |row| row.get::<_, i64>(0),
    )
    .map(|c| c as u64)
    .map_err(to_storage_err)
}

pub fn delete_pain_points_by_product(
    conn: &Connection,
    user_id: &str,
    product: &str,
) -> InsightResult<u64> {
    conn.execute(
        "DELETE FROM pain_points WHERE user_id = ?1 AND product = ?2",
        params![user_id, product],
    )
    .map(|c| c as u64)
    .map_err(to_storage_err)
}

/// Upsert the analysis document for `(user, product)`.
pub fn save_analysis(conn: &Connection, analysis: &Analysis) -> InsightResult<()> {
    let pain_points = serde_json::to_string(&analysis.pain_points)?;
    let doc_id = format!("{}:{}", analysis.user_id, analysis.product);
    conn.execute(
        "INSERT INTO analyses (id, user_id, product, summary, pain_points, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            summary = excluded.summary,
            pain_points = excluded.pain_points,
            created_at = excluded.created_at",
        params![
            doc_id,
            analysis.user_id,
            analysis.product,
            analysis.summary,
            pain_points,
            analysis.created_at.to_rfc3339(),
        ],
    )
    .map_err(to_storage_err)?;
    Ok(())
}

pub fn get_analysis(
    conn: &Connection,
    user_id: &str,
    product: &str,
) -> InsightResult<Option<Analysis>> {
    let mut stmt = conn
        .prepare(
            "SELECT user_id, product, summary, pain_points, created_at
             FROM analyses WHERE user_id = ?1 AND product = ?2",
        )
        .map_err(to_storage_err)?;

    let row = stmt
        .query_row(params![user_id, product], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .optional()
        .map_err(to_storage_err)?;

    match row {
        Some((user_id, product, summary, pain_points_json, created_at)) => Ok(Some(Analysis {
            user_id,
            product,
            summary,
            pain_points: serde_json::from_str(&pain_points_json)?,
            created_at: parse_dt(&created_at)?,
        })),
        None => Ok(None),
    }
}

pub fn delete_analysis(conn: &Connection, user_id: &str, product: &str) -> InsightResult<bool> {
    let changed = conn
        .execute(
            "DELETE FROM analyses WHERE user_id = ?1 AND product = ?2",
            params![user_id, product],
        )
        .map_err(to_storage_err)?;
    Ok(changed > 0)
}

/// Upsert the recommendation document for `(user, product, type)`. Distinct
/// types never overwrite each other.
pub fn save_recommendations(conn: &Connection, set: &RecommendationSet) -> InsightResult<()> {
    let recommendations = serde_json::to_string(&set.recommendations)?;
    let doc_id = format!(
        "{}:{}:{}",
        set.user_id,
        set.product,
        set.recommendation_type.as_str()
    );
    conn.execute(
        "INSERT INTO recommendations (
            id, user_id, product, recommendation_type, recommendations, summary, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(id) DO UPDATE SET
            recommendations = excluded.recommendations,
            summary = excluded.summary,
            created_at = excluded.created_at",
        params![
            doc_id,
            set.user_id,
            set.product,
            set.recommendation_type.as_str(),
            recommendations,
            set.summary,
            set.created_at.to_rfc3339(),
        ],
    )
    .map_err(to_storage_err)?;
    Ok(())
}

pub fn get_recommendations(
    conn: &Connection,
    user_id: &str,
    product: &str,
    kind: RecommendationKind,
) -> InsightResult<Option<RecommendationSet>> {
    let mut stmt = conn
        .prepare(
            "SELECT user_id, product, recommendation_type, recommendations, summary, created_at
             FROM recommendations
             WHERE user_id = ?1 AND product = ?2 AND recommendation_type = ?3",
        )
        .map_err(to_storage_err)?;

    let row = stmt
        .query_row(params![user_id, product, kind.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .optional()
        .map_err(to_storage_err)?;

    match row {
        Some((user_id, product, type_str, recs_json, summary, created_at)) => {
            let recommendation_type = RecommendationKind::parse(&type_str).ok_or_else(|| {
                insight_core::errors::InsightError::Storage(
                    insight_core::errors::StorageError::Sqlite {
                        message: format!("unknown recommendation_type '{type_str}'"),
                    },
                )
            })?;
            Ok(Some(RecommendationSet {
                user_id,
                product,
                recommendation_type,
                recommendations: serde_json::from_str(&recs_json)?,
                summary,
                created_at: parse_dt(&created_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Delete all recommendation documents (every type) for `(user, product)`.
pub fn delete_recommendations_by_product(
    conn: &Connection,
    user_id: &str,
    product: &str,
) -> InsightResult<u64> {
    conn.execute(
        "DELETE FROM recommendations WHERE user_id = ?1 AND product = ?2",
        params![user_id, product],
    )
    .map(|c| c as u64)
    .map_err(to_storage_err)
}

fn parse_severity(s: &str) -> InsightResult<Severity> {
    Severity::parse(s).ok_or_else(|| {
        insight_core::errors::InsightError::Storage(insight_core::errors::StorageError::Sqlite {
            message: format!("unknown severity '{s}'"),
        })
    })
}
