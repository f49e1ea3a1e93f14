//! The analysis pipeline: load posts, extract pain points, persist the
//! analysis document, and best-effort improve-product recommendations.

use chrono::Utc;
use tracing::{error, info, warn};

use insight_core::models::{
    product_key, Analysis, AnalysisParams, AnalysisResults, JobResults, PainPoint,
    RecommendationKind, RecommendationSet,
};

use super::{
    error_message, finalize_failure, finalize_success, is_cancelled, start_job, RunnerContext,
};

pub(crate) async fn run(
    ctx: RunnerContext,
    job_id: String,
    user_id: String,
    params: AnalysisParams,
    debited: i64,
) {
    let started = Utc::now();
    if !start_job(&ctx, &job_id).await {
        return;
    }

    let product = product_key(&params.product);

    // Load the scraped corpus. Admission verified posts exist, but the
    // corpus may have been deleted since.
    let posts = match ctx
        .store
        .load_posts_for_product(&product, params.max_posts)
        .await
    {
        Ok(posts) => posts,
        Err(e) => {
            finalize_failure(&ctx, &job_id, &user_id, &e.to_string(), debited).await;
            return;
        }
    };
    if let Err(e) = ctx
        .registry
        .append_log(
            &job_id,
            "load_posts",
            format!("Loaded {} posts for analysis", posts.len()),
            None,
        )
        .await
    {
        error!(job_id, error = %e, "failed to append step log");
    }
    if posts.is_empty() {
        finalize_failure(
            &ctx,
            &job_id,
            &user_id,
            &format!("No posts found for product '{product}'"),
            debited,
        )
        .await;
        return;
    }
    if is_cancelled(&ctx, &job_id).await {
        return;
    }

    let analysis_output = match ctx.analyzer.analyze_pain_points(&posts, &product).await {
        Ok(output) => output,
        Err(e) => {
            finalize_failure(&ctx, &job_id, &user_id, &error_message(&e), debited).await;
            return;
        }
    };

    let pain_points: Vec<PainPoint> = analysis_output
        .pain_points
        .iter()
        .map(|finding| PainPoint {
            user_id: user_id.clone(),
            product: product.clone(),
            topic: finding.name.clone(),
            description: finding.description.clone(),
            severity: finding.severity,
            potential_solutions: finding.potential_solutions.clone(),
            related_keywords: finding.related_keywords.clone(),
        })
        .collect();

    let analysis = Analysis {
        user_id: user_id.clone(),
        product: product.clone(),
        summary: analysis_output.summary,
        pain_points: pain_points.clone(),
        created_at: Utc::now(),
    };
    if let Err(e) = ctx.store.save_analysis(&analysis).await {
        finalize_failure(&ctx, &job_id, &user_id, &e.to_string(), debited).await;
        return;
    }
    for pain_point in &pain_points {
        if let Err(e) = ctx.store.save_pain_point(pain_point).await {
            finalize_failure(&ctx, &job_id, &user_id, &e.to_string(), debited).await;
            return;
        }
    }

    // Best-effort recommendations: a failure here is logged, never fatal.
    let mut recommendations_count = 0;
    if !params.skip_recommendations {
        match ctx
            .analyzer
            .generate_recommendations(
                &pain_points,
                &product,
                RecommendationKind::ImproveProduct,
                None,
            )
            .await
        {
            Ok(output) => {
                let set = RecommendationSet {
                    user_id: user_id.clone(),
                    product: product.clone(),
                    recommendation_type: RecommendationKind::ImproveProduct,
                    recommendations: output.recommendations,
                    summary: output.summary,
                    created_at: Utc::now(),
                };
                match ctx.store.save_recommendations(&set).await {
                    Ok(()) => recommendations_count = set.recommendations.len(),
                    Err(e) => warn!(job_id, error = %e, "failed to save recommendations"),
                }
            }
            Err(e) => {
                warn!(job_id, error = %e, "recommendation generation failed; continuing");
            }
        }
    }

    let results = AnalysisResults {
        pain_points_count: pain_points.len(),
        recommendations_count,
        product: product.clone(),
        duration_minutes: super::minutes_since(started),
    };
    info!(
        job_id,
        pain_points = pain_points.len(),
        product = %product,
        "analysis finished"
    );
    finalize_success(
        &ctx,
        &job_id,
        format!(
            "Identified {} pain points for '{product}'",
            pain_points.len()
        ),
        JobResults::Analysis(results),
        debited,
    )
    .await;
}
