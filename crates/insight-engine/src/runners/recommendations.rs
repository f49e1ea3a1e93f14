//! The recommendations pipeline: load pain points, generate one
//! recommendation set, persist it under its `(user, product, type)` key.

use chrono::Utc;
use tracing::{error, info};

use insight_core::models::{
    product_key, JobResults, RecommendationSet, RecommendationsParams, RecommendationsResults,
};

use super::{
    error_message, finalize_failure, finalize_success, is_cancelled, start_job, RunnerContext,
};

pub(crate) async fn run(
    ctx: RunnerContext,
    job_id: String,
    user_id: String,
    params: RecommendationsParams,
    debited: i64,
) {
    if !start_job(&ctx, &job_id).await {
        return;
    }

    let product = product_key(&params.product);

    let pain_points = match ctx.store.list_pain_points(&user_id, Some(&product)).await {
        Ok(points) => points,
        Err(e) => {
            finalize_failure(&ctx, &job_id, &user_id, &e.to_string(), debited).await;
            return;
        }
    };
    if let Err(e) = ctx
        .registry
        .append_log(
            &job_id,
            "load_pain_points",
            format!("Loaded {} pain points", pain_points.len()),
            None,
        )
        .await
    {
        error!(job_id, error = %e, "failed to append step log");
    }
    if pain_points.is_empty() {
        finalize_failure(
            &ctx,
            &job_id,
            &user_id,
            &format!("No pain points found for product '{product}'"),
            debited,
        )
        .await;
        return;
    }
    if is_cancelled(&ctx, &job_id).await {
        return;
    }

    let output = match ctx
        .analyzer
        .generate_recommendations(
            &pain_points,
            &product,
            params.recommendation_type,
            params.context.as_deref(),
        )
        .await
    {
        Ok(output) => output,
        Err(e) => {
            finalize_failure(&ctx, &job_id, &user_id, &error_message(&e), debited).await;
            return;
        }
    };

    let set = RecommendationSet {
        user_id: user_id.clone(),
        product: product.clone(),
        recommendation_type: params.recommendation_type,
        recommendations: output.recommendations,
        summary: output.summary,
        created_at: Utc::now(),
    };
    if let Err(e) = ctx.store.save_recommendations(&set).await {
        finalize_failure(&ctx, &job_id, &user_id, &e.to_string(), debited).await;
        return;
    }

    let results = RecommendationsResults {
        product: product.clone(),
        recommendation_type: params.recommendation_type,
        recommendations_count: set.recommendations.len(),
    };
    info!(
        job_id,
        count = set.recommendations.len(),
        product = %product,
        kind = params.recommendation_type.as_str(),
        "recommendations finished"
    );
    finalize_success(
        &ctx,
        &job_id,
        format!(
            "Generated {} {} recommendations for '{product}'",
            set.recommendations.len(),
            params.recommendation_type.as_str()
        ),
        JobResults::Recommendations(results),
        debited,
    )
    .await;
}
