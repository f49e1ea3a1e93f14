//! Product artifacts: post upserts, pain points, the one-analysis-per-pair
//! rule, and recommendation type isolation.

use chrono::Utc;

use insight_core::models::{
    Analysis, PainPoint, Post, Recommendation, RecommendationKind, RecommendationSet, Severity,
};
use insight_storage::StorageEngine;

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn post(id: &str, product: &str) -> Post {
    Post {
        id: id.to_string(),
        title: format!("title {id}"),
        content: "body".to_string(),
        author: "someone".to_string(),
        subreddit: "productivity".to_string(),
        url: format!("https://reddit.com/{id}"),
        created_utc: Utc::now(),
        score: 12,
        num_comments: 3,
        product: product.to_string(),
    }
}

fn pain_point(user: &str, product: &str, topic: &str) -> PainPoint {
    PainPoint {
        user_id: user.to_string(),
        product: product.to_string(),
        topic: topic.to_string(),
        description: format!("description of {topic}"),
        severity: Severity::High,
        potential_solutions: "fix it".to_string(),
        related_keywords: vec!["slow".to_string()],
    }
}

fn recommendation_set(
    user: &str,
    product: &str,
    kind: RecommendationKind,
) -> RecommendationSet {
    RecommendationSet {
        user_id: user.to_string(),
        product: product.to_string(),
        recommendation_type: kind,
        recommendations: vec![Recommendation {
            title: format!("{} idea", kind.as_str()),
            description: "do the thing".to_string(),
            complexity: Severity::Medium,
            impact: Severity::High,
            addresses_pain_points: vec!["sync lag".to_string()],
            most_recent_occurrence: None,
        }],
        summary: Some("summary".to_string()),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn posts_upsert_by_external_id() {
    let engine = StorageEngine::open_in_memory().unwrap();

    engine.save_post(&post("t3_abc", "notion")).await.unwrap();
    let mut updated = post("t3_abc", "notion");
    updated.score = 99;
    engine.save_post(&updated).await.unwrap();

    assert_eq!(engine.count_posts_for_product("notion").await.unwrap(), 1);
    let posts = engine.load_posts_for_product("notion", 10).await.unwrap();
    assert_eq!(posts[0].score, 99);
}

#[tokio::test]
async fn load_posts_respects_limit() {
    let engine = StorageEngine::open_in_memory().unwrap();
    for i in 0..5 {
        engine.save_post(&post(&format!("t3_{i}"), "notion")).await.unwrap();
    }
    let posts = engine.load_posts_for_product("notion", 3).await.unwrap();
    assert_eq!(posts.len(), 3);
}

#[tokio::test]
async fn pain_points_replace_by_stable_id_and_scope_to_user() {
    let engine = StorageEngine::open_in_memory().unwrap();

    engine.save_pain_point(&pain_point("alice", "notion", "sync lag")).await.unwrap();
    let mut revised = pain_point("alice", "notion", "sync lag");
    revised.severity = Severity::Low;
    engine.save_pain_point(&revised).await.unwrap();
    engine.save_pain_point(&pain_point("bob", "notion", "sync lag")).await.unwrap();

    let alices = engine.list_pain_points("alice", Some("notion")).await.unwrap();
    assert_eq!(alices.len(), 1, "same (user, product, topic) replaces");
    assert_eq!(alices[0].severity, Severity::Low);

    assert_eq!(engine.count_pain_points("bob", "notion").await.unwrap(), 1);

    let deleted = engine.delete_pain_points_by_product("alice", "notion").await.unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(engine.count_pain_points("alice", "notion").await.unwrap(), 0);
    assert_eq!(engine.count_pain_points("bob", "notion").await.unwrap(), 1);
}

#[tokio::test]
async fn one_analysis_per_user_product_pair() {
    let engine = StorageEngine::open_in_memory().unwrap();

    let first = Analysis {
        user_id: "alice".to_string(),
        product: "notion".to_string(),
        summary: "first pass".to_string(),
        pain_points: vec![pain_point("alice", "notion", "sync lag")],
        created_at: Utc::now(),
    };
    engine.save_analysis(&first).await.unwrap();

    let mut second = first.clone();
    second.summary = "regenerated".to_string();
    engine.save_analysis(&second).await.unwrap();

    let stored = engine.get_analysis("alice", "notion").await.unwrap().unwrap();
    assert_eq!(stored.summary, "regenerated");

    assert!(engine.delete_analysis("alice", "notion").await.unwrap());
    assert!(engine.get_analysis("alice", "notion").await.unwrap().is_none());
}

#[tokio::test]
async fn recommendation_types_are_isolated() {
    let engine = StorageEngine::open_in_memory().unwrap();

    engine
        .save_recommendations(&recommendation_set("dave", "figma", RecommendationKind::ImproveProduct))
        .await
        .unwrap();
    engine
        .save_recommendations(&recommendation_set("dave", "figma", RecommendationKind::NewFeature))
        .await
        .unwrap();

    let improve = engine
        .get_recommendations("dave", "figma", RecommendationKind::ImproveProduct)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(improve.recommendation_type, RecommendationKind::ImproveProduct);

    let feature = engine
        .get_recommendations("dave", "figma", RecommendationKind::NewFeature)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(feature.recommendation_type, RecommendationKind::NewFeature);
    assert_ne!(improve.recommendations[0].title, feature.recommendations[0].title);

    // A type with no stored document is simply absent.
    assert!(engine
        .get_recommendations("dave", "figma", RecommendationKind::CompetingProduct)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn regenerating_a_type_overwrites_only_that_type() {
    let engine = StorageEngine::open_in_memory().unwrap();

    engine
        .save_recommendations(&recommendation_set("dave", "figma", RecommendationKind::ImproveProduct))
        .await
        .unwrap();
    engine
        .save_recommendations(&recommendation_set("dave", "figma", RecommendationKind::NewFeature))
        .await
        .unwrap();

    let mut replacement = recommendation_set("dave", "figma", RecommendationKind::ImproveProduct);
    replacement.recommendations[0].title = "second round".to_string();
    engine.save_recommendations(&replacement).await.unwrap();

    let improve = engine
        .get_recommendations("dave", "figma", RecommendationKind::ImproveProduct)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(improve.recommendations[0].title, "second round");

    let feature = engine
        .get_recommendations("dave", "figma", RecommendationKind::NewFeature)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(feature.recommendations[0].title, "new_feature idea");
}

#[tokio::test]
async fn delete_by_product_clears_every_type_for_one_user() {
    let engine = StorageEngine::open_in_memory().unwrap();

    for kind in [
        RecommendationKind::ImproveProduct,
        RecommendationKind::NewFeature,
        RecommendationKind::CompetingProduct,
    ] {
        engine
            .save_recommendations(&recommendation_set("dave", "figma", kind))
            .await
            .unwrap();
    }
    engine
        .save_recommendations(&recommendation_set("erin", "figma", RecommendationKind::NewFeature))
        .await
        .unwrap();

    let deleted = engine.delete_recommendations_by_product("dave", "figma").await.unwrap();
    assert_eq!(deleted, 3);

    assert!(engine
        .get_recommendations("dave", "figma", RecommendationKind::ImproveProduct)
        .await
        .unwrap()
        .is_none());
    assert!(engine
        .get_recommendations("erin", "figma", RecommendationKind::NewFeature)
        .await
        .unwrap()
        .is_some());
}
