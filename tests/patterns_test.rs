//! Pattern ranking

use std::sync::Arc;

use creator_persona::patterns::weighted_score;
use creator_persona::{
    Config, ContentResult, Goal, MemoryStore, Personalizer, Platform, PromptParams, StaticEntitlements, TemplateGenerator,
    Tone,
};

fn service(store: Arc<MemoryStore>) -> Personalizer {
    Personalizer::new(
        store,
        Arc::new(TemplateGenerator::new()),
        Arc::new(StaticEntitlements::default()),
        &Config::default(),
    )
}

#[test]
fn test_shrinkage_favors_sample_count() {
    let k = Config::default().patterns.confidence_samples;
    assert!(weighted_score(90.0, 1, k) < weighted_score(70.0, 10, k));
}

#[tokio::test]
async fn test_many_samples_outrank_single_outlier() {
    let service = service(Arc::new(MemoryStore::new()));
    let lifestyle = PromptParams::new(Platform::TikTok)
        .with_category("creator", "lifestyle")
        .unwrap()
        .with_goal(Goal::Views);
    let funny = lifestyle.clone().with_tone(Tone::Funny);
    let serious = lifestyle.with_tone(Tone::Serious);
    assert_eq!(funny.pattern_key().to_string(), "tiktok/creator/lifestyle/funny/views");

    for i in 0..8 {
        let result = ContentResult::new(&format!("funny-{}", i), "u1", funny.clone(), 1200).with_engagement_rate(8.0);
        service.record_result(&result).await.unwrap();
    }
    let outlier = ContentResult::new("serious-0", "u1", serious.clone(), 400).with_engagement_rate(20.0);
    service.record_result(&outlier).await.unwrap();

    let best = service.top_patterns("u1", &[Platform::TikTok], 1).await.unwrap();
    assert_eq!(best.len(), 1);
    assert_eq!(best[0].pattern_key, funny.pattern_key());

    let top = service.top_patterns("u1", &[Platform::TikTok], 5).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].pattern_key, funny.pattern_key());
    assert_eq!(top[0].total_results, 8);
    assert_eq!(top[1].pattern_key, serious.pattern_key());
    assert!(top[0].weighted_score > top[1].weighted_score);
}

#[tokio::test]
async fn test_rerecorded_result_does_not_double_count() {
    let service = service(Arc::new(MemoryStore::new()));
    let params = PromptParams::new(Platform::LinkedIn).with_tone(Tone::Educational);
    let result = ContentResult::new("r1", "u1", params.clone(), 500).with_engagement_rate(3.0);

    service.record_result(&result).await.unwrap();
    let updated = ContentResult::new("r1", "u1", params, 900).with_engagement_rate(5.0);
    let recorded = service.record_result(&updated).await.unwrap();

    assert!(!recorded.newly_recorded);
    assert_eq!(recorded.stats.total_results, 1);
    assert!((recorded.stats.avg_engagement_rate - 5.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_platform_filter() {
    let service = service(Arc::new(MemoryStore::new()));
    for (id, platform) in [("a", Platform::X), ("b", Platform::YouTube)] {
        let result = ContentResult::new(id, "u1", PromptParams::new(platform).with_tone(Tone::Casual), 100)
            .with_engagement_rate(2.0);
        service.record_result(&result).await.unwrap();
    }

    let youtube = service.top_patterns("u1", &[Platform::YouTube], 10).await.unwrap();
    assert_eq!(youtube.len(), 1);
    assert_eq!(youtube[0].pattern_key.platform, Platform::YouTube);
    assert_eq!(service.top_patterns("u1", &[], 10).await.unwrap().len(), 2);
}
