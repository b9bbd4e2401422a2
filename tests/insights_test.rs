//! Weekly insights

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use mockall::mock;
use std::sync::Arc;

use creator_persona::error::GenerationError;
use creator_persona::generation::{ContentGenerator, GenerationRequest, Purpose};
use creator_persona::insights::RecommendationKind;
use creator_persona::{
    Config, ContentResult, Format, MemoryStore, Personalizer, Platform, PromptParams, StaticEntitlements, Tone,
    WeekPeriod,
};

mock! {
    pub Writer {}

    #[async_trait]
    impl ContentGenerator for Writer {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
    }
}

fn week() -> WeekPeriod {
    "2024-W10".parse().unwrap()
}

fn result(id: &str, day: u32, views: u64, rate: f64, tone: Tone, format: Format) -> ContentResult {
    let params = PromptParams::new(Platform::Instagram).with_tone(tone).with_format(format);
    ContentResult::new(id, "u1", params, views)
        .with_engagement_rate(rate)
        .posted_at(Utc.with_ymd_and_hms(2024, 3, day, 9, 30, 0).unwrap())
}

fn service(store: Arc<MemoryStore>, writer: MockWriter) -> Personalizer {
    Personalizer::new(
        store,
        Arc::new(writer),
        Arc::new(StaticEntitlements::default()),
        &Config::default(),
    )
}

#[tokio::test]
async fn test_fewer_than_three_results_is_none() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store, MockWriter::new());
    // 2024-W10 runs March 4-10
    service.record_result(&result("a", 4, 100, 3.0, Tone::Funny, Format::Listicle)).await.unwrap();
    service.record_result(&result("b", 5, 100, 3.0, Tone::Funny, Format::Listicle)).await.unwrap();
    // Outside the week
    service.record_result(&result("c", 11, 100, 3.0, Tone::Funny, Format::Listicle)).await.unwrap();

    assert!(service.generate_weekly("u1", week()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_zero_prior_views_reports_no_change() {
    let store = Arc::new(MemoryStore::new());
    let mut writer = MockWriter::new();
    writer
        .expect_generate()
        .withf(|r| r.purpose == Purpose::WeeklySummary && r.context.contains("Posts this week: 3"))
        .times(1)
        .returning(|_| Ok("A strong week led by tutorials.".to_string()));
    let service = service(store, writer);

    // Previous week: posted but never viewed
    service.record_result(&result("p1", 1, 0, 0.0, Tone::Funny, Format::Listicle)).await.unwrap();
    service.record_result(&result("p2", 2, 0, 0.0, Tone::Funny, Format::Listicle)).await.unwrap();

    service.record_result(&result("a", 4, 800, 7.0, Tone::Educational, Format::Tutorial)).await.unwrap();
    service.record_result(&result("b", 6, 1200, 9.0, Tone::Educational, Format::Tutorial)).await.unwrap();
    service.record_result(&result("c", 10, 300, 2.0, Tone::Funny, Format::Listicle)).await.unwrap();

    let insight = service.generate_weekly("u1", week()).await.unwrap().unwrap();
    assert_eq!(insight.week_id, "2024-W10");
    assert_eq!(insight.period_start, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    assert_eq!(insight.period_end, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    assert_eq!(insight.totals.posts, 3);
    assert_eq!(insight.totals.views, 2300);
    assert_eq!(insight.previous_totals.posts, 2);
    assert_eq!(insight.week_over_week.views_change, 0.0);
    assert!((insight.week_over_week.posts_change - 50.0).abs() < 1e-9);
    assert_eq!(insight.summary, "A strong week led by tutorials.");
    assert!(insight.summary_generated);

    let best_format = insight.best.format.as_ref().unwrap();
    assert_eq!(best_format.value, Format::Tutorial);
    assert_eq!(best_format.posts, 2);
    assert!(insight.recommendations.iter().any(|r| r.kind == RecommendationKind::LeanIntoFormat));
    assert!(insight.recommendations.len() <= 5);
    assert!((0.0..=100.0).contains(&insight.persona_alignment));
}

#[tokio::test]
async fn test_views_drop_leads_recommendations() {
    let store = Arc::new(MemoryStore::new());
    let mut writer = MockWriter::new();
    writer
        .expect_generate()
        .returning(|_| Err(GenerationError::Timeout(20)));
    let service = service(store, writer);

    for (id, day) in [("p1", 26), ("p2", 27), ("p3", 28)] {
        let params = PromptParams::new(Platform::YouTube).with_tone(Tone::Serious);
        let previous = ContentResult::new(id, "u1", params, 5000)
            .with_engagement_rate(4.0)
            .posted_at(Utc.with_ymd_and_hms(2024, 2, day, 9, 0, 0).unwrap());
        service.record_result(&previous).await.unwrap();
    }
    for (id, day) in [("a", 4), ("b", 5), ("c", 6)] {
        service.record_result(&result(id, day, 1000, 4.0, Tone::Serious, Format::Comparison)).await.unwrap();
    }

    let insight = service.generate_weekly("u1", week()).await.unwrap().unwrap();
    assert!((insight.week_over_week.views_change + 80.0).abs() < 1e-9);
    assert_eq!(insight.recommendations[0].kind, RecommendationKind::RecoverViews);
    assert!(insight.recommendations[0].message.contains("trending topics"));
    assert!(!insight.summary_generated);
    assert!(!insight.summary.is_empty());
}
