//! Daily suggestion batches

use async_trait::async_trait;
use chrono::NaiveDate;
use mockall::mock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use creator_persona::error::GenerationError;
use creator_persona::generation::{ContentGenerator, GenerationRequest};
use creator_persona::{
    Category, Config, ContentResult, CoreError, DailyRequest, Format, Goal, MemoryStore, Personalizer, Platform,
    PromptParams, SeededRandom, StaticEntitlements, Tone,
};

mock! {
    pub Writer {}

    #[async_trait]
    impl ContentGenerator for Writer {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

fn writer() -> MockWriter {
    let mut writer = MockWriter::new();
    writer
        .expect_generate()
        .returning(|r| Ok(format!("{} hook about {}", r.tone, r.platform.map(|p| p.to_string()).unwrap_or_default())));
    writer
}

fn service(store: Arc<MemoryStore>, writer: MockWriter, limit: u32) -> Personalizer {
    Personalizer::new(
        store,
        Arc::new(writer),
        Arc::new(StaticEntitlements::new(true, limit)),
        &Config::default(),
    )
    .with_random(Box::new(SeededRandom::seeded(11)))
}

/// Seven measured patterns on TikTok, using only two tones
async fn seed_history(service: &Personalizer) -> Vec<PromptParams> {
    let mut seeded = Vec::new();
    let combos = Goal::ALL
        .iter()
        .map(|g| (Tone::Funny, *g))
        .chain([(Tone::Educational, Goal::Views), (Tone::Educational, Goal::Sales)]);
    for (i, (tone, goal)) in combos.enumerate() {
        let format = Format::ALL[i % Format::ALL.len()];
        let params = PromptParams::new(Platform::TikTok)
            .with_tone(tone)
            .with_format(format)
            .with_goal(goal);
        let result = ContentResult::new(&format!("r{}", i), "u1", params.clone(), 1000)
            .with_engagement_rate(2.0 + i as f64);
        service.record_result(&result).await.unwrap();
        seeded.push(params);
    }
    seeded
}

#[tokio::test]
async fn test_ten_ideas_split_seven_and_three() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store, writer(), 10);
    let seeded = seed_history(&service).await;
    assert_eq!(seeded.len(), 7);

    let request = DailyRequest::new("u1", date(), vec![Platform::TikTok], 10).with_explore_ratio(0.3);
    let batch = service.generate_daily(&request).await.unwrap();

    assert_eq!(batch.produced, 10);
    assert_eq!(batch.skipped, 0);
    let ideas = &batch.suggestions[0].ideas;
    assert_eq!(ideas.iter().filter(|i| i.is_exploration).count(), 3);
    assert_eq!(ideas.iter().filter(|i| !i.is_exploration).count(), 7);
    assert!(ideas.iter().all(|i| i.confidence_score <= 100));
}

#[tokio::test]
async fn test_exploration_avoids_history() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store, writer(), 10);
    let seeded = seed_history(&service).await;
    let history_keys: HashSet<_> = seeded.iter().map(|p| p.pattern_key()).collect();
    let tried: HashSet<(Tone, Format)> = seeded.iter().filter_map(|p| Some((p.tone?, p.format?))).collect();

    let request = DailyRequest::new("u1", date(), vec![Platform::TikTok], 10).with_explore_ratio(0.5);
    let batch = service.generate_daily(&request).await.unwrap();

    let explored: Vec<_> = batch.suggestions[0].ideas.iter().filter(|i| i.is_exploration).collect();
    assert_eq!(explored.len(), 5);
    for idea in explored {
        let key = idea.pattern_key.clone().unwrap();
        assert!(!history_keys.contains(&key));
        assert!(!tried.contains(&(idea.tone, idea.format)));
    }
}

#[tokio::test]
async fn test_every_tone_posted_still_explores_new_formats() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store, writer(), 10);
    let mut tried = HashSet::new();
    for (i, tone) in Tone::ALL.iter().enumerate() {
        let params = PromptParams::new(Platform::TikTok).with_tone(*tone).with_format(Format::Tutorial);
        let result = ContentResult::new(&format!("t{}", i), "u1", params, 800).with_engagement_rate(3.0);
        service.record_result(&result).await.unwrap();
        tried.insert((*tone, Format::Tutorial));
    }

    let request = DailyRequest::new("u1", date(), vec![Platform::TikTok], 10).with_explore_ratio(0.3);
    let batch = service.generate_daily(&request).await.unwrap();

    assert_eq!(batch.produced, 10);
    assert_eq!(batch.unfilled, 0);
    let explored: Vec<_> = batch.suggestions[0].ideas.iter().filter(|i| i.is_exploration).collect();
    assert_eq!(explored.len(), 5);
    assert!(explored.iter().all(|i| !tried.contains(&(i.tone, i.format))));
}

#[tokio::test]
async fn test_exhausted_space_reports_unfilled_slots() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store, writer(), 10);
    let mut n = 0;
    for tone in Tone::ALL {
        for format in Format::ALL {
            let params = PromptParams::new(Platform::YouTube).with_tone(*tone).with_format(*format);
            let result = ContentResult::new(&format!("y{}", n), "u1", params, 500).with_engagement_rate(2.5);
            service.record_result(&result).await.unwrap();
            n += 1;
        }
    }

    let request = DailyRequest::new("u1", date(), vec![Platform::YouTube], 10).with_explore_ratio(0.2);
    let batch = service.generate_daily(&request).await.unwrap();

    // One measured pattern per tone; nothing is left to explore
    assert_eq!(batch.produced, 5);
    assert_eq!(batch.unfilled, 5);
    assert_eq!(batch.suggestions[0].exploration_count(), 0);
}

#[tokio::test]
async fn test_same_day_twice_keeps_one_row() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store.clone(), writer(), 10);
    let request = DailyRequest::new("u1", date(), vec![Platform::Instagram], 3);

    let first = service.generate_daily(&request).await.unwrap();
    let second = service.generate_daily(&request).await.unwrap();

    assert_eq!(store.suggestion_rows().await, 1);
    assert_eq!(second.produced, 0);
    assert_eq!(second.reused, 1);
    assert_eq!(first.suggestions[0].id, second.suggestions[0].id);
    assert_eq!(first.suggestions[0].ideas, second.suggestions[0].ideas);

    let regenerated = service.generate_daily(&request.clone().regenerate(true)).await.unwrap();
    assert_eq!(store.suggestion_rows().await, 1);
    assert_eq!(regenerated.produced, 3);
    assert_eq!(regenerated.suggestions[0].id, first.suggestions[0].id);
}

#[tokio::test]
async fn test_limit_applies_to_whole_request() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store.clone(), MockWriter::new(), 5);
    let request = DailyRequest::new("u1", date(), vec![Platform::TikTok, Platform::X], 6);

    let err = service.generate_daily(&request).await.unwrap_err();
    assert!(matches!(err, CoreError::LimitExceeded { requested: 6, allowed: 5, .. }));
    assert_eq!(store.suggestion_rows().await, 0);
}

#[tokio::test]
async fn test_limit_counts_other_platforms_on_the_same_day() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store.clone(), writer(), 3);

    let first = service
        .generate_daily(&DailyRequest::new("u1", date(), vec![Platform::TikTok], 3))
        .await
        .unwrap();
    assert_eq!(first.produced, 3);

    let err = service
        .generate_daily(&DailyRequest::new("u1", date(), vec![Platform::X], 3))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::LimitExceeded { requested: 3, already: 3, allowed: 3 }));

    // Regenerating replaces the row, so it stays within the allowance
    let regenerated = service
        .generate_daily(&DailyRequest::new("u1", date(), vec![Platform::TikTok], 3).regenerate(true))
        .await
        .unwrap();
    assert_eq!(regenerated.produced, 3);

    let today: usize = service
        .suggestions_for("u1", date())
        .await
        .unwrap()
        .iter()
        .map(|row| row.ideas.len())
        .sum();
    assert_eq!(today, 3);
    assert_eq!(store.suggestion_rows().await, 1);
}

#[tokio::test]
async fn test_outage_leaves_the_day_open_for_retry() {
    let store = Arc::new(MemoryStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut flaky = MockWriter::new();
    flaky.expect_generate().returning(move |r| {
        if counter.fetch_add(1, Ordering::SeqCst) < 4 {
            Err(GenerationError::Unavailable("down".to_string()))
        } else {
            Ok(format!("{} hook", r.tone))
        }
    });
    let service = service(store.clone(), flaky, 10);

    let request = DailyRequest::new("u1", date(), vec![Platform::TikTok, Platform::YouTube], 4);
    let outage = service.generate_daily(&request).await.unwrap();
    assert_eq!(outage.produced, 0);
    assert_eq!(outage.skipped, 4);
    assert!(outage.suggestions.is_empty());
    assert_eq!(store.suggestion_rows().await, 0);

    let retry = service.generate_daily(&request).await.unwrap();
    assert_eq!(retry.produced, 4);
    assert_eq!(retry.reused, 0);
    assert_eq!(retry.total_ideas(), 4);
    assert_eq!(calls.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn test_mark_used_round_trip() {
    let store = Arc::new(MemoryStore::new());
    let service = service(store, writer(), 10);
    service
        .generate_daily(&DailyRequest::new("u1", date(), vec![Platform::X], 2))
        .await
        .unwrap();

    service.mark_used("u1", date(), Platform::X, Some("gen-1")).await.unwrap();
    let rows = service.suggestions_for("u1", date()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].used);
    assert_eq!(rows[0].generation_id.as_deref(), Some("gen-1"));
}
