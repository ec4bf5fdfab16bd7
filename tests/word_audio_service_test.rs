use std::sync::atomic::Ordering;
use std::sync::Arc;

use talklab_backend_rust::db::operations::word_audio as word_audio_ops;
use talklab_backend_rust::db::Database;
use talklab_backend_rust::services::audio_cache::AudioCacheError;
use talklab_backend_rust::services::word_audio::WordAudioService;

mod common;

use common::{FakeStorage, FakeTts};

#[tokio::test]
async fn test_times_used_increments_on_cache_hit() {
    let db = Database::open_in_memory()
        .await
        .expect("in-memory db init failed");
    let service = WordAudioService::new(
        db.clone(),
        Arc::new(FakeTts::default()),
        Arc::new(FakeStorage::default()),
    );

    let first = service.get_or_generate("hello").await.unwrap();
    assert!(!first.cached);

    let after_first = word_audio_ops::get(db.pool(), "hello")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_first.times_used, 0);

    let second = service.get_or_generate("hello").await.unwrap();
    assert!(second.cached);
    assert_eq!(second.audio_url, first.audio_url);

    let after_second = word_audio_ops::get(db.pool(), "hello")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_second.times_used, after_first.times_used + 1);
}

#[tokio::test]
async fn test_concurrent_miss_generates_once() {
    let db = Database::open_in_memory()
        .await
        .expect("in-memory db init failed");
    let tts = Arc::new(FakeTts::default());
    // Slow synthesis so the second caller reliably loses the claim and has
    // to wait for the winner's row.
    tts.delay_ms.store(400, Ordering::SeqCst);
    let service = WordAudioService::new(db.clone(), tts.clone(), Arc::new(FakeStorage::default()));

    let (first, second) = tokio::join!(
        service.get_or_generate("hello"),
        service.get_or_generate("hello"),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    // One synthesis total: the claim winner generated, the loser got the
    // winner's record.
    assert_eq!(tts.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.audio_url, second.audio_url);
    assert_eq!(u8::from(first.cached) + u8::from(second.cached), 1);

    let record = word_audio_ops::get(db.pool(), "hello")
        .await
        .unwrap()
        .unwrap();
    assert!(record.is_ready());
}

#[tokio::test]
async fn test_stale_claim_is_released_for_retry() {
    let db = Database::open_in_memory()
        .await
        .expect("in-memory db init failed");
    let service = WordAudioService::new(
        db.clone(),
        Arc::new(FakeTts::default()),
        Arc::new(FakeStorage::default()),
    );

    // A claim whose owner died between claim and mark-ready: pending row
    // with a claim timestamp well past the staleness window.
    assert!(word_audio_ops::try_claim(db.pool(), "stuck", "alloy")
        .await
        .unwrap());
    let old = (chrono::Utc::now() - chrono::Duration::seconds(60))
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    sqlx::query(r#"UPDATE "word_audio" SET "claimedAt" = ? WHERE "word" = ?"#)
        .bind(&old)
        .bind("stuck")
        .execute(db.pool())
        .await
        .unwrap();

    // The caller polls out its budget, then clears the stale claim.
    let err = service.get_or_generate("stuck").await.unwrap_err();
    assert!(matches!(err, AudioCacheError::GenerationPending));
    assert!(word_audio_ops::get(db.pool(), "stuck")
        .await
        .unwrap()
        .is_none());

    // With the key freed, the next request generates normally.
    let retried = service.get_or_generate("stuck").await.unwrap();
    assert!(!retried.cached);
}

#[tokio::test]
async fn test_ready_record_is_immutable_across_hits() {
    let db = Database::open_in_memory()
        .await
        .expect("in-memory db init failed");
    let service = WordAudioService::new(
        db.clone(),
        Arc::new(FakeTts::default()),
        Arc::new(FakeStorage::default()),
    );

    service.get_or_generate("world").await.unwrap();
    let before = word_audio_ops::get(db.pool(), "world")
        .await
        .unwrap()
        .unwrap();

    service.get_or_generate("World ").await.unwrap();
    let after = word_audio_ops::get(db.pool(), "world")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(after.audio_url, before.audio_url);
    assert_eq!(after.generated_at, before.generated_at);
    assert_eq!(after.times_used, before.times_used + 1);
}
