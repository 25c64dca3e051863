use chrono::{Duration, Utc};
use reelwright_core::{
    FailureKind, Fingerprint, ProductionRecord, RecordId, StageKind, StageReport, TopicCategory,
};
use reelwright_history::{
    HistoryStore, InMemoryHistoryStore, JsonlHistoryStore, ThemeSimilarityPolicy,
};

fn finished(category: &str, theme: &str, script: &str) -> ProductionRecord {
    let mut record = ProductionRecord::new(
        RecordId::new(),
        None,
        TopicCategory::new(category),
        theme,
        Utc::now(),
    );
    record
        .complete_stage(StageKind::Script, StageReport::success(1, None))
        .expect("open");
    record
        .set_script("title", Fingerprint::of(script))
        .expect("open");
    record.finalize_success(Utc::now()).expect("open");
    record
}

fn failed(category: &str, theme: &str) -> ProductionRecord {
    let mut record = ProductionRecord::new(
        RecordId::new(),
        None,
        TopicCategory::new(category),
        theme,
        Utc::now(),
    );
    record
        .finalize_failure(None, FailureKind::Terminal, "boom", Utc::now())
        .expect("open");
    record
}

#[tokio::test]
async fn test_jsonl_recent_records_most_recent_first() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = JsonlHistoryStore::new(dir.path().join("nested").join("history.jsonl"));

    let first = finished("prophets", "patience", "one");
    let second = finished("sahaba", "honesty", "two");
    let third = finished("moral_lessons", "gratitude", "three");
    for record in [&first, &second, &third] {
        store.append(record).await.expect("append");
    }

    let recent = store.recent_records(2).await.expect("read");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id(), third.id());
    assert_eq!(recent[1].id(), second.id());

    // Restartable: a second read yields the same sequence.
    let again = store.recent_records(2).await.expect("read");
    assert_eq!(recent, again);

    let found = store.get(first.id()).await.expect("read");
    assert_eq!(found.as_ref().map(|r| r.id()), Some(first.id()));
}

#[tokio::test]
async fn test_jsonl_missing_file_reads_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = JsonlHistoryStore::new(dir.path().join("history.jsonl"));
    assert!(store.recent_records(10).await.expect("read").is_empty());
}

#[tokio::test]
async fn test_jsonl_rejects_open_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = JsonlHistoryStore::new(dir.path().join("history.jsonl"));
    let open = ProductionRecord::new(
        RecordId::new(),
        None,
        TopicCategory::new("prophets"),
        "patience",
        Utc::now(),
    );
    assert!(store.append(&open).await.is_err());
    assert!(!store.path().exists());
}

#[tokio::test]
async fn test_jsonl_survives_torn_final_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("history.jsonl");
    let store = JsonlHistoryStore::new(&path);

    let first = finished("prophets", "patience", "one");
    store.append(&first).await.expect("append");

    // Simulate a crash halfway through writing a record.
    let mut contents = std::fs::read_to_string(&path).expect("read");
    contents.push_str("{\"id\":\"0189");
    std::fs::write(&path, contents).expect("write");

    let recent = store.recent_records(10).await.expect("torn line tolerated");
    assert_eq!(recent.len(), 1);

    let second = finished("sahaba", "honesty", "two");
    store.append(&second).await.expect("append after torn line");
    let recent = store.recent_records(10).await.expect("read");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id(), second.id());
}

#[tokio::test]
async fn test_jsonl_survives_line_cut_inside_multibyte_character() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("history.jsonl");
    let store = JsonlHistoryStore::new(&path);

    let first = finished("prophets", "الصبر", "one");
    store.append(&first).await.expect("append");

    // Cut the next line one byte into its two-byte theme character.
    let torn = serde_json::to_vec(&finished("prophets", "الصبر", "two")).expect("encode");
    let theme = "الصبر".as_bytes();
    let start = torn
        .windows(theme.len())
        .position(|w| w == theme)
        .expect("theme in line");
    let mut contents = std::fs::read(&path).expect("read");
    contents.extend_from_slice(&torn[..start + 1]);
    std::fs::write(&path, contents).expect("write");
    assert!(std::fs::read_to_string(&path).is_err());

    let recent = store.recent_records(10).await.expect("torn character tolerated");
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].theme(), "الصبر");

    let second = finished("sahaba", "الصدق", "three");
    store.append(&second).await.expect("append after torn line");
    let recent = store.recent_records(10).await.expect("read");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id(), second.id());
    assert_eq!(recent[1].id(), first.id());
}

#[tokio::test]
async fn test_duplicate_topic_within_lookback() {
    let store = InMemoryHistoryStore::new();
    let policy = ThemeSimilarityPolicy::default();
    store
        .append(&finished("prophets", "Patience in hardship", "a"))
        .await
        .expect("append");
    for i in 0..3 {
        store
            .append(&finished("sahaba", &format!("courage {}", i), &format!("s{}", i)))
            .await
            .expect("append");
    }

    let category = TopicCategory::new("prophets");
    let hit = store
        .find_duplicate_topic(&category, "patience in hardship", 10, &policy)
        .await
        .expect("read");
    assert!(hit.is_some());

    // Outside the lookback window the old record is not considered.
    let miss = store
        .find_duplicate_topic(&category, "patience in hardship", 3, &policy)
        .await
        .expect("read");
    assert!(miss.is_none());

    // Same theme, different category is not a duplicate.
    let other = store
        .find_duplicate_topic(&TopicCategory::new("sahaba"), "patience in hardship", 10, &policy)
        .await
        .expect("read");
    assert!(other.is_none());
}

#[tokio::test]
async fn test_failed_records_do_not_block_topic() {
    let store = InMemoryHistoryStore::new();
    store.append(&failed("prophets", "patience")).await.expect("append");
    let hit = store
        .find_duplicate_topic(
            &TopicCategory::new("prophets"),
            "patience",
            30,
            &ThemeSimilarityPolicy::default(),
        )
        .await
        .expect("read");
    assert!(hit.is_none());
}

#[tokio::test]
async fn test_find_by_fingerprint_and_success_count() {
    let store = InMemoryHistoryStore::new();
    let record = finished("prophets", "patience", "The prophet waited.");
    store.append(&record).await.expect("append");
    store.append(&failed("sahaba", "honesty")).await.expect("append");

    let hit = store
        .find_by_fingerprint(&Fingerprint::of("the  prophet waited."), 30)
        .await
        .expect("read");
    assert_eq!(hit.map(|r| *r.id()), Some(*record.id()));

    let since = Utc::now() - Duration::hours(1);
    assert_eq!(store.count_successes_since(since).await.expect("read"), 1);
    let later = Utc::now() + Duration::hours(1);
    assert_eq!(store.count_successes_since(later).await.expect("read"), 0);
}
