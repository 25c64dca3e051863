use chrono::Utc;
use reelwright_core::{AudioHandle, ProductionRecord, RecordId, StageKind, StageReport, TopicCategory};
use reelwright_history::{ArtifactSet, Checkpoint, CheckpointStore};

fn open_record() -> ProductionRecord {
    ProductionRecord::new(
        RecordId::new(),
        None,
        TopicCategory::new("quran_stories"),
        "mercy",
        Utc::now(),
    )
}

#[tokio::test]
async fn test_checkpoint_save_load_remove() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CheckpointStore::new(dir.path().join("checkpoints"));

    let mut record = open_record();
    record
        .complete_stage(StageKind::Script, StageReport::success(1, None))
        .expect("open");
    let artifacts = ArtifactSet {
        audio: Some(AudioHandle::new("/tmp/narration.mp3", 42.0)),
        ..ArtifactSet::default()
    };
    let checkpoint = Checkpoint::new(record.clone(), artifacts);
    store.save(&checkpoint).await.expect("save");

    let loaded = store
        .load(record.id())
        .await
        .expect("load")
        .expect("present");
    assert_eq!(loaded, checkpoint);
    assert_eq!(store.list().await.expect("list").len(), 1);

    // Overwrite leaves a single file and no temp file behind.
    store.save(&checkpoint).await.expect("save again");
    let names: Vec<_> = std::fs::read_dir(store.dir())
        .expect("dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name())
        .collect();
    assert_eq!(names.len(), 1);

    store.remove(record.id()).await.expect("remove");
    assert!(store.load(record.id()).await.expect("load").is_none());
    store.remove(record.id()).await.expect("idempotent remove");
}

#[tokio::test]
async fn test_list_missing_dir_is_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CheckpointStore::new(dir.path().join("absent"));
    assert!(store.list().await.expect("list").is_empty());
}
