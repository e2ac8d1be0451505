mod common;

use std::fs::{self, File};

use arrow_schema::DataType;
use common::{commonsense, qa, row_for, FakeRaw};
use lucky_ai::data_processing::{
    run_adapter, Adapter, CanonicalRecord, Preprocessor, ProcessedStore, RawRow, SourceKind, Split,
    Subset, SyncEngine, SyncOptions,
};
use lucky_ai::feedback::MemoryFeedbackStore;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

#[test]
fn commonsense_keeps_short_rows_and_inverts_labels() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProcessedStore::new(dir.path());
    let raw = FakeRaw::default()
        .with(
            SourceKind::Commonsense,
            Split::Train,
            vec![
                commonsense("I helped my neighbour carry groceries.", false, true),
                commonsense("I took the last cookie without asking.", true, true),
                commonsense("A very long story about a wedding that went wrong.", false, false),
            ],
        )
        .with(
            SourceKind::Commonsense,
            Split::Test,
            vec![commonsense("I returned the wallet I found.", false, true)],
        );

    let written = run_adapter(SourceKind::Commonsense, &raw, &store).unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].name, "commonsense_train");
    assert_eq!(written[0].rows, 2);

    assert_eq!(
        store.read("commonsense_train").unwrap(),
        vec![
            CanonicalRecord::new("I helped my neighbour carry groceries.", true).unwrap(),
            CanonicalRecord::new("I took the last cookie without asking.", false).unwrap(),
        ]
    );
}

#[test]
fn artifacts_have_exactly_input_and_boolean_label() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProcessedStore::new(dir.path());
    let raw = FakeRaw::default()
        .with(
            SourceKind::Justice,
            Split::Train,
            vec![row_for(SourceKind::Justice, "I deserve a raise because I work hard.", true)],
        )
        .with(SourceKind::Justice, Split::Test, vec![]);

    run_adapter(SourceKind::Justice, &raw, &store).unwrap();

    let file = File::open(store.artifact_path("justice_train")).unwrap();
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
    let schema = builder.schema();
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, vec!["input", "label"]);
    assert_eq!(schema.field(1).data_type(), &DataType::Boolean);

    // An empty split still produces a readable, empty artifact.
    assert!(store.read("justice_test").unwrap().is_empty());
}

#[test]
fn boolq_test_split_comes_from_validation() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProcessedStore::new(dir.path());
    let raw = FakeRaw::default()
        .with(
            SourceKind::BoolQ,
            Split::Train,
            vec![RawRow::BoolQ(qa("is the sun a star", true))],
        )
        .with(
            SourceKind::BoolQ,
            Split::Test,
            vec![RawRow::BoolQ(qa("is a whale a fish", false))],
        );

    run_adapter(SourceKind::BoolQ, &raw, &store).unwrap();

    let requested = raw.requested.lock().unwrap().clone();
    assert_eq!(
        requested,
        vec![(SourceKind::BoolQ, "train"), (SourceKind::BoolQ, "validation")]
    );
    assert_eq!(
        store.read("boolq_test").unwrap(),
        vec![CanonicalRecord::new("is a whale a fish", false).unwrap()]
    );
}

#[test]
fn rerunning_an_adapter_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProcessedStore::new(dir.path());
    let raw = FakeRaw::complete();

    run_adapter(SourceKind::StrategyQa, &raw, &store).unwrap();
    let first = fs::read(store.artifact_path("strategyqa_train")).unwrap();
    run_adapter(SourceKind::StrategyQa, &raw, &store).unwrap();
    let second = fs::read(store.artifact_path("strategyqa_train")).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn a_missing_source_only_fails_its_own_adapter() {
    let data = tempfile::tempdir().unwrap();
    let store = ProcessedStore::new(data.path().join("processed"));
    let engine = SyncEngine::new(
        store.clone(),
        data.path().join("last_sync.txt"),
        SyncOptions::default(),
    );
    let raw = FakeRaw::complete().unavailable(SourceKind::Justice);
    let feedback = MemoryFeedbackStore::new();

    let report = Preprocessor::new(&raw, &store, &engine, Some(&feedback))
        .run(Subset::All)
        .await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].adapter, Adapter::Source(SourceKind::Justice));
    assert_eq!(report.failed_names(), "justice");
    assert_eq!(report.completed.len(), 4);
    assert!(store.exists("boolq_test"));
    assert!(store.exists("commonsense_train"));
    assert!(!store.exists("justice_train"));
}

#[tokio::test]
async fn user_subset_without_a_database_is_reported() {
    let data = tempfile::tempdir().unwrap();
    let store = ProcessedStore::new(data.path().join("processed"));
    let engine = SyncEngine::new(
        store.clone(),
        data.path().join("last_sync.txt"),
        SyncOptions::default(),
    );
    let raw = FakeRaw::complete();

    let report = Preprocessor::<_, MemoryFeedbackStore>::new(&raw, &store, &engine, None)
        .run(Subset::User)
        .await;

    assert!(!report.is_success());
    assert_eq!(report.failed[0].adapter, Adapter::User);
    assert!(report.failed[0].reason.contains("DATABASE_URL"));
}

#[tokio::test]
async fn full_run_without_a_database_skips_user_data() {
    let data = tempfile::tempdir().unwrap();
    let store = ProcessedStore::new(data.path().join("processed"));
    let engine = SyncEngine::new(
        store.clone(),
        data.path().join("last_sync.txt"),
        SyncOptions::default(),
    );
    let raw = FakeRaw::complete();

    let report = Preprocessor::<_, MemoryFeedbackStore>::new(&raw, &store, &engine, None)
        .run(Subset::All)
        .await;

    assert!(report.is_success());
    assert_eq!(report.completed.len(), 4);
    assert_eq!(report.skipped, vec![Adapter::User]);
    assert!(store.exists("strategyqa_train"));
    assert!(!engine.watermark().path().exists());
}
