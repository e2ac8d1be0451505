mod common;

use burn::data::dataset::Dataset;
use common::records;
use lucky_ai::data_processing::{DatasetView, ProcessedStore, QuestionItem, Split};
use lucky_ai::errors::DataError;

#[test]
fn train_view_concatenates_every_train_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProcessedStore::new(dir.path());
    store.write("boolq_train", &records("boolq", 3, true)).unwrap();
    store.write("justice_train", &records("justice", 7, false)).unwrap();
    store.write("justice_test", &records("held out", 2, true)).unwrap();

    let view = DatasetView::train(dir.path()).unwrap();

    assert_eq!(view.len(), 10);
    assert_eq!(view.split(), Split::Train);
    assert_eq!(view.subsets(), vec!["boolq_train", "justice_train"]);
    let boolq = view.rows().iter().filter(|row| row.subset == "boolq_train").count();
    assert_eq!(boolq, 3);
    assert!(view.iter().all(|item| !item.text.starts_with("held out")));
}

#[test]
fn staged_user_rows_count_as_training_data() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProcessedStore::new(dir.path());
    store.write("user_train", &records("user", 4, true)).unwrap();
    store.write("new_user_train", &records("fresh", 1, false)).unwrap();

    let view = DatasetView::train(dir.path()).unwrap();
    assert_eq!(view.len(), 5);
    assert_eq!(
        view.get(0),
        Some(QuestionItem::new("fresh 0".to_string(), false))
    );
}

#[test]
fn missing_directory_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = DatasetView::test(dir.path().join("processed")).unwrap_err();
    assert!(matches!(err, DataError::NotFound(_)));
}

#[test]
fn split_without_artifacts_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProcessedStore::new(dir.path());
    store.write("boolq_train", &records("boolq", 1, true)).unwrap();

    let err = DatasetView::test(dir.path()).unwrap_err();
    assert!(matches!(err, DataError::EmptyDataset { split: Split::Test, .. }));
}

#[test]
fn stats_render_subset_table_and_samples() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProcessedStore::new(dir.path());
    store.write("strategyqa_test", &records("strategy", 5, true)).unwrap();
    store.write("user_test", &records("user", 5, false)).unwrap();

    let stats = DatasetView::test(dir.path()).unwrap().stats();
    let rendered = stats.to_string();

    assert_eq!(stats.total, 10);
    assert!(rendered.contains("| strategyqa_test | 5 | 50.0% |"));
    assert!(rendered.contains("True: 5 (50.0%) | False: 5 (50.0%)"));
    assert!(rendered.contains("- [no] user 0"));
    assert!(!rendered.contains("user 3"));
}
