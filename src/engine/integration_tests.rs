//! End-to-end runs of the engine against files on disk.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::detect::AsciiRatioDetector;
use crate::document::{DocumentNode, NodePath, Scalar};
use crate::mt::{MockMode, MockTranslator, TranslationRequest};
use crate::parser::parse_document;

fn scheduler(mock: &MockTranslator, concurrency: usize) -> Scheduler {
    let options = RunOptions::new(TranslationRequest::new("zh")).with_concurrency(
        std::num::NonZeroUsize::new(concurrency).unwrap(),
    );
    Scheduler::new(Arc::new(mock.clone()), options)
}

fn write_json(path: &Path, value: serde_json::Value) {
    std::fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

fn read_result(path: &Path) -> DocumentNode {
    parse_document(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn tree(value: serde_json::Value) -> DocumentNode {
    DocumentNode::from(value)
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("default.json");
    let result = dir.path().join("zh.json");
    write_json(
        &source,
        json!({"title": "Farm Helper", "menu": {"items": ["Open", "Close"]}, "count": 3}),
    );

    let mock = MockTranslator::new(MockMode::Suffix);
    let first = translate_file(&source, &result, &scheduler(&mock, 4), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.summary.translated, 3);
    let after_first = std::fs::read_to_string(&result).unwrap();

    let second = translate_file(&source, &result, &scheduler(&mock, 4), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(mock.call_count(), 3);
    assert_eq!(second.summary.pending, 0);
    assert_eq!(std::fs::read_to_string(&result).unwrap(), after_first);
}

#[tokio::test]
async fn test_new_source_keys_are_translated_incrementally() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("default.json");
    let result = dir.path().join("zh.json");
    write_json(&source, json!({"a": "Apple"}));

    let mock = MockTranslator::new(MockMode::Suffix);
    translate_file(&source, &result, &scheduler(&mock, 2), &CancellationToken::new())
        .await
        .unwrap();

    write_json(&source, json!({"a": "Apple", "b": {"c": "Cherry"}}));
    let report = translate_file(&source, &result, &scheduler(&mock, 2), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary.pending, 1);
    assert_eq!(mock.call_count(), 2);
    assert_eq!(
        read_result(&result),
        tree(json!({"a": "Apple_zh", "b": {"c": "Cherry_zh"}}))
    );
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("default.json");
    let result = dir.path().join("zh.json");
    let mut root = serde_json::Map::new();
    for group in 0..5 {
        let lines: Vec<_> = (0..6).map(|i| json!(format!("Line {group} {i}"))).collect();
        root.insert(format!("group{group}"), json!({"lines": lines, "name": "Group"}));
    }
    write_json(&source, serde_json::Value::Object(root));

    let mock = MockTranslator::with_delay(MockMode::Suffix, 15);
    let report = translate_file(&source, &result, &scheduler(&mock, 4), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary.translated, 35);
    assert!(mock.peak_in_flight() <= 4, "peak was {}", mock.peak_in_flight());
}

#[tokio::test]
async fn test_hand_edited_result_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("default.json");
    let result = dir.path().join("zh.json");
    write_json(&source, json!({"greeting": "Hello", "farewell": "Goodbye"}));
    write_json(&result, json!({"greeting": "你好呀", "farewell": "Goodbye"}));

    let mock = MockTranslator::new(MockMode::Suffix);
    translate_file(&source, &result, &scheduler(&mock, 2), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(mock.call_count(), 1);
    assert_eq!(
        read_result(&result),
        tree(json!({"greeting": "你好呀", "farewell": "Goodbye_zh"}))
    );
}

#[tokio::test]
async fn test_result_grows_to_source_shape() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("default.json");
    let result = dir.path().join("zh.json");
    write_json(&source, json!({"a": {"b": ["x", "y"]}}));
    write_json(&result, json!({"a": {"b": ["X"]}}));

    let mock = MockTranslator::new(MockMode::Suffix);
    translate_file(&source, &result, &scheduler(&mock, 2), &CancellationToken::new())
        .await
        .unwrap();

    // "X" is not identical to its source, so only index 1 is requested
    assert_eq!(mock.call_count(), 1);
    assert_eq!(read_result(&result), tree(json!({"a": {"b": ["X", "y_zh"]}})));
}

#[tokio::test]
async fn test_padding_never_reaches_disk() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("default.json");
    let result = dir.path().join("zh.json");
    write_json(&source, json!({"list": ["One", "Two", "Three", 4, true]}));
    write_json(&result, json!({"list": []}));

    let mock = MockTranslator::with_delay(MockMode::Suffix, 5);
    let report = translate_file(&source, &result, &scheduler(&mock, 1), &CancellationToken::new())
        .await
        .unwrap();

    let mut nulls = 0;
    report.tree.walk(&mut |_, node| {
        if node.as_scalar() == Some(&Scalar::Null) {
            nulls += 1;
        }
    });
    assert_eq!(nulls, 0);
    assert_eq!(
        read_result(&result),
        tree(json!({"list": ["One_zh", "Two_zh", "Three_zh", 4, true]}))
    );
}

#[tokio::test]
async fn test_failed_leaf_is_retried_on_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("default.json");
    let result = dir.path().join("zh.json");
    write_json(&source, json!({"a": "Hello", "b": "World"}));

    let flaky = MockTranslator::new(MockMode::FailOn(["World".to_string()].into()));
    let report = translate_file(&source, &result, &scheduler(&flaky, 2), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.summary.failed, 1);
    assert_eq!(read_result(&result), tree(json!({"a": "Hello_zh", "b": "World"})));

    let healthy = MockTranslator::new(MockMode::Suffix);
    let report = translate_file(&source, &result, &scheduler(&healthy, 2), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(healthy.call_count(), 1);
    assert_eq!(report.summary.translated, 1);
    assert_eq!(read_result(&result), tree(json!({"a": "Hello_zh", "b": "World_zh"})));
}

#[tokio::test]
async fn test_failed_leaf_with_digits_is_retried_on_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("default.json");
    let result = dir.path().join("zh.json");
    write_json(&source, json!({"a": "Hello", "b": "Day 12"}));

    let flaky = MockTranslator::new(MockMode::FailOn(["Day 12".to_string()].into()));
    translate_file(&source, &result, &scheduler(&flaky, 2), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(read_result(&result), tree(json!({"a": "Hello_zh", "b": "Day 12"})));
    let pending_list = FileStore::new(&result).untranslated_path();
    assert!(pending_list.exists());

    let healthy = MockTranslator::new(MockMode::Suffix);
    let report = translate_file(&source, &result, &scheduler(&healthy, 2), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(healthy.call_count(), 1);
    assert!(report.untranslated.is_empty());
    assert_eq!(read_result(&result), tree(json!({"a": "Hello_zh", "b": "Day 12_zh"})));
    assert!(!pending_list.exists());
}

#[tokio::test]
async fn test_cancelled_run_resumes_where_it_stopped() {
    struct CancelAfterFirst(CancellationToken);

    impl ProgressSink for CancelAfterFirst {
        fn report(&self, event: ProgressEvent) {
            if matches!(event, ProgressEvent::Translated { .. }) {
                self.0.cancel();
            }
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("default.json");
    let result = dir.path().join("zh.json");
    let lines: Vec<_> = (0..8).map(|i| json!(format!("Line {i}"))).collect();
    write_json(&source, json!({ "lines": lines }));

    let cancel = CancellationToken::new();
    let mock = MockTranslator::with_delay(MockMode::Suffix, 10);
    let report = translate_file(
        &source,
        &result,
        &scheduler(&mock, 1).with_progress(Arc::new(CancelAfterFirst(cancel.clone()))),
        &cancel,
    )
    .await
    .unwrap();

    assert!(report.summary.cancelled);
    assert!(report.summary.dispatched < 8);
    assert_eq!(report.summary.translated, report.summary.dispatched);
    let on_disk = read_result(&result);
    assert_eq!(on_disk, report.tree);

    let resumed = MockTranslator::new(MockMode::Suffix);
    translate_file(&source, &result, &scheduler(&resumed, 4), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(resumed.call_count(), 8 - report.summary.translated);
    let expected: Vec<_> = (0..8).map(|i| json!(format!("Line {i}_zh"))).collect();
    assert_eq!(read_result(&result), tree(json!({ "lines": expected })));
    assert!(!FileStore::new(&result).untranslated_path().exists());
}

#[tokio::test]
async fn test_corrupt_result_starts_over() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("default.json");
    let result = dir.path().join("zh.json");
    write_json(&source, json!({"a": "Apple"}));
    std::fs::write(&result, "{ not json").unwrap();

    let mock = MockTranslator::new(MockMode::Suffix);
    translate_file(&source, &result, &scheduler(&mock, 1), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(read_result(&result), tree(json!({"a": "Apple_zh"})));
}

#[tokio::test]
async fn test_unparseable_source_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("default.json");
    let result = dir.path().join("zh.json");
    std::fs::write(&source, "{\"a\": \"Apple\"").unwrap();

    let mock = MockTranslator::new(MockMode::Suffix);
    let err = translate_file(&source, &result, &scheduler(&mock, 1), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, crate::error::ModlocError::Parse(_)));
    assert!(!result.exists());
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_commented_source_with_nested_destination() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("default.json");
    let result = dir.path().join("out/i18n/zh.json");
    std::fs::write(
        &source,
        "{\n  // shown on the title screen\n  \"title\": \"Welcome, {{name}}\",\n}\n",
    )
    .unwrap();

    let mock = MockTranslator::new(MockMode::Suffix);
    translate_file(&source, &result, &scheduler(&mock, 1), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(read_result(&result), tree(json!({"title": "Welcome, {{name}}_zh"})));
}

#[tokio::test]
async fn test_identical_non_english_text_counts_as_done() {
    let detector = AsciiRatioDetector::default();
    let source = tree(json!({"name": "Pierre", "shop": "Épicerie Générale"}));
    let mut existing = tree(json!({"name": "Pierre", "shop": "Épicerie Générale"}));

    let pending = Differ::new(&detector).diff(&source, &mut existing);

    // "Pierre" is all ASCII letters and still reads as source text
    let pending = pending.unwrap();
    assert_eq!(
        pending.leaves(),
        vec![(NodePath::root().key("name"), "Pierre".to_string())]
    );
}
