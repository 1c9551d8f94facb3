//! Diff engine
//!
//! Compares a source tree with the previously persisted result and computes
//! the pending subtree: exactly the leaves that still need a translation call.
//! At the same time the result tree is grown so that every source path exists
//! in it, which lets the scheduler write each finished leaf to a known slot.
//!
//! Leaf status rules, for translatable source text:
//!
//! | result leaf                                   | status    |
//! |-----------------------------------------------|-----------|
//! | absent, blank, or of the wrong shape          | `Missing` |
//! | identical to source, detector says untranslated | `Stale` |
//! | identical to source, detector says otherwise  | `Done`    |
//! | any other text                                | `Done`    |
//!
//! The last row means a hand-edited result is never overwritten.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::detect::SourceLanguageDetector;
use crate::document::{DocumentNode, NodeKind, NodePath, PathSegment, Scalar};
use crate::engine::store::Checkpoint;

/// Per-leaf translation state, derived from the source and result trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationStatus {
    Missing,
    Stale,
    Done,
}

impl TranslationStatus {
    pub fn needs_translation(self) -> bool {
        matches!(self, TranslationStatus::Missing | TranslationStatus::Stale)
    }
}

/// The subtree of leaves still requiring translation.
///
/// Sequences are sparse: only indices that need work are present, keyed by
/// their position in the source sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PendingNode {
    Leaf(String),
    Mapping(IndexMap<String, PendingNode>),
    Sequence(BTreeMap<usize, PendingNode>),
}

impl PendingNode {
    /// Every pending leaf with its path, depth-first in source order.
    pub fn leaves(&self) -> Vec<(NodePath, String)> {
        let mut out = Vec::new();
        self.collect(&mut NodePath::root(), &mut out);
        out
    }

    fn collect(&self, path: &mut NodePath, out: &mut Vec<(NodePath, String)>) {
        match self {
            PendingNode::Leaf(text) => out.push((path.clone(), text.clone())),
            PendingNode::Mapping(map) => {
                for (key, child) in map {
                    path.push(PathSegment::Key(key.clone()));
                    child.collect(path, out);
                    path.pop();
                }
            }
            PendingNode::Sequence(slots) => {
                for (index, child) in slots {
                    path.push(PathSegment::Index(*index));
                    child.collect(path, out);
                    path.pop();
                }
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            PendingNode::Leaf(_) => 1,
            PendingNode::Mapping(map) => map.values().map(PendingNode::leaf_count).sum(),
            PendingNode::Sequence(slots) => slots.values().map(PendingNode::leaf_count).sum(),
        }
    }
}

/// Status of one source leaf against its result counterpart.
///
/// Returns `None` for leaves that are never translated (non-text scalars and
/// blank text).
pub fn classify(
    source: &Scalar,
    existing: Option<&DocumentNode>,
    detector: &dyn SourceLanguageDetector,
) -> Option<TranslationStatus> {
    if !source.is_translatable() {
        return None;
    }
    let text = source.as_text()?;
    let status = match existing.and_then(DocumentNode::as_text) {
        None => TranslationStatus::Missing,
        Some(current) if current.trim().is_empty() => TranslationStatus::Missing,
        Some(current) if current == text => {
            if detector.is_untranslated(text) {
                TranslationStatus::Stale
            } else {
                TranslationStatus::Done
            }
        }
        Some(_) => TranslationStatus::Done,
    };
    Some(status)
}

pub struct Differ<'a> {
    detector: &'a dyn SourceLanguageDetector,
}

impl<'a> Differ<'a> {
    pub fn new(detector: &'a dyn SourceLanguageDetector) -> Self {
        Self { detector }
    }

    /// Computes the pending subtree and grows `existing` to cover every source
    /// path. Backfilled leaves hold the source value until translated.
    ///
    /// Returns `None` when nothing needs translating.
    pub fn diff(&self, source: &DocumentNode, existing: &mut DocumentNode) -> Option<PendingNode> {
        self.diff_node(source, existing, true)
    }

    /// Like [`Differ::diff`], but for a persisted checkpoint: leaves its
    /// untranslated list names are missing while they still hold their source
    /// text. Afterwards the list names exactly the pending leaves.
    pub fn resume(&self, source: &DocumentNode, checkpoint: &mut Checkpoint) -> Option<PendingNode> {
        for path in checkpoint.untranslated.iter() {
            let placeholder = match (source.get(path), checkpoint.tree.get(path)) {
                (Some(from), Some(current)) => {
                    from.as_text().is_some() && from.as_text() == current.as_text()
                }
                _ => false,
            };
            if placeholder {
                checkpoint.tree.set(path, DocumentNode::Scalar(Scalar::Null));
            }
        }

        let pending = self.diff(source, &mut checkpoint.tree);
        checkpoint.untranslated = pending
            .iter()
            .flat_map(|p| p.leaves())
            .map(|(path, _)| path)
            .collect();
        pending
    }

    fn diff_node(
        &self,
        source: &DocumentNode,
        existing: &mut DocumentNode,
        present: bool,
    ) -> Option<PendingNode> {
        match source {
            DocumentNode::Scalar(scalar) => {
                let status = classify(scalar, present.then_some(&*existing), self.detector);
                let backfill = !present
                    || existing.kind() != NodeKind::Scalar
                    || status == Some(TranslationStatus::Missing);
                if backfill {
                    *existing = source.clone();
                }
                match (status, scalar.as_text()) {
                    (Some(status), Some(text)) if status.needs_translation() => {
                        Some(PendingNode::Leaf(text.to_string()))
                    }
                    _ => None,
                }
            }
            DocumentNode::Mapping(children) => {
                let slots = ensure_mapping(existing);
                let mut pending = IndexMap::new();
                for (key, child) in children {
                    let present = slots.contains_key(key);
                    let slot = slots
                        .entry(key.clone())
                        .or_insert(DocumentNode::Scalar(Scalar::Null));
                    if let Some(sub) = self.diff_node(child, slot, present) {
                        pending.insert(key.clone(), sub);
                    }
                }
                (!pending.is_empty()).then_some(PendingNode::Mapping(pending))
            }
            DocumentNode::Sequence(children) => {
                let slots = ensure_sequence(existing);
                let original_len = slots.len();
                if slots.len() < children.len() {
                    slots.resize(children.len(), DocumentNode::Scalar(Scalar::Null));
                }
                let mut pending = BTreeMap::new();
                for (index, child) in children.iter().enumerate() {
                    let present = index < original_len;
                    if let Some(sub) = self.diff_node(child, &mut slots[index], present) {
                        pending.insert(index, sub);
                    }
                }
                (!pending.is_empty()).then_some(PendingNode::Sequence(pending))
            }
        }
    }
}

/// Turns `node` into a mapping if it is anything else, keeping it if it is one.
fn ensure_mapping(node: &mut DocumentNode) -> &mut IndexMap<String, DocumentNode> {
    if node.kind() != NodeKind::Mapping {
        *node = DocumentNode::empty_mapping();
    }
    match node {
        DocumentNode::Mapping(map) => map,
        _ => unreachable!("node was just replaced with a mapping"),
    }
}

fn ensure_sequence(node: &mut DocumentNode) -> &mut Vec<DocumentNode> {
    if node.kind() != NodeKind::Sequence {
        *node = DocumentNode::Sequence(Vec::new());
    }
    match node {
        DocumentNode::Sequence(items) => items,
        _ => unreachable!("node was just replaced with a sequence"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::AsciiRatioDetector;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> DocumentNode {
        DocumentNode::from(value)
    }

    fn run_diff(source: &DocumentNode, existing: &mut DocumentNode) -> Option<PendingNode> {
        let detector = AsciiRatioDetector::default();
        Differ::new(&detector).diff(source, existing)
    }

    #[test]
    fn test_listed_placeholder_is_missing_even_when_not_english() {
        let detector = AsciiRatioDetector::default();
        let source = tree(json!({"a": "Hello", "b": "Day 12", "c": "Day 13", "d": ["Line 1"]}));
        let mut checkpoint = Checkpoint {
            tree: tree(json!({"a": "你好", "b": "Day 12", "c": "Day 13", "d": ["Line 1"]})),
            untranslated: [NodePath::root().key("b"), NodePath::root().key("d").index(0)]
                .into_iter()
                .collect(),
        };

        let pending = Differ::new(&detector).resume(&source, &mut checkpoint).unwrap();

        // "c" is not listed and does not read as English, so it counts as done
        let paths: Vec<_> = pending.leaves().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![NodePath::root().key("b"), NodePath::root().key("d").index(0)]
        );
        assert_eq!(checkpoint.untranslated.len(), 2);
        // the placeholder is back to source text, never null
        assert_eq!(checkpoint.tree, tree(json!({"a": "你好", "b": "Day 12", "c": "Day 13", "d": ["Line 1"]})));
    }

    #[test]
    fn test_listed_leaf_edited_by_hand_is_done() {
        let detector = AsciiRatioDetector::default();
        let source = tree(json!({"b": "Day 12"}));
        let mut checkpoint = Checkpoint {
            tree: tree(json!({"b": "第12天"})),
            untranslated: [NodePath::root().key("b")].into_iter().collect(),
        };

        assert_eq!(Differ::new(&detector).resume(&source, &mut checkpoint), None);
        assert!(checkpoint.untranslated.is_empty());
    }

    #[test]
    fn test_resume_lists_backfilled_leaves() {
        let detector = AsciiRatioDetector::default();
        let source = tree(json!({"a": "Day 1", "n": 3}));
        let mut checkpoint = Checkpoint::empty();

        Differ::new(&detector).resume(&source, &mut checkpoint);

        assert_eq!(checkpoint.tree, source);
        assert!(checkpoint.untranslated.contains(&NodePath::root().key("a")));
        assert!(!checkpoint.untranslated.contains(&NodePath::root().key("n")));
    }

    #[test]
    fn test_shape_growth() {
        let source = tree(json!({"a": "x", "b": ["p", "q", "r"]}));
        let mut existing = tree(json!({"a": "X"}));

        let pending = run_diff(&source, &mut existing).unwrap();

        let expected = PendingNode::Mapping(IndexMap::from([(
            "b".to_string(),
            PendingNode::Sequence(BTreeMap::from([
                (0, PendingNode::Leaf("p".to_string())),
                (1, PendingNode::Leaf("q".to_string())),
                (2, PendingNode::Leaf("r".to_string())),
            ])),
        )]));
        assert_eq!(pending, expected);
        assert_eq!(existing, tree(json!({"a": "X", "b": ["p", "q", "r"]})));
    }

    #[test]
    fn test_missing_keys_with_empty_existing() {
        let source = tree(json!({"greeting": "Hello", "farewell": "Goodbye"}));
        let mut existing = DocumentNode::empty_mapping();

        let pending = run_diff(&source, &mut existing).unwrap();
        assert_eq!(pending.leaf_count(), 2);
        assert_eq!(existing, source);
    }

    #[test]
    fn test_stale_when_identical_and_english() {
        let source = tree(json!({"a": "Hello", "b": "Abigail", "c": "你好"}));
        let mut existing = source.clone();

        let pending = run_diff(&source, &mut existing).unwrap();
        let paths: Vec<String> = pending.leaves().iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(paths, vec!["a", "b"]);
    }

    #[test]
    fn test_manual_edit_is_done() {
        let source = tree(json!({"a": "Hello"}));
        let mut existing = tree(json!({"a": "Howdy partner"}));

        assert!(run_diff(&source, &mut existing).is_none());
        assert_eq!(existing, tree(json!({"a": "Howdy partner"})));
    }

    #[test]
    fn test_blank_and_non_text_pass_through() {
        let source = tree(json!({"blank": "   ", "empty": "", "n": 3, "flag": true, "nil": null}));
        let mut existing = DocumentNode::empty_mapping();

        assert!(run_diff(&source, &mut existing).is_none());
        assert_eq!(existing, source);
    }

    #[test]
    fn test_blank_existing_is_missing() {
        let source = tree(json!({"a": "你好世界"}));
        let mut existing = tree(json!({"a": ""}));

        let pending = run_diff(&source, &mut existing).unwrap();
        assert_eq!(pending.leaves(), vec![(NodePath::root().key("a"), "你好世界".to_string())]);
        assert_eq!(existing, source);
    }

    #[test]
    fn test_sparse_sequence() {
        let source = tree(json!({"lines": ["One", "Two", "Three"]}));
        let mut existing = tree(json!({"lines": ["一", "Two", "三"]}));

        let pending = run_diff(&source, &mut existing).unwrap();
        assert_eq!(
            pending.leaves(),
            vec![(NodePath::root().key("lines").index(1), "Two".to_string())]
        );
        assert_eq!(existing, tree(json!({"lines": ["一", "Two", "三"]})));
    }

    #[test]
    fn test_existing_longer_sequence_is_kept() {
        let source = tree(json!(["a"]));
        let mut existing = tree(json!(["甲", "乙"]));
        assert!(run_diff(&source, &mut existing).is_none());
        assert_eq!(existing, tree(json!(["甲", "乙"])));
    }

    #[test]
    fn test_wrong_shape_replaced() {
        let source = tree(json!({"a": {"b": "Hello"}, "c": "World", "d": ["x"]}));
        let mut existing = tree(json!({"a": "flat", "c": ["nested"], "d": {"0": "y"}}));

        let pending = run_diff(&source, &mut existing).unwrap();
        assert_eq!(pending.leaf_count(), 3);
        assert_eq!(existing, source);
    }

    #[test]
    fn test_nested_mappings_in_sequence() {
        let source = tree(json!({"events": [{"name": "Fair", "day": 16}, {"name": "Luau", "day": 11}]}));
        let mut existing = tree(json!({"events": [{"name": "集市", "day": 16}]}));

        let pending = run_diff(&source, &mut existing).unwrap();
        assert_eq!(
            pending.leaves(),
            vec![(
                NodePath::root().key("events").index(1).key("name"),
                "Luau".to_string()
            )]
        );
        assert_eq!(
            existing,
            tree(json!({"events": [{"name": "集市", "day": 16}, {"name": "Luau", "day": 11}]}))
        );
    }

    #[test]
    fn test_empty_subtrees_pruned() {
        let source = tree(json!({"done": {"x": "Hi"}, "todo": {"y": "Bye"}}));
        let mut existing = tree(json!({"done": {"x": "嗨"}}));

        let pending = run_diff(&source, &mut existing).unwrap();
        match pending {
            PendingNode::Mapping(map) => {
                assert!(!map.contains_key("done"));
                assert!(map.contains_key("todo"));
            }
            other => panic!("unexpected pending root {:?}", other),
        }
    }

    #[test]
    fn test_classify() {
        let detector = AsciiRatioDetector::default();
        let hello = Scalar::Text("Hello".to_string());
        assert_eq!(classify(&hello, None, &detector), Some(TranslationStatus::Missing));
        assert_eq!(
            classify(&hello, Some(&DocumentNode::text("Hello")), &detector),
            Some(TranslationStatus::Stale)
        );
        assert_eq!(
            classify(&hello, Some(&DocumentNode::text("你好")), &detector),
            Some(TranslationStatus::Done)
        );
        assert_eq!(
            classify(&hello, Some(&tree(json!(5))), &detector),
            Some(TranslationStatus::Missing)
        );
        assert_eq!(classify(&Scalar::Bool(true), None, &detector), None);
    }

    #[test]
    fn test_pending_serializes_sparse_indices() {
        let source = tree(json!({"b": ["p", "q"]}));
        let mut existing = tree(json!({"b": ["P"]}));
        let pending = run_diff(&source, &mut existing).unwrap();
        let json = serde_json::to_value(&pending).unwrap();
        assert_eq!(json, json!({"b": {"1": "q"}}));
    }
}
