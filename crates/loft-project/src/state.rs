//! Project state and activity snapshots

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATE_VERSION: &str = "2.0";

/// A full point-in-time copy of the editable project fields.
///
/// Appended to `activity_history` by the editor on every committed action;
/// the history itself is never nested inside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub structured_prompt: Option<Value>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub furniture_list: Option<String>,
    #[serde(default)]
    pub glb_list: Vec<Value>,
    #[serde(default)]
    pub bounding_boxes: Option<Value>,
    #[serde(default)]
    pub glb_assignments: serde_json::Map<String, Value>,
}

/// The whole editable state of a project, persisted wholesale as one JSON
/// blob per project. Saves are full overwrites, never field-level merges.
///
/// `current_history_index` is the undo/redo cursor into
/// `activity_history`: it may point before the end after an undo, and the
/// editor truncates everything past it before appending the next snapshot.
/// This store persists whatever sequence and cursor it is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectState {
    pub version: String,
    /// ISO 8601 timestamp of the save that produced this blob
    pub timestamp: String,
    #[serde(default)]
    pub structured_prompt: Option<Value>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub furniture_list: Option<String>,
    #[serde(default)]
    pub glb_list: Vec<Value>,
    #[serde(default)]
    pub bounding_boxes: Option<Value>,
    #[serde(default)]
    pub glb_assignments: serde_json::Map<String, Value>,
    #[serde(default)]
    pub activity_history: Vec<Snapshot>,
    #[serde(default = "default_history_index")]
    pub current_history_index: i64,
}

fn default_history_index() -> i64 {
    -1
}

impl ProjectState {
    /// Fresh state carrying the given snapshot's fields, with history
    /// copied in full. Used when forking a project variation.
    pub fn from_source(source: &ProjectState, timestamp: String) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            timestamp,
            structured_prompt: source.structured_prompt.clone(),
            seed: source.seed,
            image_url: source.image_url.clone(),
            furniture_list: source.furniture_list.clone(),
            glb_list: source.glb_list.clone(),
            bounding_boxes: source.bounding_boxes.clone(),
            glb_assignments: source.glb_assignments.clone(),
            activity_history: source.activity_history.clone(),
            current_history_index: source.current_history_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_json_roundtrip() {
        let mut assignments = serde_json::Map::new();
        assignments.insert("box_1".to_string(), json!("chair.glb"));

        let state = ProjectState {
            version: STATE_VERSION.to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            structured_prompt: Some(json!({"scene": "living room"})),
            seed: Some(42),
            image_url: Some("https://storage.example.com/b/u/img.png".to_string()),
            furniture_list: Some("1. sofa\n2. lamp".to_string()),
            glb_list: vec![json!({"url": "chair.glb"})],
            bounding_boxes: Some(json!([{"label": "sofa"}])),
            glb_assignments: assignments,
            activity_history: vec![Snapshot::default()],
            current_history_index: 0,
        };

        let encoded = serde_json::to_vec(&state).unwrap();
        let decoded: ProjectState = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded.seed, Some(42));
        assert_eq!(decoded.activity_history.len(), 1);
        assert_eq!(decoded.current_history_index, 0);
    }

    #[test]
    fn test_missing_fields_default() {
        // Blobs written before a field existed still load
        let decoded: ProjectState = serde_json::from_str(
            r#"{"version": "2.0", "timestamp": "2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(decoded.activity_history.is_empty());
        assert_eq!(decoded.current_history_index, -1);
    }

    #[test]
    fn test_from_source_is_deep_copy() {
        let source = ProjectState {
            version: STATE_VERSION.to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            structured_prompt: Some(json!({"a": 1})),
            seed: Some(7),
            image_url: None,
            furniture_list: None,
            glb_list: vec![json!("x.glb")],
            bounding_boxes: None,
            glb_assignments: serde_json::Map::new(),
            activity_history: vec![Snapshot::default(), Snapshot::default()],
            current_history_index: 1,
        };

        let mut fork = ProjectState::from_source(&source, "2026-02-01T00:00:00Z".to_string());
        assert_eq!(fork.activity_history.len(), 2);
        assert_eq!(fork.current_history_index, 1);

        // Mutating the fork must not touch the source
        fork.activity_history.push(Snapshot::default());
        fork.glb_list.clear();
        assert_eq!(source.activity_history.len(), 2);
        assert_eq!(source.glb_list.len(), 1);
    }
}
