//! Locating a mesh URL inside an arbitrarily nested provider payload
//!
//! Reconstruction providers bury the usable asset URL at unpredictable
//! depths. The search is an explicit worklist over the JSON value rather
//! than recursion, so deeply nested payloads cannot overflow the stack,
//! with a visited set keyed by node address so shared or repeated
//! composite nodes are traversed once.

use serde_json::Value;
use std::collections::{HashSet, VecDeque};

/// Breadth-first search for the first string whose lowercase form ends
/// with one of `extensions`. Composite values (arrays and objects) are
/// expanded in encounter order; scalars other than strings are skipped.
pub fn find_url_with_extensions<'a>(value: &'a Value, extensions: &[String]) -> Option<&'a str> {
    let mut queue: VecDeque<&Value> = VecDeque::new();
    let mut seen: HashSet<*const Value> = HashSet::new();
    queue.push_back(value);

    while let Some(curr) = queue.pop_front() {
        match curr {
            Value::String(s) => {
                let lower = s.to_lowercase();
                if extensions.iter().any(|ext| lower.ends_with(ext.as_str())) {
                    return Some(s);
                }
            }
            Value::Array(items) => {
                if seen.insert(curr as *const Value) {
                    for item in items {
                        queue.push_back(item);
                    }
                }
            }
            Value::Object(map) => {
                if seen.insert(curr as *const Value) {
                    for item in map.values() {
                        queue.push_back(item);
                    }
                }
            }
            _ => {}
        }
    }

    None
}
