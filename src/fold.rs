//! Single-value views over multi-value maps.
//!
//! The proxy-event contract carries every header and query parameter twice:
//! once with all values in arrival order, once with only the first. The
//! multi-value side is authoritative; the single-value side is derived here.

use std::collections::HashMap;

/// Keeps the first value of every key.
///
/// Keys whose value list is empty are left out rather than mapped to `""`.
pub fn fold(multi: &HashMap<String, Vec<String>>) -> HashMap<String, String> {
    multi.iter()
        .filter_map(|(k, values)| values.first().map(|v| (k.clone(), v.clone())))
        .collect()
}

/// Appends `value` under `key`, preserving arrival order.
pub(crate) fn push_value(multi: &mut HashMap<String, Vec<String>>, key: String, value: String) {
    multi.entry(key).or_default().push(value);
}
