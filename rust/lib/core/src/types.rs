/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Shallow merge of a JSON object into a base value.
///
/// Each top-level key of `patch` replaces the same key in `base`, including
/// nested objects and `null` values. Keys absent from `patch` are left
/// untouched. A non-object `base` is replaced by an empty object first; a
/// non-object `patch` is ignored.
pub fn merge_fields(base: &mut serde_json::Value, patch: &serde_json::Value) {
    let Some(patch_obj) = patch.as_object() else {
        return;
    };
    if !base.is_object() {
        *base = serde_json::Value::Object(serde_json::Map::new());
    }
    if let Some(base_obj) = base.as_object_mut() {
        for (key, value) in patch_obj {
            base_obj.insert(key.clone(), value.clone());
        }
    }
}
