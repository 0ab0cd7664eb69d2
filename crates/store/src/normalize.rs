//! Change-detection hashing.

use crate::error::{ErrorKind, Result};
use crate::resource::ResourceKind;
use exn::ResultExt;
use serde_json::Value;
use url::Url;

/// Remove `param` from the query string of the URL stored at `payload[field]`.
///
/// Anything that isn't a string holding a parseable URL is left alone, as is
/// a URL that doesn't carry `param`.
pub(crate) fn strip_query_param(payload: &mut Value, field: &str, param: &str) {
    let Some(Value::String(raw)) = payload.get_mut(field) else {
        return;
    };
    let Ok(mut url) = Url::parse(raw) else {
        return;
    };
    if !url.query_pairs().any(|(key, _)| key == param) {
        return;
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept.iter());
    }
    *raw = url.to_string();
}

/// Lowercase hex BLAKE3 digest of the normalized payload.
///
/// `serde_json::Map` keeps its keys sorted, so serializing a [`Value`] is
/// canonical: two payloads that differ only in key order hash identically.
pub(crate) fn content_hash(kind: ResourceKind, payload: &Value) -> Result<String> {
    let canonical = serde_json::to_vec(&kind.normalize(payload)).or_raise(|| ErrorKind::InvalidData("payload"))?;
    Ok(blake3::hash(&canonical).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({ "url": "not a url ?verifier=1" }), "not a url ?verifier=1")]
    #[case(json!({ "url": "https://x.example.com/a?verifier=1" }), "https://x.example.com/a")]
    #[case(json!({ "url": "https://x.example.com/a?b=2" }), "https://x.example.com/a?b=2")]
    fn test_strip_query_param(#[case] mut payload: Value, #[case] expected: &str) {
        strip_query_param(&mut payload, "url", "verifier");
        assert_eq!(payload["url"], expected);
    }

    #[test]
    fn test_strip_non_string_field() {
        let mut payload = json!({ "url": null });
        strip_query_param(&mut payload, "url", "verifier");
        assert_eq!(payload, json!({ "url": null }));
        let mut payload = json!([1, 2, 3]);
        strip_query_param(&mut payload, "url", "verifier");
        assert_eq!(payload, json!([1, 2, 3]));
    }

    #[test]
    fn test_hash_is_key_order_independent() {
        let a: Value = serde_json::from_str(r#"{"id": 1, "name": "a", "nested": {"x": 1, "y": 2}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"nested": {"y": 2, "x": 1}, "name": "a", "id": 1}"#).unwrap();
        let hash = content_hash(ResourceKind::Folder, &a).unwrap();
        assert_eq!(hash, content_hash(ResourceKind::Folder, &b).unwrap());
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_ignores_volatile_fields() {
        let first = json!({ "id": 1, "url": "https://x.example.com/files/1/download?verifier=aaa" });
        let second = json!({ "id": 1, "url": "https://x.example.com/files/1/download?verifier=bbb" });
        assert_eq!(
            content_hash(ResourceKind::File, &first).unwrap(),
            content_hash(ResourceKind::File, &second).unwrap()
        );
        // Folders have no volatile fields.
        assert_ne!(
            content_hash(ResourceKind::Folder, &first).unwrap(),
            content_hash(ResourceKind::Folder, &second).unwrap()
        );
    }
}
