//! Search response normalization
//!
//! Mirrors do not agree on the shape of a search response. The items may sit
//! at the top level (`{ "items": [...] }`), under a section key
//! (`{ "tracks": { "items": [...] } }`), inside an array wrapper, or deeper.
//! [`find_section`] walks the tree for the first object carrying an `items`
//! array, preferring the given section key at every level.

use core_library::models::SearchResponse;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Nesting deeper than this is not searched.
const MAX_DEPTH: usize = 16;

/// First object holding an `items` array, or `None`.
///
/// Arrays are scanned in order. When `key` is given and an object has that
/// field, the field is searched before the object's own `items` and before
/// its other fields.
pub fn find_section<'a>(value: &'a Value, key: Option<&str>) -> Option<&'a Value> {
    find_section_at(value, key, 0)
}

fn find_section_at<'a>(value: &'a Value, key: Option<&str>, depth: usize) -> Option<&'a Value> {
    if depth > MAX_DEPTH {
        return None;
    }

    match value {
        Value::Array(elements) => elements
            .iter()
            .find_map(|element| find_section_at(element, key, depth + 1)),
        Value::Object(map) => {
            if let Some(guided) = key.and_then(|k| map.get(k)) {
                if let Some(found) = find_section_at(guided, key, depth + 1) {
                    return Some(found);
                }
            }

            if matches!(map.get("items"), Some(Value::Array(_))) {
                return Some(value);
            }

            map.iter()
                .filter(|(field, _)| Some(field.as_str()) != key)
                .find_map(|(_, child)| find_section_at(child, key, depth + 1))
        }
        _ => None,
    }
}

/// Build a typed page from a raw response.
///
/// A missing section yields an empty page. Items that fail to deserialize
/// are skipped with a warning instead of failing the whole page.
pub fn normalize_search<T: DeserializeOwned>(value: &Value, key: Option<&str>) -> SearchResponse<T> {
    let Some(section) = find_section(value, key) else {
        return SearchResponse::empty();
    };

    let raw_items = section
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut skipped = 0usize;
    let items: Vec<T> = raw_items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                skipped += 1;
                warn!(section = key.unwrap_or("items"), error = %e, "Skipping malformed item");
                None
            }
        })
        .collect();

    let number = |field: &str| {
        section
            .get(field)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    };

    let total = number("totalNumberOfItems").unwrap_or((items.len() + skipped) as u32);

    SearchResponse {
        limit: number("limit").unwrap_or(items.len() as u32),
        offset: number("offset").unwrap_or(0),
        total_number_of_items: total,
        items,
    }
}

/// Items of a list that may be a bare array, an `items` section, or an
/// array of `{ "item": {...} }` wrappers (album and playlist track listings).
pub fn normalize_list<T: DeserializeOwned>(value: &Value, key: Option<&str>) -> Vec<T> {
    let elements: &[Value] = match value {
        Value::Array(elements) if !elements.iter().any(|e| e.get("items").is_some()) => elements,
        _ => find_section(value, key)
            .and_then(|section| section.get("items"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
    };

    elements
        .iter()
        .map(|element| element.get("item").unwrap_or(element))
        .filter_map(|element| serde_json::from_value(element.clone()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: i64,
    }

    #[test]
    fn test_top_level_items() {
        let value = json!({ "limit": 25, "offset": 0, "totalNumberOfItems": 300, "items": [{ "id": 1 }] });
        let page: SearchResponse<Item> = normalize_search(&value, Some("tracks"));
        assert_eq!(page.items, vec![Item { id: 1 }]);
        assert_eq!(page.total_number_of_items, 300);
        assert_eq!(page.limit, 25);
    }

    #[test]
    fn test_guided_by_section_key() {
        let value = json!({
            "artists": { "items": [{ "id": 10 }] },
            "tracks": { "items": [{ "id": 20 }], "totalNumberOfItems": 1 }
        });
        let tracks: SearchResponse<Item> = normalize_search(&value, Some("tracks"));
        assert_eq!(tracks.items, vec![Item { id: 20 }]);

        let artists: SearchResponse<Item> = normalize_search(&value, Some("artists"));
        assert_eq!(artists.items, vec![Item { id: 10 }]);
    }

    #[test]
    fn test_array_wrapper_is_scanned_in_order() {
        let value = json!([
            { "version": "2.0" },
            { "data": { "items": [{ "id": 3 }] } },
            { "items": [{ "id": 4 }] }
        ]);
        let page: SearchResponse<Item> = normalize_search(&value, None);
        assert_eq!(page.items, vec![Item { id: 3 }]);
    }

    #[test]
    fn test_missing_section_is_empty() {
        let value = json!({ "error": "nothing here" });
        let page: SearchResponse<Item> = normalize_search(&value, Some("tracks"));
        assert!(page.is_empty());
        assert_eq!(page.total_number_of_items, 0);
    }

    #[test]
    fn test_items_must_be_an_array() {
        let value = json!({ "items": "nope", "tracks": { "items": [{ "id": 5 }] } });
        assert_eq!(find_section(&value, None), value.get("tracks"));
    }

    #[test]
    fn test_malformed_items_are_skipped() {
        let value = json!({ "items": [{ "id": 1 }, { "name": "no id" }] });
        let page: SearchResponse<Item> = normalize_search(&value, None);
        assert_eq!(page.items, vec![Item { id: 1 }]);
        assert_eq!(page.total_number_of_items, 2);
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut value = json!({ "items": [{ "id": 1 }] });
        for _ in 0..40 {
            value = json!({ "wrapper": value });
        }
        assert!(find_section(&value, None).is_none());
    }

    #[test]
    fn test_list_shapes() {
        let bare = json!([{ "id": 1 }, { "id": 2 }]);
        assert_eq!(normalize_list::<Item>(&bare, None).len(), 2);

        let wrapped = json!({ "items": [{ "item": { "id": 7 }, "type": "track" }] });
        assert_eq!(normalize_list::<Item>(&wrapped, None), vec![Item { id: 7 }]);
    }
}
