//! Flattening of Notion page properties into plain values.
//!
//! Notion wraps every property value in a typed envelope
//! (`{"type": "select", "select": {"name": "Active"}}`). These helpers reduce
//! the envelopes the sync cares about to strings and id lists.

use serde_json::Value;

/// Concatenates the `plain_text` of a rich-text array.
pub fn rich_text_plain(rich_text: &Value) -> String {
    rich_text
        .as_array()
        .map(|spans| {
            spans
                .iter()
                .filter_map(|span| span.get("plain_text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

/// Renders a property value as text.
///
/// Returns `None` for property types with no textual rendering.
pub fn property_text(property: &Value) -> Option<String> {
    let kind = property.get("type")?.as_str()?;
    let value = property.get(kind)?;
    let text = match kind {
        "title" | "rich_text" => rich_text_plain(value),
        "select" | "status" => value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        "multi_select" => names(value).join(", "),
        "date" => value
            .get("start")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        "number" => value.as_f64().map(|n| n.to_string()).unwrap_or_default(),
        "checkbox" => if value.as_bool().unwrap_or(false) { "Yes" } else { "No" }.to_owned(),
        "relation" => relation_ids(property).join(", "),
        "people" => names(value).join(", "),
        "url" | "email" | "phone_number" => value.as_str().unwrap_or_default().to_owned(),
        _ => return None,
    };
    Some(text)
}

/// Ids of the pages a `relation` property points at, in order.
pub fn relation_ids(property: &Value) -> Vec<String> {
    property
        .get("relation")
        .and_then(Value::as_array)
        .map(|links| {
            links
                .iter()
                .filter_map(|link| link.get("id").and_then(Value::as_str))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Whether the page object truncated this relation.
///
/// Page objects carry at most 25 links per relation; the rest must be read
/// from the page property endpoint.
pub fn relation_has_more(property: &Value) -> bool {
    property
        .get("has_more")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// The property's own id, used to address the page property endpoint.
pub fn property_id(property: &Value) -> Option<&str> {
    property.get("id").and_then(Value::as_str)
}

/// Linked page id from one `property_item` of a paginated relation.
pub fn relation_item_id(item: &Value) -> Option<String> {
    item.get("relation")?
        .get("id")?
        .as_str()
        .map(str::to_owned)
}

/// Looks up a named property on a page object.
pub fn page_property<'a>(page: &'a Value, name: &str) -> Option<&'a Value> {
    page.get("properties")?.get(name)
}

/// Text of the page's `title`-typed property, whatever it is called.
pub fn page_title(page: &Value) -> Option<String> {
    page.get("properties")?
        .as_object()?
        .values()
        .find(|p| p.get("type").and_then(Value::as_str) == Some("title"))
        .and_then(property_text)
}

fn names(values: &Value) -> Vec<&str> {
    values
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.get("name").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}
