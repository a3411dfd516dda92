//! The service manifest, with recursive token substitution.
//!
//! The manifest document carries `{{token}}` placeholders in its URL
//! templates; before returning it, every string value of the nested
//! document has the placeholder replaced by the caller's credential.

use serde_json::{json, Value};

use super::extend::EXTEND_PROPERTIES;

/// Placeholder replaced by the caller's credential.
pub const TOKEN_PLACEHOLDER: &str = "{{token}}";

/// Build the manifest for this service instance, already substituted
/// for the given caller credential.
pub fn manifest(public_url: &str, credential: &str) -> Value {
    let mut doc = manifest_template(public_url);
    substitute_tokens(&mut doc, credential);
    doc
}

fn manifest_template(public_url: &str) -> Value {
    json!({
        "versions": ["0.2"],
        "name": "Gazetteer Reconciliation Service",
        "identifierSpace": format!("{public_url}/places/"),
        "schemaSpace": format!("{public_url}/schema/"),
        "defaultTypes": [
            {"id": "Place", "name": "Place"}
        ],
        "view": {
            "url": format!("{public_url}/places/{{{{id}}}}?token={TOKEN_PLACEHOLDER}")
        },
        "suggest": {
            "entity": {
                "service_url": public_url,
                "service_path": format!("/suggest/entity?token={TOKEN_PLACEHOLDER}")
            },
            "property": {
                "service_url": public_url,
                "service_path": format!("/suggest/property?token={TOKEN_PLACEHOLDER}")
            }
        },
        "extend": {
            "propose_properties": {
                "service_url": public_url,
                "service_path": format!("/reconcile/properties?token={TOKEN_PLACEHOLDER}")
            },
            "property_settings": EXTEND_PROPERTIES.iter().map(|p| json!({
                "name": p.id,
                "label": p.name,
                "type": p.kind,
            })).collect::<Vec<_>>()
        }
    })
}

/// Replace the placeholder in every string value of a nested document,
/// recursing through objects and arrays.
pub fn substitute_tokens(value: &mut Value, credential: &str) {
    match value {
        Value::String(s) => {
            if s.contains(TOKEN_PLACEHOLDER) {
                *s = s.replace(TOKEN_PLACEHOLDER, credential);
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute_tokens(item, credential);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                substitute_tokens(v, credential);
            }
        }
        _ => {}
    }
}
