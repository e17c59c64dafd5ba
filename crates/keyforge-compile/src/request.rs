//! Compile job submissions.
//!
//! A submission names a board, a keymap, a layout macro, and the key layers
//! to compile. Board and keymap identifiers are later used by the build
//! pipeline to construct filesystem paths, so unsafe identifiers are
//! rejected here and never reach the queue.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use keyforge_core::{Error, Result};

/// Help text stamped into submissions that arrive without documentation.
///
/// The produced keymap JSON is a configurator export; this text tells users
/// what to do with it offline.
const KEYMAP_DOCUMENTATION: &str = "\
This file is a configurator export. It can be used directly with the build tooling.

To set up a local build environment check out the documentation.

You can compile this keymap locally with: `compile %KEYBOARD%_%KEYMAP%.json`";

/// A validated firmware compile submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileRequest {
    /// Board identifier (e.g. `planck`).
    pub keyboard: String,
    /// Keymap identifier (e.g. `default`).
    pub keymap: String,
    /// Layout macro the layers are expressed against (e.g. `LAYOUT`).
    pub layout: String,
    /// Key layers, outermost first.
    pub layers: Vec<Vec<String>>,
    /// Human-readable help text embedded in the exported keymap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// Worker-defined fields passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompileRequest {
    /// Builds a request from a raw JSON submission.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the board or keymap identifier is
    /// unsafe, if mandatory keys are missing, or if a field has the wrong
    /// shape. Unsafe identifiers are checked first: they must never be
    /// echoed into later pipeline stages.
    pub fn from_value(payload: &Value) -> Result<Self> {
        let object = payload
            .as_object()
            .ok_or_else(|| Error::validation("submission must be a JSON object"))?;

        for field in ["keyboard", "keymap"] {
            if let Some(value) = object.get(field).and_then(Value::as_str) {
                validate_identifier(field, value)?;
            }
        }

        let missing: Vec<&str> = ["keyboard", "keymap", "layout", "layers"]
            .into_iter()
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(Error::validation(format!(
                "invalid or missing keys: {}",
                missing.join(", ")
            )));
        }

        let request: Self = serde_json::from_value(payload.clone())
            .map_err(|e| Error::validation(format!("malformed submission: {e}")))?;

        validate_identifier("keyboard", &request.keyboard)?;
        validate_identifier("keymap", &request.keymap)?;

        Ok(request)
    }

    /// Fills in the default documentation text if the submission has none.
    pub fn ensure_documentation(&mut self) {
        if self.documentation.is_none() {
            self.documentation = Some(
                KEYMAP_DOCUMENTATION
                    .replace("%KEYBOARD%", &self.keyboard)
                    .replace("%KEYMAP%", &self.keymap),
            );
        }
    }
}

/// Rejects identifiers that could alter path resolution downstream.
fn validate_identifier(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(format!("{field} cannot be empty")));
    }

    if value.contains('/') || value.contains('\\') {
        return Err(Error::validation(format!(
            "{field} cannot contain path separators"
        )));
    }

    if value.contains("..") {
        return Err(Error::validation(format!(
            "{field} cannot contain parent-directory sequences"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> Value {
        json!({
            "keyboard": "planck",
            "keymap": "default",
            "layout": "LAYOUT",
            "layers": [["KC_A", "KC_B"], ["KC_TRNS", "KC_TRNS"]],
        })
    }

    #[test]
    fn accepts_a_valid_submission() {
        let request = CompileRequest::from_value(&valid_payload()).unwrap();
        assert_eq!(request.keyboard, "planck");
        assert_eq!(request.keymap, "default");
        assert_eq!(request.layers.len(), 2);
    }

    #[test]
    fn rejects_traversal_in_keyboard() {
        let mut payload = valid_payload();
        payload["keyboard"] = json!("../etc");
        let err = CompileRequest::from_value(&payload).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn rejects_separator_in_keymap() {
        let mut payload = valid_payload();
        payload["keymap"] = json!("default/../../passwd");
        let err = CompileRequest::from_value(&payload).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn reports_all_missing_keys_at_once() {
        let payload = json!({"keyboard": "planck"});
        let err = CompileRequest::from_value(&payload).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("keymap"));
        assert!(message.contains("layout"));
        assert!(message.contains("layers"));
    }

    #[test]
    fn rejects_non_object_payload() {
        assert!(CompileRequest::from_value(&json!([1, 2, 3])).is_err());
        assert!(CompileRequest::from_value(&json!("planck")).is_err());
    }

    #[test]
    fn preserves_extra_fields() {
        let mut payload = valid_payload();
        payload["author"] = json!("someone");
        let request = CompileRequest::from_value(&payload).unwrap();
        assert_eq!(request.extra.get("author"), Some(&json!("someone")));
    }

    #[test]
    fn stamps_default_documentation() {
        let mut request = CompileRequest::from_value(&valid_payload()).unwrap();
        request.ensure_documentation();
        let documentation = request.documentation.unwrap();
        assert!(documentation.contains("planck_default.json"));
    }

    #[test]
    fn keeps_caller_documentation() {
        let mut payload = valid_payload();
        payload["documentation"] = json!("my own notes");
        let mut request = CompileRequest::from_value(&payload).unwrap();
        request.ensure_documentation();
        assert_eq!(request.documentation.as_deref(), Some("my own notes"));
    }
}
