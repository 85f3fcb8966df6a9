//! Error types for patch operations.

use thiserror::Error;

/// Errors that can occur while importing or editing a patch.
///
/// The sanitizer repairs semantic problems instead of failing; only a syntax error
/// or a non-object document aborts an import. Editing operations report every
/// rejected change.
#[derive(Debug, Error)]
pub enum PatchError {
    /// Failed to parse JSON
    #[error("failed to parse patch JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Top-level document is not an object
    #[error("patch document must be a JSON object, found {found}")]
    NotAnObject {
        /// JSON type that was found instead.
        found: &'static str,
    },

    /// Unknown node template
    #[error("unknown node template: {0}")]
    UnknownTemplate(String),

    /// Node id not present in the patch
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// Source id not among the default or patch sources
    #[error("unknown source: {0}")]
    UnknownSource(String),

    /// Route id not present in the patch
    #[error("unknown route: {0}")]
    UnknownRoute(String),

    /// Parameter not declared by the node's template
    #[error("node '{node}' has no parameter '{param}'")]
    UnknownParam {
        /// Node id.
        node: String,
        /// Parameter name.
        param: String,
    },

    /// Route target is not of the form `nodeId.paramName`
    #[error("invalid route target '{0}': expected 'nodeId.param'")]
    InvalidTarget(String),

    /// Edge already exists
    #[error("edge {from} -> {to} already exists")]
    DuplicateEdge {
        /// Upstream node id.
        from: String,
        /// Downstream node id.
        to: String,
    },

    /// Edge from a node to itself
    #[error("node '{0}' cannot be connected to itself")]
    SelfEdge(String),

    /// Node exists but does not produce modulation
    #[error("node '{0}' is not a modulator")]
    NotAModulator(String),

    /// Value rejected for a field
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Description of why the value is invalid.
        reason: String,
    },

    /// Factory patch not found
    #[error("factory patch not found: {0}")]
    UnknownFactoryPatch(String),
}

impl PatchError {
    /// Create an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PatchError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown parameter error.
    pub fn unknown_param(node: impl Into<String>, param: impl Into<String>) -> Self {
        PatchError::UnknownParam {
            node: node.into(),
            param: param.into(),
        }
    }

    /// Name of a JSON value's type, for [`PatchError::NotAnObject`].
    pub fn json_type_name(value: &serde_json::Value) -> &'static str {
        match value {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "boolean",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    // --- Display formatting ---

    #[test]
    fn not_an_object_display() {
        let err = PatchError::NotAnObject { found: "array" };
        assert_eq!(
            err.to_string(),
            "patch document must be a JSON object, found array"
        );
    }

    #[test]
    fn unknown_param_display() {
        let err = PatchError::unknown_param("f1", "drive");
        assert_eq!(err.to_string(), "node 'f1' has no parameter 'drive'");
    }

    #[test]
    fn invalid_target_display() {
        let err = PatchError::InvalidTarget("cutoff".to_string());
        let msg = err.to_string();
        assert!(msg.contains("'cutoff'"), "got: {msg}");
        assert!(msg.contains("nodeId.param"), "got: {msg}");
    }

    #[test]
    fn duplicate_edge_display() {
        let err = PatchError::DuplicateEdge {
            from: "a".to_string(),
            to: "b".to_string(),
        };
        assert_eq!(err.to_string(), "edge a -> b already exists");
    }

    #[test]
    fn invalid_value_factory() {
        let err = PatchError::invalid_value("amount", "must be finite");
        assert!(
            matches!(err, PatchError::InvalidValue { ref field, .. } if field == "amount")
        );
        assert_eq!(err.to_string(), "invalid value for 'amount': must be finite");
    }

    // --- Error::source() chain ---

    #[test]
    fn json_source_is_some() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = PatchError::from(parse_err);
        assert!(err.source().is_some(), "Json must expose the parser error");
        assert!(err.to_string().starts_with("failed to parse patch JSON"));
    }

    #[test]
    fn unknown_node_source_is_none() {
        let err = PatchError::UnknownNode("n9".to_string());
        assert!(err.source().is_none());
    }

    #[test]
    fn json_type_names() {
        assert_eq!(PatchError::json_type_name(&serde_json::json!([])), "array");
        assert_eq!(PatchError::json_type_name(&serde_json::json!(null)), "null");
        assert_eq!(PatchError::json_type_name(&serde_json::json!("x")), "string");
    }
}
