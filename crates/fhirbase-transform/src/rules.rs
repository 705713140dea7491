//! Ruleset model.
//!
//! A ruleset file is a JSON object keyed by resource and datatype names.
//! Each value mirrors the nested structure of that type; the keys
//! `tr/act`, `tr/arg` and `tr/move` turn a node into an action node.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::{Result, TransformError};

const ACT_KEY: &str = "tr/act";
const ARG_KEY: &str = "tr/arg";
const MOVE_KEY: &str = "tr/move";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Wrap the value under the given type name, recursing into that
    /// type's rules when the ruleset defines them.
    Union { type_name: String },
    /// Compact a `Reference` into `{id, resourceType, display}`.
    Reference,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformNode {
    pub action: Option<Action>,
    /// Destination key when the field is renamed.
    pub rename: Option<String>,
    /// Path into the ruleset naming the node to apply instead of this one.
    pub move_to: Option<Vec<String>>,
    pub children: HashMap<String, TransformNode>,
}

impl TransformNode {
    pub fn child(&self, key: &str) -> Option<&TransformNode> {
        self.children.get(key)
    }

    pub fn is_action(&self) -> bool {
        self.action.is_some()
    }

    fn parse(value: &Map<String, Value>, path: &str) -> std::result::Result<Self, String> {
        let mut node = TransformNode::default();

        let args = match value.get(ARG_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::Object(args)) => Some(args),
            Some(_) => return Err(format!("{path}: {ARG_KEY} must be an object")),
        };

        if let Some(args) = args {
            node.rename = match args.get("key") {
                None => None,
                Some(Value::String(key)) => Some(key.clone()),
                Some(_) => return Err(format!("{path}: {ARG_KEY}.key must be a string")),
            };
        }

        node.action = match value.get(ACT_KEY) {
            None => None,
            Some(Value::String(act)) if act == "union" => {
                let type_name = args
                    .and_then(|a| a.get("type"))
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| format!("{path}: union requires {ARG_KEY}.type"))?;
                Some(Action::Union {
                    type_name: type_name.to_string(),
                })
            }
            Some(Value::String(act)) if act == "reference" => Some(Action::Reference),
            Some(other) => return Err(format!("{path}: unsupported action {other}")),
        };

        node.move_to = match value.get(MOVE_KEY) {
            None => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| format!("{path}: {MOVE_KEY} must contain strings"))
                    })
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Some(_) => return Err(format!("{path}: {MOVE_KEY} must be an array")),
        };

        for (key, child) in value {
            if key.starts_with("tr/") {
                continue;
            }
            let child_path = format!("{path}.{key}");
            match child {
                Value::Object(child) => {
                    node.children
                        .insert(key.clone(), Self::parse(child, &child_path)?);
                }
                _ => return Err(format!("{child_path}: rule node must be an object")),
            }
        }

        Ok(node)
    }
}

/// Rules for one schema version.
#[derive(Debug, Clone, PartialEq)]
pub struct Ruleset {
    version: String,
    types: HashMap<String, TransformNode>,
}

impl Ruleset {
    pub fn parse(version: &str, content: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(content)
            .map_err(|e| TransformError::ruleset_parse(version, e.to_string()))?;

        let Value::Object(root) = root else {
            return Err(TransformError::ruleset_parse(
                version,
                "ruleset root must be an object",
            ));
        };

        let mut types = HashMap::with_capacity(root.len());
        for (name, node) in &root {
            let Value::Object(node) = node else {
                return Err(TransformError::ruleset_parse(
                    version,
                    format!("{name}: rule node must be an object"),
                ));
            };
            let node = TransformNode::parse(node, name)
                .map_err(|message| TransformError::ruleset_parse(version, message))?;
            types.insert(name.clone(), node);
        }

        Ok(Self {
            version: version.to_string(),
            types,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Rules for a resource or datatype name.
    pub fn get(&self, type_name: &str) -> Option<&TransformNode> {
        self.types.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Follows a `tr/move` path: the first segment names a type, the rest
    /// descend through child nodes.
    pub fn resolve_path(&self, path: &[String]) -> Option<&TransformNode> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.types.get(first)?, |node, key| node.child(key))
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"{
        "Observation": {
            "subject": {"tr/act": "reference"},
            "valueQuantity": {"tr/act": "union", "tr/arg": {"type": "Quantity", "key": "value"}},
            "component": {
                "valueString": {"tr/act": "union", "tr/arg": {"type": "string", "key": "value"}}
            }
        },
        "Extension": {
            "extension": {"tr/move": ["Extension"]}
        },
        "Quantity": {}
    }"#;

    #[test]
    fn test_parse_actions() {
        let rs = Ruleset::parse("4.0.0", RULES).unwrap();
        assert_eq!(rs.version(), "4.0.0");
        assert_eq!(rs.type_count(), 3);

        let obs = rs.get("Observation").unwrap();
        assert_eq!(obs.child("subject").unwrap().action, Some(Action::Reference));

        let vq = obs.child("valueQuantity").unwrap();
        assert_eq!(
            vq.action,
            Some(Action::Union {
                type_name: "Quantity".into()
            })
        );
        assert_eq!(vq.rename.as_deref(), Some("value"));
        assert!(vq.children.is_empty());
    }

    #[test]
    fn test_resolve_path() {
        let rs = Ruleset::parse("4.0.0", RULES).unwrap();

        let ext = rs.get("Extension").unwrap().child("extension").unwrap();
        assert_eq!(ext.move_to, Some(vec!["Extension".to_string()]));
        assert!(rs.resolve_path(&["Extension".to_string()]).is_some());

        let nested = rs
            .resolve_path(&[
                "Observation".to_string(),
                "component".to_string(),
                "valueString".to_string(),
            ])
            .unwrap();
        assert!(nested.is_action());

        assert!(rs.resolve_path(&[]).is_none());
        assert!(rs.resolve_path(&["Missing".to_string()]).is_none());
    }

    #[test]
    fn test_union_without_type_is_rejected() {
        let err = Ruleset::parse("4.0.0", r#"{"A": {"x": {"tr/act": "union"}}}"#).unwrap_err();
        assert!(err.to_string().contains("A.x"));
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = Ruleset::parse("4.0.0", r#"{"A": {"tr/act": "explode"}}"#).unwrap_err();
        assert!(matches!(err, TransformError::RulesetParse { .. }));
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(Ruleset::parse("4.0.0", "[]").is_err());
        assert!(Ruleset::parse("4.0.0", "{").is_err());
    }
}
