use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use fhirbase_core::{Resource, compact_reference, resource_type};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::embedded::{embedded_source, ruleset_file_name};
use crate::error::{Result, TransformError};
use crate::rules::{Action, Ruleset, TransformNode};

/// Nesting limit applied when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Rewrites resources into the fhirbase storage shape.
///
/// The engine owns a lazily populated cache of rulesets keyed by schema
/// version. Loaded rulesets are never evicted. The cache is filled through
/// `&mut self`, so an engine is meant to be driven from one task; share
/// the returned `Arc<Ruleset>` values rather than the engine if transforms
/// ever run in parallel.
#[derive(Debug)]
pub struct TransformEngine {
    cache: HashMap<String, Arc<Ruleset>>,
    rules_dir: Option<PathBuf>,
    max_depth: usize,
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformEngine {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            rules_dir: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Directory searched for `fhirbase-import-<version>.json` before the
    /// embedded rulesets.
    pub fn with_rules_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.rules_dir = Some(dir.into());
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the cached ruleset for `version`, loading it on first use.
    pub fn get_or_load(&mut self, version: &str) -> Result<Arc<Ruleset>> {
        if let Some(ruleset) = self.cache.get(version) {
            return Ok(Arc::clone(ruleset));
        }

        let ruleset = Arc::new(self.load(version)?);
        debug!(version, types = ruleset.type_count(), "loaded transform ruleset");
        self.cache.insert(version.to_string(), Arc::clone(&ruleset));
        Ok(ruleset)
    }

    fn load(&self, version: &str) -> Result<Ruleset> {
        if let Some(dir) = &self.rules_dir {
            let path = dir.join(ruleset_file_name(version));
            if path.is_file() {
                let content = std::fs::read_to_string(&path)
                    .map_err(|source| TransformError::RulesetIo { path, source })?;
                return Ruleset::parse(version, &content);
            }
        }

        let source = embedded_source(version).ok_or_else(|| TransformError::UnknownRuleset {
            version: version.to_string(),
        })?;
        Ruleset::parse(version, source)
    }

    /// Transforms one resource with the ruleset for `version`.
    ///
    /// Resources whose type has no rules pass through unchanged.
    pub fn do_transform(&mut self, resource: Resource, version: &str) -> Result<Resource> {
        let ruleset = self.get_or_load(version)?;

        let rt = resource_type(&resource).ok_or(TransformError::MissingResourceType)?;
        let Some(rule) = ruleset.get(rt) else {
            return Ok(resource);
        };

        match self.transform(Value::Object(resource), Some(rule), &ruleset, 0)? {
            Value::Object(out) => Ok(out),
            _ => Err(TransformError::NotAnObject),
        }
    }

    /// Applies `rule` to `node`.
    ///
    /// Action nodes are terminal: once one applies, its children are not
    /// walked. Arrays reuse the rule of the array itself for every element.
    pub fn transform(
        &self,
        node: Value,
        rule: Option<&TransformNode>,
        ruleset: &Ruleset,
        depth: usize,
    ) -> Result<Value> {
        if depth > self.max_depth {
            return Err(TransformError::TooDeep {
                max_depth: self.max_depth,
            });
        }

        let Some(rule) = rule else {
            return Ok(node);
        };

        if let Some(action) = &rule.action
            && !node.is_array()
        {
            return match action {
                Action::Reference => Ok(compact(node)),
                Action::Union { type_name } => {
                    let inner = match ruleset.get(type_name) {
                        Some(_) if type_name == "Reference" => compact(node),
                        Some(type_rule) => {
                            self.transform(node, Some(type_rule), ruleset, depth + 1)?
                        }
                        // types without rules are wrapped untouched
                        None => node,
                    };
                    let mut wrapped = Map::with_capacity(1);
                    wrapped.insert(type_name.clone(), inner);
                    Ok(Value::Object(wrapped))
                }
            };
        }

        match node {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    let Some(child) = rule.child(&key) else {
                        out.insert(key, value);
                        continue;
                    };

                    let next = match &child.move_to {
                        Some(path) => {
                            let target = ruleset.resolve_path(path);
                            if target.is_none() {
                                warn!(path = ?path, "cannot resolve tr/move target, copying field as is");
                            }
                            target
                        }
                        None => Some(child),
                    };

                    let dest = child.rename.clone().unwrap_or(key);
                    out.insert(dest, self.transform(value, next, ruleset, depth + 1)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.transform(item, Some(rule), ruleset, depth + 1))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            scalar => Ok(scalar),
        }
    }
}

/// `{"reference": "Type/id", "display": ..}` to `{"id", "resourceType", "display"}`.
/// Non-string references are dropped; non-object nodes are left alone.
fn compact(node: Value) -> Value {
    let Value::Object(mut reference) = node else {
        return node;
    };

    let mut out = Map::with_capacity(3);
    if let Some(Value::String(raw)) = reference.get("reference") {
        let compacted = compact_reference(raw);
        out.insert("id".to_string(), Value::String(compacted.id));
        if let Some(rt) = compacted.resource_type {
            out.insert("resourceType".to_string(), Value::String(rt));
        }
    }
    if let Some(display) = reference.remove("display") {
        out.insert("display".to_string(), display);
    }
    Value::Object(out)
}
