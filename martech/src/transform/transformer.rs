use config::shared::{Coercion, TransformConfig};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::MartechResult;
use crate::transform::coercion::{Coerced, coerce};
use crate::transform::{TransformFn, TransformParams, TransformRegistry};
use crate::types::{Record, TransformedRecord, is_truthy};

/// Per-run tallies produced while transforming records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Records dropped because no identity could be resolved or the custom function failed.
    pub invalid: usize,
    /// Coercions that failed and kept the original value.
    pub coercion_warnings: usize,
}

/// Declarative record transformation built from a [`TransformConfig`].
///
/// Steps run in a fixed order: identity resolution, custom function, coercions, attribute
/// projection, key renaming.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    identity_fields: Vec<String>,
    transform_fn: Option<(String, TransformFn)>,
    params: TransformParams,
    type_map: IndexMap<String, Coercion>,
    attributes: Option<Vec<String>>,
    key_rename_map: IndexMap<String, String>,
}

impl RecordTransformer {
    /// Builds the transformer, resolving the custom function name against `registry`.
    pub fn new(config: &TransformConfig, registry: &TransformRegistry) -> MartechResult<Self> {
        let transform_fn = match &config.transform_fn {
            Some(name) => Some((name.clone(), registry.resolve(name)?)),
            None => None,
        };

        Ok(Self {
            identity_fields: config
                .identity_fields
                .fields()
                .into_iter()
                .map(str::to_owned)
                .collect(),
            transform_fn,
            params: config.params.clone(),
            type_map: config.type_map.clone(),
            attributes: config.attributes.clone(),
            key_rename_map: config.key_rename_map.clone(),
        })
    }

    /// Transforms `record`, or returns `None` when it has to be dropped.
    pub fn transform(&self, record: Record, stats: &mut TransformStats) -> Option<TransformedRecord> {
        let Some(identity) = resolve_identity(&record, &self.identity_fields) else {
            debug!(identity_fields = ?self.identity_fields, "record has no identity, dropping it");
            stats.invalid += 1;
            return None;
        };

        let mut data = match &self.transform_fn {
            Some((name, function)) => match function(record, &self.params) {
                Ok(data) => data,
                Err(err) => {
                    warn!(transform_fn = %name, error = %err, "custom transform failed, dropping record");
                    stats.invalid += 1;
                    return None;
                }
            },
            None => record,
        };

        stats.coercion_warnings += apply_coercions(&mut data, &self.type_map);

        if let Some(attributes) = &self.attributes {
            data = project_attributes(data, attributes);
        }

        rename_keys(&mut data, &self.key_rename_map);

        Some(TransformedRecord { identity, data })
    }
}

/// Returns the value of the first identity field holding a truthy value.
pub fn resolve_identity(record: &Record, identity_fields: &[String]) -> Option<Value> {
    identity_fields
        .iter()
        .filter_map(|field| record.get(field))
        .find(|value| is_truthy(value))
        .cloned()
}

/// Applies coercions to the fields present in `record` and returns the number of failures.
pub fn apply_coercions(record: &mut Record, type_map: &IndexMap<String, Coercion>) -> usize {
    let mut warnings = 0;

    for (field, coercion) in type_map {
        let Some(value) = record.get_mut(field) else {
            continue;
        };

        match coerce(field, *coercion, value) {
            Coerced::Value(coerced) => *value = coerced,
            Coerced::Kept(err) => {
                warn!(field = %field, coercion = ?coercion, error = %err, "coercion failed, keeping original value");
                warnings += 1;
            }
        }
    }

    warnings
}

/// Keeps only the allowlisted fields present in `record`, in allowlist order.
pub fn project_attributes(mut record: Record, attributes: &[String]) -> Record {
    let mut projected = Record::with_capacity(attributes.len());
    for attribute in attributes {
        if let Some(value) = record.remove(attribute) {
            projected.insert(attribute.clone(), value);
        }
    }
    projected
}

/// Moves the value of each present `old` key to `new`, in map order.
pub fn rename_keys(record: &mut Record, key_rename_map: &IndexMap<String, String>) {
    for (old, new) in key_rename_map {
        if let Some(value) = record.shift_remove(old) {
            record.insert(new.clone(), value);
        }
    }
}
