use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::bail;
use crate::error::{ErrorKind, MartechResult};
use crate::transform::builtins::{get_birth_date, get_gender_implicit_data};
use crate::types::Record;

/// Free-form parameters handed to a custom transform function.
pub type TransformParams = Map<String, Value>;

/// Custom per-record transform. The returned record replaces the input record.
pub type TransformFn = fn(Record, &TransformParams) -> MartechResult<Record>;

/// Named custom transform functions, populated once at startup.
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    functions: HashMap<String, TransformFn>,
}

impl TransformRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in functions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register("get_gender_implicit_data", get_gender_implicit_data)
            .register("get_birth_date", get_birth_date);
        registry
    }

    /// Registers `function` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, function: TransformFn) -> &mut Self {
        self.functions.insert(name.into(), function);
        self
    }

    pub fn get(&self, name: &str) -> Option<TransformFn> {
        self.functions.get(name).copied()
    }

    /// Returns the function registered under `name`, failing for unknown names.
    pub fn resolve(&self, name: &str) -> MartechResult<TransformFn> {
        match self.get(name) {
            Some(function) => Ok(function),
            None => {
                let mut known: Vec<&str> = self.functions.keys().map(String::as_str).collect();
                known.sort_unstable();
                bail!(
                    ErrorKind::UnknownTransformFunction,
                    "Unknown transform function",
                    format!("{name} (registered: {})", known.join(", "))
                )
            }
        }
    }
}
