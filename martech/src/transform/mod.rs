//! Per-record transformation: identity, custom function, coercions, projection and renames.

mod builtins;
pub mod coercion;
mod registry;
mod transformer;

pub use builtins::{get_birth_date, get_gender_implicit_data};
pub use registry::{TransformFn, TransformParams, TransformRegistry};
pub use transformer::{
    RecordTransformer, TransformStats, apply_coercions, project_attributes, rename_keys,
    resolve_identity,
};
