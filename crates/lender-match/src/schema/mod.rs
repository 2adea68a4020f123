//! Parameter registry and the value type system shared by submission
//! validation and rule evaluation.

pub mod domain;
pub mod registry;
pub mod seed;
pub mod validation;
pub mod value;

pub use domain::{ParameterDefinition, ParameterPatch, ParameterType};
pub use registry::{
    LiveSchema, ParameterLabels, ParameterRegistry, RegistryError, RegistryExtension,
    RegistrySnapshot,
};
pub use seed::default_parameters;
pub use validation::{validate_form_data, SchemaValidationError};
pub use value::{FieldValue, FormData, Scalar, UnsupportedKind};
