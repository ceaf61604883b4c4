//! IR serialization helpers.
//!
//! Serde already provides JSON serialization. This module centralizes the
//! helpers used by the compiler hand-off and keeps formatting stable.

use crate::error::EngineError;
use crate::ir::model::Model;

/// Serialize a model to pretty JSON.
pub fn to_json_pretty(model: &Model) -> Result<String, EngineError> {
    serde_json::to_string_pretty(model).map_err(|e| EngineError::internal(format!("serialize IR: {e}")))
}

/// Deserialize a model from JSON.
///
/// Callers should then invoke `model.validate(..)` (or construct an `Engine`,
/// which validates) before executing.
pub fn from_json(s: &str) -> Result<Model, EngineError> {
    serde_json::from_str::<Model>(s).map_err(|e| EngineError::internal(format!("deserialize IR: {e}")))
}
