//! JSON file I/O for template models.

use crate::model::TemplateModel;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelIoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load a template model from a JSON file. Soft inconsistencies in the
/// loaded model are logged, not rejected.
pub fn model_from_json_file(path: impl AsRef<Path>) -> Result<TemplateModel, ModelIoError> {
    let text = fs::read_to_string(path)?;
    let model: TemplateModel = serde_json::from_str(&text)?;
    model.warn_on_soft_inconsistencies();
    Ok(model)
}

/// Write a template model to a JSON file (pretty-printed).
pub fn model_to_json_file(
    model: &TemplateModel,
    path: impl AsRef<Path>,
) -> Result<(), ModelIoError> {
    let text = serde_json::to_string_pretty(model)?;
    fs::write(path, text)?;
    Ok(())
}
