//! JSON output renderer.
//!
//! Outputs `{"matches": [...], "summary": {...}}` format.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::ContextBundle;
use crate::output::ContextRenderer;

/// Aggregate counts for a bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub files: usize,
    pub top_score: Option<f32>,
}

impl Summary {
    pub fn from_bundle(bundle: &ContextBundle) -> Self {
        let files: BTreeSet<&str> = bundle
            .matches()
            .iter()
            .map(|m| m.filepath.as_str())
            .collect();
        Self {
            total: bundle.len(),
            files: files.len(),
            top_score: bundle.matches().first().map(|m| m.score),
        }
    }
}

/// JSON output renderer.
pub struct JsonRenderer;

impl ContextRenderer for JsonRenderer {
    fn render(&self, bundle: &ContextBundle) -> String {
        let output = serde_json::json!({
            "matches": bundle.matches(),
            "summary": Summary::from_bundle(bundle),
        });

        serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
    }
}
