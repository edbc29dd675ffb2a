use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The biomarker payload accepted from callers and forwarded verbatim.
///
/// Both sequences are ordered and may be empty; the gateway never inspects
/// or rewrites the values, it only moves them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerRequest {
    pub gene_expression: Vec<f64>,
    pub protein_expression: Vec<f64>,
}

/// Whatever the prediction service answered with.
///
/// The schema belongs to the downstream contract, so this is a transparent
/// wrapper around raw JSON: deserialize and reserialize must be a semantic
/// identity on the payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionResponse(pub JsonValue);
