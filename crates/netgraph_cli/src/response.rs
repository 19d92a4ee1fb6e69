//! HTTP-style response envelope around a compile result, as returned to
//! the editor by the serverless handler.

use std::collections::BTreeMap;

use netgraph::{CompileError, CompileOutput, ErrorClass};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// JSON-encoded body text
    pub body: String,
}

fn cors_headers() -> BTreeMap<String, String> {
    [
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Headers", "Content-Type"),
        ("Access-Control-Allow-Methods", "OPTIONS,POST,GET"),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect()
}

impl Envelope {
    pub fn success(output: &CompileOutput) -> Self {
        Self {
            status_code: 200,
            headers: cors_headers(),
            body: json!({ "model_code": output.code }).to_string(),
        }
    }

    pub fn failure(error: &CompileError) -> Self {
        let message = match error.class() {
            ErrorClass::Validation | ErrorClass::Graph => {
                format!("Error processing input: {}", error)
            }
            ErrorClass::Internal => format!("Internal server error: {}", error),
        };
        Self {
            status_code: error.status_code(),
            headers: cors_headers(),
            body: json!(message).to_string(),
        }
    }

    pub fn from_result(result: &Result<CompileOutput, CompileError>) -> Self {
        match result {
            Ok(output) => Self::success(output),
            Err(error) => Self::failure(error),
        }
    }
}
