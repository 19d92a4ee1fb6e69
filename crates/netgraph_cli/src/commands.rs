use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

use netgraph::{compile_json, payload_schema, CompileOptions};

use crate::config::Config;
use crate::response::Envelope;

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read payload from stdin")?;
            Ok(text)
        }
    }
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

fn options(config: &Config) -> CompileOptions {
    CompileOptions::default().with_class_name(&config.class_name)
}

/// `netgraph compile`. In envelope mode every outcome, failures included,
/// is reported through the envelope and the command itself succeeds.
pub fn compile(config: &Config, input: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let payload = read_input(input)?;
    let result = compile_json(&payload, &options(config));

    if config.envelope {
        if let Err(e) = &result {
            tracing::error!(status = e.status_code(), "Compilation failed: {}", e);
        }
        let envelope = Envelope::from_result(&result);
        let text = serde_json::to_string_pretty(&envelope).context("Failed to encode envelope")?;
        return write_output(output, &text);
    }

    let compiled = result.context("Compilation failed")?;
    for warning in &compiled.warnings {
        tracing::info!("{}", warning);
    }
    write_output(output, &compiled.code)
}

/// `netgraph check`
pub fn check(config: &Config, input: &Path) -> Result<()> {
    let payload = read_input(Some(input))?;
    let compiled = compile_json(&payload, &options(config)).context("Compilation failed")?;

    println!("{}", compiled.stats);
    if !compiled.warnings.is_empty() {
        println!("Warnings:");
        for warning in &compiled.warnings {
            println!("  {}", warning);
        }
    }
    Ok(())
}

/// `netgraph schema`
pub fn schema(output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(&payload_schema()).context("Failed to encode schema")?;
    write_output(output, &text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "nodes": [
            {"id": "in", "type": "tabular-input", "data": {"inputShape": "(4)"}},
            {"id": "fc", "type": "linear", "data": {"numNeurons": 2, "bias": true}}
        ],
        "edges": [{"source": "in", "target": "fc"}]
    }"#;

    #[test]
    fn test_compile_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("graph.json");
        let output = dir.path().join("model.py");
        std::fs::write(&input, PAYLOAD).unwrap();

        let config = Config {
            class_name: "Regressor".to_string(),
            ..Config::default()
        };
        compile(&config, Some(input.as_path()), Some(output.as_path())).unwrap();

        let code = std::fs::read_to_string(&output).unwrap();
        assert!(code.starts_with("import torch.nn as nn\n\nclass Regressor(nn.Module):"));
        assert!(code.contains("self.linear_1 = nn.Linear(in_features=4, out_features=2, bias=True)"));
    }

    #[test]
    fn test_failure_without_envelope_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("graph.json");
        std::fs::write(&input, r#"{"nodes": [], "edges": [{"source": 1, "target": 2}]}"#).unwrap();

        let err = compile(&Config::default(), Some(input.as_path()), None).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown node"));
    }

    #[test]
    fn test_failure_with_envelope_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("graph.json");
        let output = dir.path().join("response.json");
        std::fs::write(&input, "not json").unwrap();

        let config = Config {
            envelope: true,
            ..Config::default()
        };
        compile(&config, Some(input.as_path()), Some(output.as_path())).unwrap();

        let response: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(response["statusCode"], 400);
        assert!(response["body"]
            .as_str()
            .unwrap()
            .starts_with("\"Error processing input: "));
    }

    #[test]
    fn test_missing_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = check(&Config::default(), &dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read payload"));
    }

    #[test]
    fn test_schema_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("schema.json");
        schema(Some(output.as_path())).unwrap();

        let schema: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert!(schema["properties"]["edges"].is_object());
    }
}
