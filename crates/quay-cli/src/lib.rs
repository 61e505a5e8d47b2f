//! # quay-cli — Command-Line Tool for Quay
//!
//! ## Subcommands
//!
//! - `quay serve` — Serve manifest routes over the in-memory transport.
//! - `quay encode` — Validate a message and write its envelope to a file.
//! - `quay decode` — Read an envelope and print `{"message", "context"}`.
//! - `quay check` — Print every violation of a message against a schema.
//!
//! ```bash
//! quay serve --routes routes.yaml --port 8080
//! quay encode --schema person.avsc --message '{"id":"abc"}' --output person.bin
//! quay decode --schema person_v2.avsc --input person.bin
//! quay check --schema person.avsc --message @person.json
//! ```

pub mod codec;
pub mod serve;

use std::path::Path;

use anyhow::{Context, Result};
use quay_schema::{CompiledSchema, SchemaInput};
use serde_json::Value;

/// Load an Avro schema file. `.yaml`/`.yml` files are converted to JSON
/// first; anything else is read as JSON text.
pub fn load_schema(path: &Path) -> Result<CompiledSchema> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema {}", path.display()))?;
    let input = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => {
            let document: Value = serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse YAML schema {}", path.display()))?;
            SchemaInput::Document(document)
        }
        _ => SchemaInput::Raw(content),
    };
    CompiledSchema::new(input).with_context(|| format!("invalid schema {}", path.display()))
}

/// Parse a JSON argument: inline JSON text, or `@path` to read a file.
pub fn json_arg(arg: &str) -> Result<Value> {
    let (text, origin) = match arg.strip_prefix('@') {
        Some(path) => (
            std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?,
            path.to_string(),
        ),
        None => (arg.to_string(), "argument".to_string()),
    };
    serde_json::from_str(&text).with_context(|| format!("{origin} is not valid JSON"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_json_and_yaml_schemas() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("test.avsc");
        std::fs::write(
            &json_path,
            r#"{"type":"record","name":"test","namespace":"api","fields":[{"name":"id","type":"string"}]}"#,
        )
        .unwrap();
        let yaml_path = dir.path().join("test.yaml");
        std::fs::write(
            &yaml_path,
            "type: record\nname: test\nnamespace: api\nfields:\n  - {name: id, type: string}\n",
        )
        .unwrap();

        let from_json = load_schema(&json_path).unwrap();
        let from_yaml = load_schema(&yaml_path).unwrap();
        assert_eq!(from_json.full_name(), "api.test");
        assert_eq!(from_json.document(), from_yaml.document());
    }

    #[test]
    fn unnamed_schema_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("string.avsc");
        std::fs::write(&path, r#""string""#).unwrap();
        let err = load_schema(&path).unwrap_err();
        assert!(format!("{err:#}").contains("no name"));
    }

    #[test]
    fn json_arg_inline_and_file() {
        assert_eq!(json_arg(r#"{"id":"abc"}"#).unwrap()["id"], "abc");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("message.json");
        std::fs::write(&path, r#"{"id":"from-file"}"#).unwrap();
        let arg = format!("@{}", path.display());
        assert_eq!(json_arg(&arg).unwrap()["id"], "from-file");

        assert!(json_arg("{nope").is_err());
    }
}
