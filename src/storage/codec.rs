//! `ProjectCodec` trait and serde-backed implementations.
//!
//! The codec is the only component that understands the on-disk format. The
//! rest of the crate sees a [`ProjectGraph`] in and bytes out.

use crate::core::error::PbxError;
use crate::core::graph::ProjectGraph;
use std::path::Path;

/// Errors that can occur while loading or saving a project file.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Malformed project: {0}")]
    Malformed(String),
}

impl CodecError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io_error",
            Self::Json(_) | Self::Yaml(_) | Self::Malformed(_) => "malformed_project",
        }
    }
}

impl From<CodecError> for PbxError {
    fn from(err: CodecError) -> Self {
        Self::codec(err.code(), err.to_string(), "storage:codec")
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Translates between project files and graphs.
pub trait ProjectCodec {
    /// Short format name, used in logs.
    fn format(&self) -> &'static str;

    /// Parses raw bytes into an unchecked graph.
    fn decode(&self, bytes: &[u8]) -> Result<ProjectGraph>;

    /// Serializes a graph.
    fn encode(&self, graph: &ProjectGraph) -> Result<Vec<u8>>;

    /// Reads, decodes and structurally checks a project file.
    fn load(&self, path: &Path) -> std::result::Result<ProjectGraph, PbxError> {
        let bytes = std::fs::read(path).map_err(|e| {
            PbxError::codec("read_failed", e.to_string(), "storage:codec")
                .with_context("path", path.display().to_string())
        })?;
        let graph = self
            .decode(&bytes)
            .map_err(|e| PbxError::from(e).with_context("path", path.display().to_string()))?;
        graph.prepare()
    }
}

/// Pretty-printed JSON project documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonProjectCodec;

impl ProjectCodec for JsonProjectCodec {
    fn format(&self) -> &'static str {
        "json"
    }

    fn decode(&self, bytes: &[u8]) -> Result<ProjectGraph> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn encode(&self, graph: &ProjectGraph) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(graph)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// YAML project documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlProjectCodec;

impl ProjectCodec for YamlProjectCodec {
    fn format(&self) -> &'static str {
        "yaml"
    }

    fn decode(&self, bytes: &[u8]) -> Result<ProjectGraph> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CodecError::Malformed(format!("not UTF-8: {e}")))?;
        Ok(serde_yaml::from_str(text)?)
    }

    fn encode(&self, graph: &ProjectGraph) -> Result<Vec<u8>> {
        Ok(serde_yaml::to_string(graph)?.into_bytes())
    }
}

/// Picks a codec from the file extension; anything that is not YAML is JSON.
#[must_use]
pub fn codec_for_path(path: &Path) -> Box<dyn ProjectCodec> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => Box::new(YamlProjectCodec),
        _ => Box::new(JsonProjectCodec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::graph::PhaseSelector;
    use crate::core::model::{FileReference, ProductType};

    fn sample() -> ProjectGraph {
        let mut graph = ProjectGraph::new("Demo");
        let app = graph
            .add_target("App", Some(ProductType::Application))
            .unwrap();
        let main = graph.main_group().clone();
        let sources = graph.add_group(&main, "Sources", Some("Sources".into())).unwrap();
        let file = graph
            .add_file_reference(&sources, FileReference::at_path("main.swift"))
            .unwrap();
        graph.add_build_file(&app, &PhaseSelector::Auto, &file).unwrap();
        graph
    }

    #[test]
    fn json_round_trip() {
        let graph = sample();
        let codec = JsonProjectCodec;

        let bytes = codec.encode(&graph).unwrap();
        let restored = codec.decode(&bytes).unwrap().prepare().unwrap();

        assert_eq!(restored, graph);
        assert_eq!(restored.cache(), graph.cache());
    }

    #[test]
    fn yaml_round_trip() {
        let graph = sample();
        let codec = YamlProjectCodec;

        let bytes = codec.encode(&graph).unwrap();
        let restored = codec.decode(&bytes).unwrap().prepare().unwrap();

        assert_eq!(restored, graph);
    }

    #[test]
    fn encoding_is_deterministic() {
        let graph = sample();
        let codec = JsonProjectCodec;
        assert_eq!(codec.encode(&graph).unwrap(), codec.encode(&graph.clone()).unwrap());
    }

    #[test]
    fn malformed_input_is_a_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pbxproj.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonProjectCodec.load(&path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CodecError);
        assert_eq!(err.code, "malformed_project");
        assert!(err.context.contains_key("path"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonProjectCodec
            .load(&dir.path().join("absent.pbxproj.json"))
            .unwrap_err();
        assert_eq!(err.code, "read_failed");
    }

    #[test]
    fn codec_chosen_by_extension() {
        assert_eq!(codec_for_path(Path::new("a.pbxproj.yaml")).format(), "yaml");
        assert_eq!(codec_for_path(Path::new("a.pbxproj.yml")).format(), "yaml");
        assert_eq!(codec_for_path(Path::new("a.pbxproj.json")).format(), "json");
    }
}
