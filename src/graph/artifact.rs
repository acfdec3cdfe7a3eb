use super::NodeGraph;
use crate::error::ArtifactError;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use std::fs;
use std::io::{Read, Write};

impl NodeGraph {
    /// Serializes the graph to the bincode format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        encode_to_vec(self, standard()).map_err(|e| ArtifactError::Serialize(e.to_string()))
    }

    /// Deserializes a graph from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        decode_from_slice(bytes, standard())
            .map(|(graph, _)| graph) // bincode 2 returns a tuple (data, bytes_read)
            .map_err(|e| ArtifactError::Deserialize(e.to_string()))
    }

    /// Saves the graph to a file using the bincode format.
    pub fn save(&self, path: &str) -> Result<(), ArtifactError> {
        let bytes = self.to_bytes()?;
        let io_error = |e: std::io::Error| ArtifactError::Io {
            path: path.to_string(),
            message: e.to_string(),
        };
        let mut file = fs::File::create(path).map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        Ok(())
    }

    /// Loads a graph from a file. Files ending in `.json` are read as JSON,
    /// anything else as bincode.
    pub fn from_file(path: &str) -> Result<Self, ArtifactError> {
        let io_error = |e: std::io::Error| ArtifactError::Io {
            path: path.to_string(),
            message: e.to_string(),
        };
        let mut file = fs::File::open(path).map_err(io_error)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(io_error)?;

        if path.ends_with(".json") {
            let text = String::from_utf8(bytes)
                .map_err(|e| ArtifactError::Deserialize(e.to_string()))?;
            Self::from_json_str(&text)
        } else {
            Self::from_bytes(&bytes)
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ArtifactError> {
        serde_json::from_str(json).map_err(|e| ArtifactError::Deserialize(e.to_string()))
    }

    pub fn to_json_string(&self) -> Result<String, ArtifactError> {
        serde_json::to_string_pretty(self).map_err(|e| ArtifactError::Serialize(e.to_string()))
    }
}
