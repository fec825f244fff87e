//! Buffer serialization and persistence
//!
//! JSON persistence for hybrid vectors, used by callers that checkpoint
//! featurized data between runs. The serializable form carries the raw parts;
//! loading goes back through [`VBuffer::from_parts`], so corrupted or
//! hand-edited files are rejected rather than producing a vector that breaks
//! the representation invariants.

use crate::core::{Result, VBuffer, VectorError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Serializable representation of a hybrid vector
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SerializableVector<T> {
    /// Logical number of slots
    pub length: usize,
    /// Number of explicit entries
    pub count: usize,
    /// Values of the explicit entries
    pub values: Vec<T>,
    /// Slots of the explicit entries; empty when dense
    pub indices: Vec<usize>,
}

impl<T: Clone> From<&VBuffer<T>> for SerializableVector<T> {
    fn from(v: &VBuffer<T>) -> Self {
        Self {
            length: v.len(),
            count: v.count(),
            values: v.values().to_vec(),
            indices: v.indices().map(<[usize]>::to_vec).unwrap_or_default(),
        }
    }
}

impl<T> SerializableVector<T> {
    /// Convert back into a vector, re-validating every invariant
    pub fn into_vbuffer(self) -> Result<VBuffer<T>> {
        VBuffer::from_parts(self.length, self.count, self.values, self.indices)
    }
}

/// Save a vector to a JSON file
pub fn save_vector<T, P>(vector: &VBuffer<T>, path: P) -> Result<()>
where
    T: Clone + Serialize,
    P: AsRef<Path>,
{
    let file = File::create(path).map_err(VectorError::IoError)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &SerializableVector::from(vector))
        .map_err(|e| VectorError::SerializationError(e.to_string()))
}

/// Load a vector from a JSON file
pub fn load_vector<T, P>(path: P) -> Result<VBuffer<T>>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let file = File::open(path).map_err(VectorError::IoError)?;
    let reader = BufReader::new(file);
    let raw: SerializableVector<T> = serde_json::from_reader(reader)
        .map_err(|e| VectorError::SerializationError(e.to_string()))?;
    raw.into_vbuffer()
}
