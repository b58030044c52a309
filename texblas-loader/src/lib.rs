//! Fixture loading for texblas test suites.
//!
//! A suite is a JSON file (conventionally `small.json`) holding an array of
//! cases; case `i` (1-based) keeps its matrix data files in a subdirectory
//! named `0001`, `0002`, … next to the suite file. Matrix files are flat
//! JSON arrays of f32 values, row-major.
//!
//! ```json
//! [
//!   { "in": [ { "shape": [3, 3] } ] },
//!   { "in": [ { "shape": [3, 4] } ], "arg": { "alpha": 2.0 } }
//! ]
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub mod assert;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed data: {0}")]
    MalformedData(String),
}

/// One input matrix declaration inside a test case.
#[derive(Debug, Deserialize, Clone)]
pub struct MatrixSpec {
    /// `(rows, cols)`.
    pub shape: (usize, usize),
}

/// One test case: input shapes plus optional operation arguments.
#[derive(Debug, Deserialize, Clone)]
pub struct TestCase {
    #[serde(rename = "in")]
    pub inputs: Vec<MatrixSpec>,
    #[serde(default)]
    pub arg: serde_json::Value,
}

/// Load a suite configuration file.
pub fn load_suite<P: AsRef<Path>>(path: P) -> Result<Vec<TestCase>, LoaderError> {
    let file = File::open(path)?;
    let suite: Vec<TestCase> = serde_json::from_reader(file)?;
    Ok(suite)
}

/// Directory holding the data files for case `index` (0-based) of a suite
/// rooted at `root`: `root/0001`, `root/0002`, …
pub fn case_dir<P: AsRef<Path>>(root: P, index: usize) -> PathBuf {
    root.as_ref().join(format!("{:04}", index + 1))
}

/// Load a flat f32 matrix file, checking the declared length.
pub fn load_matrix<P: AsRef<Path>>(path: P, expected_len: usize) -> Result<Vec<f32>, LoaderError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let data: Vec<f32> = serde_json::from_reader(file)?;
    if data.len() != expected_len {
        return Err(LoaderError::MalformedData(format!(
            "{}: declared shape wants {} values, file holds {}",
            path.display(),
            expected_len,
            data.len()
        )));
    }
    Ok(data)
}
