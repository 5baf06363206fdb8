//! Storage for the source-of-truth collection and the derived view.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tempfile::Builder;

use crate::error::{Error, Result};
use crate::view::CompiledView;

/// Source of truth for campaign records.
pub trait CollectionStore {
    fn load(&self) -> Result<Vec<Value>>;
    fn save(&self, records: &[Value]) -> Result<()>;
}

/// Destination of the compiled hierarchy.
pub trait ViewStore {
    fn publish(&self, view: &CompiledView) -> Result<()>;
}

/// Write `data` to `path` via a uniquely named temp file in the same
/// directory and a rename, so readers see either the old content or the new
/// content, never a mix, even with several writer processes.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = format!(".{}.", file_name);
    let mut tmp = Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| Error::io(dir, e))?;
    tmp.write_all(data).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

/// The campaign collection stored as one JSON array.
#[derive(Debug, Clone)]
pub struct JsonCollectionFile {
    path: PathBuf,
}

impl JsonCollectionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CollectionStore for JsonCollectionFile {
    /// A missing file is an empty collection.
    fn load(&self) -> Result<Vec<Value>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        if raw.trim().is_empty() {
            return Ok(vec![]);
        }
        match serde_json::from_str(&raw).map_err(|e| Error::json(&self.path, e))? {
            Value::Array(records) => Ok(records),
            _ => Err(Error::NotACollection(self.path.clone())),
        }
    }

    fn save(&self, records: &[Value]) -> Result<()> {
        let json = serde_json::to_string_pretty(records).map_err(|e| Error::json(&self.path, e))?;
        write_atomic(&self.path, json.as_bytes())
    }
}

/// The compiled view stored as one JSON object.
#[derive(Debug, Clone)]
pub struct JsonViewFile {
    path: PathBuf,
}

impl JsonViewFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last published view. Returns an empty view if nothing was published yet.
    pub fn read(&self) -> Result<CompiledView> {
        if !self.path.exists() {
            return Ok(CompiledView::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        // Each tree level is two JSON nesting levels; depth is bounded by the
        // collection, not by serde_json's default limit.
        let mut json = serde_json::Deserializer::from_str(&raw);
        json.disable_recursion_limit();
        let view = CompiledView::deserialize(&mut json).map_err(|e| Error::json(&self.path, e))?;
        json.end().map_err(|e| Error::json(&self.path, e))?;
        Ok(view)
    }
}

impl ViewStore for JsonViewFile {
    fn publish(&self, view: &CompiledView) -> Result<()> {
        let json = serde_json::to_string_pretty(view).map_err(|e| Error::json(&self.path, e))?;
        write_atomic(&self.path, json.as_bytes())
    }
}
