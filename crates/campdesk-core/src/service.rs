//! Campaign CRUD over a collection store, republishing the hierarchy view
//! after every change.

use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

use crate::compile::{compile, CompileReport};
use crate::error::{Error, Result};
use crate::record::{coerce_scalar, record_id};
use crate::store::{CollectionStore, ViewStore};

pub struct CampaignService<C, V> {
    collection: C,
    view: V,
    /// Held across load → mutate → save → publish.
    write_lock: Mutex<()>,
}

/// Next free numeric id: one past the largest numeric id in the collection.
pub fn next_record_id(records: &[Value]) -> String {
    let max = records
        .iter()
        .filter_map(|r| record_id(r).and_then(|id| id.parse::<u64>().ok()))
        .max()
        .unwrap_or(0);
    (max + 1).to_string()
}

fn as_object(value: Value, what: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidRecord(format!(
            "{} must be a JSON object, got {}",
            what, other
        ))),
    }
}

impl<C: CollectionStore, V: ViewStore> CampaignService<C, V> {
    pub fn new(collection: C, view: V) -> Self {
        Self {
            collection,
            view,
            write_lock: Mutex::new(()),
        }
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub fn view_store(&self) -> &V {
        &self.view
    }

    pub fn list(&self) -> Result<Vec<Value>> {
        self.collection.load()
    }

    /// The record the compiler would use for `id` (the last one with that id).
    pub fn get(&self, id: &str) -> Result<Option<Value>> {
        let records = self.collection.load()?;
        Ok(records
            .into_iter()
            .rev()
            .find(|r| record_id(r).as_deref() == Some(id)))
    }

    /// Append a record, assigning the next numeric id if it has none.
    pub fn create(&self, record: Value) -> Result<Value> {
        let mut fields = as_object(record, "record")?;
        self.mutate(move |records| {
            let id = match coerce_scalar(fields.get("id")) {
                Some(id) => {
                    if records.iter().any(|r| record_id(r).as_deref() == Some(id.as_str())) {
                        return Err(Error::InvalidRecord(format!("id '{}' already exists", id)));
                    }
                    id
                }
                None => next_record_id(records),
            };
            fields.insert("id".to_string(), Value::String(id));
            let created = Value::Object(fields);
            records.push(created.clone());
            Ok((created, true))
        })
    }

    /// Shallow-merge `patch` into the record with `id`. `null` removes a field.
    pub fn update(&self, id: &str, patch: Value) -> Result<Value> {
        let patch = as_object(patch, "patch")?;
        if let Some(new_id) = coerce_scalar(patch.get("id")) {
            if new_id != id {
                return Err(Error::InvalidRecord(format!(
                    "cannot change id '{}' to '{}'",
                    id, new_id
                )));
            }
        }
        self.mutate(|records| {
            let slot = records
                .iter()
                .rposition(|r| record_id(r).as_deref() == Some(id))
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            let Value::Object(fields) = &mut records[slot] else {
                return Err(Error::NotFound(id.to_string()));
            };
            for (key, value) in patch {
                if key == "id" {
                    continue;
                }
                if value.is_null() {
                    fields.remove(&key);
                } else {
                    fields.insert(key, value);
                }
            }
            Ok((records[slot].clone(), true))
        })
    }

    /// Remove every record with `id`. Children of a removed folder become roots.
    pub fn delete(&self, id: &str) -> Result<bool> {
        self.mutate(|records| {
            let before = records.len();
            records.retain(|r| record_id(r).as_deref() != Some(id));
            let removed = records.len() != before;
            Ok((removed, removed))
        })
    }

    /// Recompile from the current collection and publish. Unlike the
    /// mutations, a publish failure is returned to the caller.
    pub fn recompile(&self) -> Result<CompileReport> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let records = self.collection.load()?;
        let compiled = compile(&records);
        self.view.publish(&compiled.view)?;
        tracing::info!(report = ?compiled.report, "published campaign tree");
        Ok(compiled.report)
    }

    fn mutate<T>(&self, apply: impl FnOnce(&mut Vec<Value>) -> Result<(T, bool)>) -> Result<T> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = self.collection.load()?;
        let (out, changed) = apply(&mut records)?;
        if changed {
            self.collection.save(&records)?;
            self.publish_best_effort(&records);
        }
        Ok(out)
    }

    /// Publish failures are logged, never returned: the collection is already saved.
    fn publish_best_effort(&self, records: &[Value]) {
        let compiled = compile(records);
        match self.view.publish(&compiled.view) {
            Ok(()) => tracing::info!(report = ?compiled.report, "published campaign tree"),
            Err(err) => tracing::warn!(error = %err, "failed to publish campaign tree, previous view kept"),
        }
    }
}
