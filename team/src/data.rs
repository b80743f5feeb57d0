//! Shared context threaded through the steps of one plan execution.
//!
//! Only the coordinator thread touches a [`Data`] value; agents never see it.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Named variables shared by every resolution function of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Data {
    values: BTreeMap<String, Value>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name`, leaving an existing value untouched.
    pub fn create(&mut self, name: &str) {
        self.values.entry(name.to_string()).or_insert(Value::Null);
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Deserialize the value stored under `name`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| anyhow!("data variable '{name}' is not defined"))?;
        serde_json::from_value(value.clone())
            .with_context(|| format!("decode data variable '{name}'"))
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Add one to an integer counter, treating a missing or null value as zero.
    pub fn increment(&mut self, name: &str) -> Result<i64> {
        let current = match self.values.get(name) {
            None | Some(Value::Null) => 0,
            Some(value) => value
                .as_i64()
                .ok_or_else(|| anyhow!("data variable '{name}' is not an integer"))?,
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| anyhow!("data variable '{name}' overflowed"))?;
        self.set(name, next);
        Ok(next)
    }
}
