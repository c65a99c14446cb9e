//! Immutable key/value settings attached to recipes, projects and builders.
//!
//! Settings cascade by simple override: a child bag shadows the keys of its parent.
//! Values are JSON values so recipes can carry strings, flags, numbers and lists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, Value>);

impl Settings {
  pub fn new() -> Self {
    Self(BTreeMap::new())
  }

  /// Return a copy with `key` set to `value`. Used while assembling a bag, before it is attached.
  pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
    self.0.insert(key.to_string(), value.into());
    self
  }

  /// Merge `child` over `self`; keys present in `child` win.
  pub fn merged(&self, child: &Settings) -> Settings {
    let mut merged = self.0.clone();
    for (key, value) in &child.0 {
      merged.insert(key.clone(), value.clone());
    }
    Settings(merged)
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.0.get(key)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.0.contains_key(key)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
    self.0.iter()
  }

  pub fn get_str(&self, key: &str) -> Result<Option<&str>, ConfigError> {
    match self.0.get(key) {
      None | Some(Value::Null) => Ok(None),
      Some(Value::String(s)) => Ok(Some(s.as_str())),
      Some(_) => Err(type_error(key, "a string")),
    }
  }

  pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
    match self.0.get(key) {
      None | Some(Value::Null) => Ok(None),
      Some(Value::Bool(b)) => Ok(Some(*b)),
      Some(_) => Err(type_error(key, "a boolean")),
    }
  }

  pub fn get_u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
    match self.0.get(key) {
      None | Some(Value::Null) => Ok(None),
      Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| type_error(key, "a positive integer")),
      Some(_) => Err(type_error(key, "a positive integer")),
    }
  }

  /// A list of strings. A single string is accepted as a one-element list.
  pub fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
    match self.0.get(key) {
      None | Some(Value::Null) => Ok(None),
      Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
      Some(Value::Array(items)) => items
        .iter()
        .map(|item| match item {
          Value::String(s) => Ok(s.clone()),
          _ => Err(type_error(key, "a list of strings")),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some),
      Some(_) => Err(type_error(key, "a list of strings")),
    }
  }

  pub fn str_or(&self, key: &str, default: &str) -> Result<String, ConfigError> {
    Ok(self.get_str(key)?.unwrap_or(default).to_string())
  }

  pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
    Ok(self.get_bool(key)?.unwrap_or(default))
  }

  pub fn list_or(&self, key: &str, default: &[&str]) -> Result<Vec<String>, ConfigError> {
    Ok(
      self
        .get_list(key)?
        .unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect()),
    )
  }
}

impl FromIterator<(String, Value)> for Settings {
  fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

fn type_error(key: &str, expected: &'static str) -> ConfigError {
  ConfigError::SettingType {
    key: key.to_string(),
    expected,
  }
}
