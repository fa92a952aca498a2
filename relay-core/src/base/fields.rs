//! Named arrays exchanged between the buffer and its collaborators.
use crate::error::ReplayError;
use anyhow::Result;
use ndarray::ArrayD;
use std::collections::{
    hash_map::{IntoIter, Iter, Keys},
    HashMap,
};

/// Key of the reward array a transition sampler must produce.
pub const REWARD_KEY: &str = "reward";

/// Name of the derived next-step view of a per-state field.
pub fn next_key(name: &str) -> String {
    format!("next_{}", name)
}

/// A set of named `f32` arrays.
///
/// The same container serves three roles, distinguished by array layout:
/// episode batches passed to storage (`[batch, steps, dims..]` per field),
/// buffer snapshots handed to the sampling strategy
/// (`[episodes, steps, dims..]`, plus derived `next_*` entries), and
/// transition batches returned by it (`[batch, dims..]`).
#[derive(Debug, Clone, Default)]
pub struct FieldMap(HashMap<String, ArrayD<f32>>);

impl FieldMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Inserts an array under `name`, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, data: ArrayD<f32>) {
        self.0.insert(name.into(), data);
    }

    /// Inserts an array under `name` and returns the map.
    pub fn with(mut self, name: impl Into<String>, data: ArrayD<f32>) -> Self {
        self.insert(name, data);
        self
    }

    /// Returns the array stored under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.0.get(name)
    }

    /// Returns the array stored under `name` or a
    /// [`MissingField`](ReplayError::MissingField) error.
    pub fn try_get(&self, name: &str) -> Result<&ArrayD<f32>> {
        match self.0.get(name) {
            Some(data) => Ok(data),
            None => Err(ReplayError::MissingField {
                name: name.to_string(),
            }
            .into()),
        }
    }

    /// Tests whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the number of arrays.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Tests whether the map holds no arrays.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over field names.
    pub fn keys(&self) -> Keys<'_, String, ArrayD<f32>> {
        self.0.keys()
    }

    /// Iterates over name/array pairs.
    pub fn iter(&self) -> Iter<'_, String, ArrayD<f32>> {
        self.0.iter()
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, ArrayD<f32>);
    type IntoIter = IntoIter<String, ArrayD<f32>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_try_get() {
        let fields = FieldMap::new().with("obs", ArrayD::zeros(IxDyn(&[2, 3])));

        assert!(fields.try_get("obs").is_ok());
        let err = fields.try_get("act").unwrap_err();
        match err.downcast_ref::<ReplayError>() {
            Some(ReplayError::MissingField { name }) => assert_eq!(name, "act"),
            _ => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn test_next_key() {
        assert_eq!(next_key("obs"), "next_obs");
        assert_eq!(next_key("achieved_goal"), "next_achieved_goal");
    }
}
