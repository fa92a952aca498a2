//! Field schema describing the episodic storage layout.
use super::fields::{next_key, REWARD_KEY};
use crate::error::ReplayError;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// How often a field is recorded within an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Recorded once per transition, `T` rows per episode (e.g. actions).
    PerTransition,

    /// Recorded at every state, `T + 1` rows per episode (e.g. observations).
    ///
    /// The trailing row holds the state after the last transition; per-state
    /// fields are the ones that get a derived `next_*` view when sampling.
    PerState,
}

/// Name and per-timestep dimensionality of one tracked field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,

    /// Dimensionality of one timestep of the field.
    pub dims: Vec<usize>,

    /// Step convention of the field.
    pub kind: FieldKind,
}

impl FieldSpec {
    /// A field recorded `T` times per episode.
    pub fn per_transition(name: impl Into<String>, dims: impl Into<Vec<usize>>) -> Self {
        Self {
            name: name.into(),
            dims: dims.into(),
            kind: FieldKind::PerTransition,
        }
    }

    /// A field recorded `T + 1` times per episode.
    pub fn per_state(name: impl Into<String>, dims: impl Into<Vec<usize>>) -> Self {
        Self {
            name: name.into(),
            dims: dims.into(),
            kind: FieldKind::PerState,
        }
    }

    /// Rows one episode occupies for this field at the given horizon.
    pub fn steps(&self, horizon: usize) -> usize {
        match self.kind {
            FieldKind::PerTransition => horizon,
            FieldKind::PerState => horizon + 1,
        }
    }
}

/// An ordered, fixed set of field specifications.
///
/// The schema is set once at buffer construction and determines both the
/// storage layout and the key set of every [`FieldMap`](super::FieldMap)
/// crossing the buffer boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema(Vec<FieldSpec>);

impl Schema {
    /// Builds a schema from field specifications.
    ///
    /// Names must be unique and must not collide with [`REWARD_KEY`] or with
    /// the `next_*` view derived from a per-state field.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self> {
        if fields.is_empty() {
            return Err(ReplayError::EmptySchema)?;
        }

        for (i, field) in fields.iter().enumerate() {
            let reserved = field.name == REWARD_KEY
                || fields
                    .iter()
                    .any(|f| f.kind == FieldKind::PerState && field.name == next_key(&f.name));
            let duplicated = fields[..i].iter().any(|f| f.name == field.name);
            if reserved || duplicated {
                return Err(ReplayError::InvalidFieldName {
                    name: field.name.clone(),
                })?;
            }
        }

        Ok(Self(fields))
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Tests whether the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the field specifications in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldSpec> {
        self.0.iter()
    }

    /// Looks up a field by name.
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.0.iter().find(|f| f.name == name)
    }
}
