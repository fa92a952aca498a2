//! Base types shared by the replay buffer and its collaborators.
mod fields;
mod sampler;
mod schema;

pub use fields::{next_key, FieldMap, REWARD_KEY};
pub use sampler::TransitionSampler;
pub use schema::{FieldKind, FieldSpec, Schema};
