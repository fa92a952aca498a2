#![warn(missing_docs)]
//! Episodic replay buffer for off-policy reinforcement learning.
//!
//! The buffer stores whole trajectories across a set of named, index-aligned
//! arrays and samples training batches through an injected
//! [`TransitionSampler`]. See [`episode_buffer::EpisodeReplayBuffer`] for the
//! storage and overwrite policy.
pub mod episode_buffer;
pub mod error;

mod base;
pub use base::{next_key, FieldKind, FieldMap, FieldSpec, Schema, TransitionSampler, REWARD_KEY};
