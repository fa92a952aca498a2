//! Fixed-capacity episodic replay buffer.
//!
//! This module provides a thread-safe replay buffer that stores whole
//! episodes rather than single transitions. It supports:
//! - Pre-allocated storage for a set of named per-episode arrays
//! - A fill-then-overwrite slot allocation policy
//! - Batch sampling through an injected [`TransitionSampler`]
//!
//! [`TransitionSampler`]: crate::TransitionSampler
mod base;
mod config;
mod slots;
mod uniform;

pub use base::EpisodeReplayBuffer;
pub use config::EpisodeBufferConfig;
pub use slots::{SeededSlotRng, SlotRng};
pub use uniform::{RewardFn, UniformTransitionSampler};
