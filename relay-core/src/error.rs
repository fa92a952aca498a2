//! Errors in the library.
use thiserror::Error;

/// Errors raised by the replay buffer and its collaborators.
///
/// Variants fall into four classes: configuration errors surfaced at
/// construction, caller contract violations in [`store_episode`], sampling
/// preconditions, and contract violations of the injected sampling strategy.
///
/// [`store_episode`]: crate::episode_buffer::EpisodeReplayBuffer::store_episode
#[derive(Error, Debug)]
pub enum ReplayError {
    /// The field schema has no fields.
    #[error("field schema is empty")]
    EmptySchema,

    /// A schema field name is duplicated or shadows a reserved key.
    #[error("field name {name:?} duplicates another field or shadows a reserved key")]
    InvalidFieldName {
        /// The offending field name.
        name: String,
    },

    /// The configured capacity does not yield a single episode slot.
    #[error("capacity of {capacity} transitions yields no episode slot at horizon {horizon}")]
    ZeroCapacity {
        /// Configured capacity in transitions.
        capacity: usize,
        /// Configured episode horizon.
        horizon: usize,
    },

    /// Fields of an episode batch disagree on the batch size.
    #[error("episode batch sizes differ across fields: {sizes:?}")]
    BatchSizeMismatch {
        /// Batch size observed for each field, in schema order.
        sizes: Vec<(String, usize)>,
    },

    /// A required field is missing from a named-array map.
    #[error("field {name:?} is missing")]
    MissingField {
        /// Name of the missing field.
        name: String,
    },

    /// An episode batch contains a field the schema does not know.
    #[error("field {name:?} is not in the schema")]
    UnknownField {
        /// Name of the unexpected field.
        name: String,
    },

    /// An episode batch contains no episodes.
    #[error("episode batch is empty")]
    EmptyBatch,

    /// A single episode batch exceeds the whole buffer capacity.
    #[error("batch of {requested} episodes exceeds buffer capacity of {capacity}")]
    BatchTooLarge {
        /// Number of episodes in the rejected batch.
        requested: usize,
        /// Buffer capacity in episodes.
        capacity: usize,
    },

    /// Sampling from a buffer that holds no episodes.
    #[error("cannot sample from an empty buffer")]
    EmptyBuffer,

    /// The transition sampler returned a batch without a required key.
    #[error("transition sampler output is missing key {missing:?}")]
    SamplerContract {
        /// The required key absent from the sampler output.
        missing: String,
    },
}
