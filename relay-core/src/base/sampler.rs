//! Interface of sampling strategies.
use super::fields::FieldMap;
use anyhow::Result;

/// Turns a snapshot of stored episodes into a batch of transitions.
///
/// Implementations alone decide how episodes are sliced into transitions and
/// how rewards are computed or goals relabeled; the buffer only checks that
/// the produced batch carries every schema field, every derived `next_*`
/// view and [`REWARD_KEY`](super::REWARD_KEY).
///
/// The buffer invokes the strategy outside of its internal lock, possibly
/// from several threads at once, hence the `Send + Sync` bound.
pub trait TransitionSampler: Send + Sync {
    /// Samples `batch_size` transitions from `episodes`.
    ///
    /// `episodes` holds, for every schema field, the valid region of the
    /// buffer in episode-major layout (`[episodes, steps, dims..]`), plus
    /// the derived `next_*` arrays of per-state fields. The returned map
    /// contains one `[batch_size, dims..]` array per required key.
    fn sample(&self, episodes: &FieldMap, batch_size: usize) -> Result<FieldMap>;
}
