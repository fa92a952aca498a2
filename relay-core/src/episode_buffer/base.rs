//! Episodic replay buffer.
use super::{
    config::EpisodeBufferConfig,
    slots::{allocate, SeededSlotRng, SlotRng},
};
use crate::{
    base::{next_key, FieldKind, FieldMap, Schema, TransitionSampler, REWARD_KEY},
    error::ReplayError,
};
use anyhow::Result;
use log::{debug, trace};
use ndarray::{ArrayD, Axis, IxDyn, Slice};
use std::sync::Mutex;

/// Mutable state, guarded by the buffer's single lock.
struct Inner {
    /// One storage array per schema field, in schema order.
    /// Shape: `[capacity, steps, dims..]`.
    stores: Vec<ArrayD<f32>>,

    /// Number of slots holding valid episodes.
    current_size: usize,

    /// Lifetime count of transitions written.
    transitions_stored: usize,

    /// Random source for overwrite decisions.
    rng: Box<dyn SlotRng>,
}

/// A fixed-capacity, thread-safe episodic replay buffer.
///
/// The buffer stores whole episodes across a set of named arrays that stay
/// index-aligned: row `i` of every field belongs to the same episode and no
/// partially written episode is ever visible to readers. Slots are filled in
/// insertion order until the buffer is full, then overwritten uniformly at
/// random, so every stored episode has roughly equal survival probability
/// under sustained write pressure.
///
/// All methods take `&self`; a single internal mutex serializes mutation and
/// the buffer can be shared across threads behind an `Arc`. Sampling copies
/// the valid region under the lock and runs the injected
/// [`TransitionSampler`] after releasing it, so a slow strategy never blocks
/// writers; the snapshot may be stale relative to concurrent writes.
pub struct EpisodeReplayBuffer {
    schema: Schema,
    capacity: usize,
    horizon: usize,
    inner: Mutex<Inner>,
    sampler: Box<dyn TransitionSampler>,
}

impl std::fmt::Debug for EpisodeReplayBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeReplayBuffer")
            .field("schema", &self.schema)
            .field("capacity", &self.capacity)
            .field("horizon", &self.horizon)
            .finish_non_exhaustive()
    }
}

impl EpisodeReplayBuffer {
    /// Builds a buffer from a configuration and a sampling strategy.
    ///
    /// Storage for `capacity / horizon` episode slots is allocated up front.
    /// Fails if the schema is empty or the capacity resolves to zero slots.
    pub fn build(
        config: &EpisodeBufferConfig,
        sampler: Box<dyn TransitionSampler>,
    ) -> Result<Self> {
        let rng = Box::new(SeededSlotRng::new(config.seed));
        Self::with_slot_rng(config, sampler, rng)
    }

    /// Like [`build`](Self::build), with an explicit slot random source.
    pub fn with_slot_rng(
        config: &EpisodeBufferConfig,
        sampler: Box<dyn TransitionSampler>,
        rng: Box<dyn SlotRng>,
    ) -> Result<Self> {
        if config.schema.is_empty() {
            return Err(ReplayError::EmptySchema)?;
        }

        let capacity = match config.horizon {
            0 => 0,
            horizon => config.capacity / horizon,
        };
        if capacity == 0 {
            return Err(ReplayError::ZeroCapacity {
                capacity: config.capacity,
                horizon: config.horizon,
            })?;
        }

        let stores = config
            .schema
            .iter()
            .map(|field| {
                let mut shape = vec![capacity, field.steps(config.horizon)];
                shape.extend_from_slice(&field.dims);
                ArrayD::zeros(IxDyn(&shape))
            })
            .collect();

        debug!(
            "episodic replay buffer with {} slots of horizon {}",
            capacity, config.horizon
        );

        Ok(Self {
            schema: config.schema.clone(),
            capacity,
            horizon: config.horizon,
            inner: Mutex::new(Inner {
                stores,
                current_size: 0,
                transitions_stored: 0,
                rng,
            }),
            sampler,
        })
    }

    /// Stores a batch of episodes, overwriting random slots once full.
    ///
    /// `batch` must hold exactly the schema's fields, each shaped
    /// `[batch, steps, dims..]` with one common batch size. Key set and
    /// batch-size equality are checked before anything is written; row
    /// shapes beyond the batch axis are the caller's contract.
    pub fn store_episode(&self, batch: &FieldMap) -> Result<()> {
        let (batch_size, rows) = self.checked_rows(batch)?;

        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let idxs = allocate(
            inner.current_size,
            self.capacity,
            batch_size,
            inner.rng.as_mut(),
        );

        for (store, data) in inner.stores.iter_mut().zip(rows.into_iter()) {
            for (j, &slot) in idxs.iter().enumerate() {
                store
                    .index_axis_mut(Axis(0), slot)
                    .assign(&data.index_axis(Axis(0), j));
            }
        }

        inner.current_size = (inner.current_size + batch_size).min(self.capacity);
        inner.transitions_stored += batch_size * self.horizon;
        trace!("stored {} episode(s) at slots {:?}", batch_size, idxs);

        Ok(())
    }

    /// Samples a batch of transitions through the injected strategy.
    ///
    /// The valid region of every field is copied under the lock; the lock
    /// is released before the derived `next_*` views of per-state fields
    /// are sliced from the copy and the strategy runs. Its output must
    /// contain every schema field, every `next_*` view and [`REWARD_KEY`];
    /// a missing key is reported as a strategy contract violation.
    pub fn sample(&self, batch_size: usize) -> Result<FieldMap> {
        let episodes = self.snapshot()?;
        let transitions = self.sampler.sample(&episodes, batch_size)?;

        for name in self.required_keys() {
            if !transitions.contains(&name) {
                return Err(ReplayError::SamplerContract { missing: name })?;
            }
        }

        Ok(transitions)
    }

    /// Drops all stored episodes.
    ///
    /// Storage is retained and not zeroed; rows at or above the reset size
    /// become unreachable. The lifetime transition counter is kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.current_size = 0;
        debug!("cleared episodic replay buffer");
    }

    /// Returns the number of episode slots holding valid data.
    pub fn num_episodes(&self) -> usize {
        self.inner.lock().unwrap().current_size
    }

    /// Returns the number of valid transitions, `num_episodes * horizon`.
    pub fn num_transitions(&self) -> usize {
        self.num_episodes() * self.horizon
    }

    /// Returns the lifetime count of transitions written.
    ///
    /// Unaffected by overwrites and [`clear`](Self::clear).
    pub fn transitions_stored(&self) -> usize {
        self.inner.lock().unwrap().transitions_stored
    }

    /// Tests whether every slot holds valid data.
    pub fn is_full(&self) -> bool {
        self.num_episodes() == self.capacity
    }

    /// Tests whether no slot holds valid data.
    pub fn is_empty(&self) -> bool {
        self.num_episodes() == 0
    }

    /// Returns the capacity in episode slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the episode horizon `T`.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Validates an episode batch against the schema and returns its batch
    /// size with one array reference per field, in schema order.
    fn checked_rows<'a>(&self, batch: &'a FieldMap) -> Result<(usize, Vec<&'a ArrayD<f32>>)> {
        for name in batch.keys() {
            if self.schema.get(name).is_none() {
                return Err(ReplayError::UnknownField { name: name.clone() })?;
            }
        }

        let mut rows = Vec::with_capacity(self.schema.len());
        let mut sizes = Vec::with_capacity(self.schema.len());
        for field in self.schema.iter() {
            let data = batch.try_get(&field.name)?;
            sizes.push((field.name.clone(), data.shape().first().copied().unwrap_or(0)));
            rows.push(data);
        }

        let batch_size = sizes[0].1;
        if sizes.iter().any(|(_, size)| *size != batch_size) {
            return Err(ReplayError::BatchSizeMismatch { sizes })?;
        }
        if batch_size == 0 {
            return Err(ReplayError::EmptyBatch)?;
        }
        if batch_size > self.capacity {
            return Err(ReplayError::BatchTooLarge {
                requested: batch_size,
                capacity: self.capacity,
            })?;
        }

        Ok((batch_size, rows))
    }

    /// Copies the valid region of every field, then derives next-step views
    /// from the copy with the lock already released.
    fn snapshot(&self) -> Result<FieldMap> {
        let mut episodes = FieldMap::new();
        {
            let inner = self.inner.lock().unwrap();
            if inner.current_size == 0 {
                return Err(ReplayError::EmptyBuffer)?;
            }

            for (store, field) in inner.stores.iter().zip(self.schema.iter()) {
                let valid = store.slice_axis(Axis(0), Slice::from(..inner.current_size));
                episodes.insert(field.name.clone(), valid.to_owned());
            }
        }

        for field in self.schema.iter() {
            if let FieldKind::PerState = field.kind {
                let next = episodes
                    .try_get(&field.name)?
                    .slice_axis(Axis(1), Slice::from(1..))
                    .to_owned();
                episodes.insert(next_key(&field.name), next);
            }
        }

        Ok(episodes)
    }

    /// Keys the sampling strategy must produce.
    fn required_keys(&self) -> Vec<String> {
        let mut keys = vec![REWARD_KEY.to_string()];
        for field in self.schema.iter() {
            keys.push(field.name.clone());
            if let FieldKind::PerState = field.kind {
                keys.push(next_key(&field.name));
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldSpec;

    /// Returns the snapshot itself so tests can inspect buffer contents.
    struct PassThrough;

    impl TransitionSampler for PassThrough {
        fn sample(&self, episodes: &FieldMap, _batch_size: usize) -> Result<FieldMap> {
            let mut out = episodes.clone();
            out.insert(REWARD_KEY, ArrayD::zeros(IxDyn(&[1])));
            Ok(out)
        }
    }

    /// Omits the reward key from its output.
    struct NoReward;

    impl TransitionSampler for NoReward {
        fn sample(&self, episodes: &FieldMap, _batch_size: usize) -> Result<FieldMap> {
            Ok(episodes.clone())
        }
    }

    /// Replays a scripted sequence of overwrite draws.
    struct Scripted(Vec<usize>);

    impl SlotRng for Scripted {
        fn below(&mut self, upper: usize) -> usize {
            let ix = self.0.remove(0);
            assert!(ix < upper);
            ix
        }
    }

    fn schema() -> Schema {
        Schema::new(vec![
            FieldSpec::per_state("obs", vec![2]),
            FieldSpec::per_transition("act", vec![1]),
        ])
        .unwrap()
    }

    /// Capacity of 8 transitions at horizon 2, i.e. 4 episode slots.
    fn config() -> EpisodeBufferConfig {
        EpisodeBufferConfig::default()
            .capacity(8)
            .horizon(2)
            .schema(schema())
    }

    /// A single-episode batch with every cell set to `tag`.
    fn episode(tag: f32) -> FieldMap {
        episodes(&[tag])
    }

    /// A batch of constant episodes, one per tag.
    fn episodes(tags: &[f32]) -> FieldMap {
        let horizon = config().horizon;
        let mut batch = FieldMap::new();
        for field in schema().iter() {
            let mut shape = vec![tags.len(), field.steps(horizon)];
            shape.extend_from_slice(&field.dims);
            let mut data = ArrayD::zeros(IxDyn(&shape));
            for (i, &tag) in tags.iter().enumerate() {
                data.index_axis_mut(Axis(0), i).fill(tag);
            }
            batch.insert(field.name.clone(), data);
        }
        batch
    }

    /// The tag stored in slot `ix`, asserting all fields agree on it.
    fn slot_tag(buffer: &EpisodeReplayBuffer, ix: usize) -> f32 {
        let out = buffer.sample(1).unwrap();
        let tag = out.try_get("obs").unwrap()[[ix, 0, 0]];
        for (name, data) in out.iter() {
            if name == REWARD_KEY {
                continue;
            }
            for value in data.index_axis(Axis(0), ix).iter() {
                assert_eq!(*value, tag, "field {} disagrees at slot {}", name, ix);
            }
        }
        tag
    }

    #[test]
    fn test_rejects_empty_schema() {
        let config = config().schema(Schema::default());
        assert!(EpisodeReplayBuffer::build(&config, Box::new(PassThrough)).is_err());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let undersized = config().capacity(1).horizon(2);
        let err = EpisodeReplayBuffer::build(&undersized, Box::new(PassThrough)).unwrap_err();
        match err.downcast_ref::<ReplayError>() {
            Some(ReplayError::ZeroCapacity { capacity: 1, horizon: 2 }) => {}
            _ => panic!("unexpected error: {}", err),
        }

        assert!(EpisodeReplayBuffer::build(&config().horizon(0), Box::new(PassThrough)).is_err());
    }

    #[test]
    fn test_fill_phase_preserves_insertion_order() {
        let buffer = EpisodeReplayBuffer::build(&config(), Box::new(PassThrough)).unwrap();

        for (i, tag) in [10., 20., 30.].iter().enumerate() {
            buffer.store_episode(&episode(*tag)).unwrap();
            assert_eq!(buffer.num_episodes(), i + 1);
        }

        assert_eq!(buffer.num_transitions(), 6);
        assert_eq!(buffer.transitions_stored(), 6);
        assert!(!buffer.is_full());
        for (ix, tag) in [10., 20., 30.].iter().enumerate() {
            assert_eq!(slot_tag(&buffer, ix), *tag);
        }
    }

    #[test]
    fn test_overwrite_only_when_full() {
        let rng = Box::new(Scripted(vec![2]));
        let buffer =
            EpisodeReplayBuffer::with_slot_rng(&config(), Box::new(PassThrough), rng).unwrap();

        for tag in [1., 2., 3., 4.] {
            buffer.store_episode(&episode(tag)).unwrap();
        }
        assert!(buffer.is_full());

        buffer.store_episode(&episode(5.)).unwrap();
        assert_eq!(buffer.num_episodes(), 4);
        for (ix, tag) in [1., 2., 5., 4.].iter().enumerate() {
            assert_eq!(slot_tag(&buffer, ix), *tag);
        }
    }

    #[test]
    fn test_partial_fill_spills_into_random_slots() {
        let rng = Box::new(Scripted(vec![1, 0]));
        let buffer =
            EpisodeReplayBuffer::with_slot_rng(&config(), Box::new(PassThrough), rng).unwrap();

        for tag in [1., 2., 3.] {
            buffer.store_episode(&episode(tag)).unwrap();
        }

        // One fresh slot plus two overwrites at slots 1 and 0.
        buffer.store_episode(&episodes(&[4., 5., 6.])).unwrap();
        assert!(buffer.is_full());
        assert_eq!(buffer.transitions_stored(), 12);
        for (ix, tag) in [6., 5., 3., 4.].iter().enumerate() {
            assert_eq!(slot_tag(&buffer, ix), *tag);
        }
    }

    #[test]
    fn test_duplicate_slot_last_write_wins() {
        let rng = Box::new(Scripted(vec![1, 1]));
        let buffer =
            EpisodeReplayBuffer::with_slot_rng(&config(), Box::new(PassThrough), rng).unwrap();

        for tag in [1., 2., 3., 4.] {
            buffer.store_episode(&episode(tag)).unwrap();
        }

        buffer.store_episode(&episodes(&[5., 6.])).unwrap();
        assert_eq!(slot_tag(&buffer, 1), 6.);
    }

    #[test]
    fn test_clear_keeps_lifetime_counter() {
        let buffer = EpisodeReplayBuffer::build(&config(), Box::new(PassThrough)).unwrap();

        for tag in [1., 2., 3., 4.] {
            buffer.store_episode(&episode(tag)).unwrap();
        }
        assert_eq!(buffer.transitions_stored(), 8);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.num_transitions(), 0);
        assert_eq!(buffer.transitions_stored(), 8);

        // Refilling starts over from slot 0.
        buffer.store_episode(&episode(9.)).unwrap();
        assert_eq!(buffer.num_episodes(), 1);
        assert_eq!(buffer.transitions_stored(), 10);
        assert_eq!(slot_tag(&buffer, 0), 9.);
    }

    #[test]
    fn test_sampling_empty_buffer_fails() {
        let buffer = EpisodeReplayBuffer::build(&config(), Box::new(PassThrough)).unwrap();
        let err = buffer.sample(4).unwrap_err();
        match err.downcast_ref::<ReplayError>() {
            Some(ReplayError::EmptyBuffer) => {}
            _ => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn test_sample_contains_required_keys() {
        let buffer = EpisodeReplayBuffer::build(&config(), Box::new(PassThrough)).unwrap();
        buffer.store_episode(&episode(1.)).unwrap();

        let out = buffer.sample(1).unwrap();
        for key in ["obs", "next_obs", "act", REWARD_KEY] {
            assert!(out.contains(key), "missing {}", key);
        }
    }

    #[test]
    fn test_next_view_drops_initial_step() {
        let buffer = EpisodeReplayBuffer::build(&config(), Box::new(PassThrough)).unwrap();

        let mut batch = episode(0.);
        let mut obs = ArrayD::zeros(IxDyn(&[1, 3, 2]));
        for step in 0..3 {
            obs.index_axis_mut(Axis(0), 0)
                .index_axis_mut(Axis(0), step)
                .fill(step as f32);
        }
        batch.insert("obs", obs);
        buffer.store_episode(&batch).unwrap();

        let out = buffer.sample(1).unwrap();
        let next_obs = out.try_get("next_obs").unwrap();
        assert_eq!(next_obs.shape(), &[1, 2, 2]);
        assert_eq!(next_obs[[0, 0, 0]], 1.);
        assert_eq!(next_obs[[0, 1, 0]], 2.);
    }

    #[test]
    fn test_strategy_missing_key_is_a_contract_violation() {
        let buffer = EpisodeReplayBuffer::build(&config(), Box::new(NoReward)).unwrap();
        buffer.store_episode(&episode(1.)).unwrap();

        let err = buffer.sample(1).unwrap_err();
        match err.downcast_ref::<ReplayError>() {
            Some(ReplayError::SamplerContract { missing }) => assert_eq!(missing, REWARD_KEY),
            _ => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn test_store_rejects_malformed_batches() {
        let buffer = EpisodeReplayBuffer::build(&config(), Box::new(PassThrough)).unwrap();

        // Mismatched batch sizes across fields.
        let mut batch = episode(1.);
        batch.insert("act", ArrayD::zeros(IxDyn(&[2, 2, 1])));
        let err = buffer.store_episode(&batch).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayError>(),
            Some(ReplayError::BatchSizeMismatch { .. })
        ));

        // A field the schema does not know.
        let batch = episode(1.).with("extra", ArrayD::zeros(IxDyn(&[1, 2, 1])));
        let err = buffer.store_episode(&batch).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayError>(),
            Some(ReplayError::UnknownField { .. })
        ));

        // A schema field missing from the batch.
        let batch = FieldMap::new().with("obs", ArrayD::zeros(IxDyn(&[1, 3, 2])));
        let err = buffer.store_episode(&batch).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayError>(),
            Some(ReplayError::MissingField { .. })
        ));

        // An empty batch.
        let err = buffer.store_episode(&episodes(&[])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayError>(),
            Some(ReplayError::EmptyBatch)
        ));

        // More episodes than the whole buffer.
        let err = buffer
            .store_episode(&episodes(&[1., 2., 3., 4., 5.]))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayError>(),
            Some(ReplayError::BatchTooLarge { .. })
        ));

        // Nothing was written by any of the rejected calls.
        assert!(buffer.is_empty());
        assert_eq!(buffer.transitions_stored(), 0);
    }
}
