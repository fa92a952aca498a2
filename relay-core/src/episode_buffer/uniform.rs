//! Uniform transition sampling.
use crate::{
    base::{next_key, FieldMap, TransitionSampler, REWARD_KEY},
    error::ReplayError,
};
use anyhow::Result;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::sync::Mutex;

/// Reward of a transition, computed from its next achieved goal and the
/// desired goal.
pub type RewardFn = dyn Fn(&ArrayViewD<f32>, &ArrayViewD<f32>) -> f32 + Send + Sync;

/// Samples transitions uniformly over stored episodes and timesteps.
///
/// Each draw picks an episode and a timestep `t` in `[0, T)`; every snapshot
/// key is indexed at that pair, so per-state fields yield the state at `t`
/// and their `next_*` views the state at `t + 1`. Rewards are recomputed
/// from the goal fields rather than stored, which keeps them consistent with
/// whatever goal the episode carries.
///
/// The achieved-goal field must be per-state, since its `next_*` view feeds
/// the reward function.
pub struct UniformTransitionSampler {
    achieved_goal: String,
    desired_goal: String,
    reward_fn: Box<RewardFn>,
    rng: Mutex<StdRng>,
}

impl UniformTransitionSampler {
    /// Creates a sampler computing rewards with `reward_fn` applied to the
    /// next achieved goal and the desired goal of each drawn transition.
    pub fn new(
        achieved_goal: impl Into<String>,
        desired_goal: impl Into<String>,
        reward_fn: Box<RewardFn>,
        seed: u64,
    ) -> Self {
        Self {
            achieved_goal: achieved_goal.into(),
            desired_goal: desired_goal.into(),
            reward_fn,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl TransitionSampler for UniformTransitionSampler {
    fn sample(&self, episodes: &FieldMap, batch_size: usize) -> Result<FieldMap> {
        // All arrays share the episode axis; the shortest step axis is the
        // horizon (next_* views and per-transition fields have T steps).
        let num_episodes = match episodes.iter().map(|(_, data)| data.shape()[0]).min() {
            Some(n) if n > 0 => n,
            _ => return Err(ReplayError::EmptyBuffer)?,
        };
        let horizon = episodes
            .iter()
            .map(|(_, data)| data.shape()[1])
            .min()
            .unwrap_or(0);

        let (ep_ixs, t_ixs) = {
            let mut rng = self.rng.lock().unwrap();
            let ep_ixs = (0..batch_size)
                .map(|_| (rng.next_u32() as usize) % num_episodes)
                .collect::<Vec<_>>();
            let t_ixs = (0..batch_size)
                .map(|_| (rng.next_u32() as usize) % horizon)
                .collect::<Vec<_>>();
            (ep_ixs, t_ixs)
        };

        let mut transitions = FieldMap::new();
        for (name, data) in episodes.iter() {
            let mut shape = vec![batch_size];
            shape.extend_from_slice(&data.shape()[2..]);
            let mut out = ArrayD::zeros(IxDyn(&shape));
            for (i, (&ep, &t)) in ep_ixs.iter().zip(t_ixs.iter()).enumerate() {
                let row = data.index_axis(Axis(0), ep);
                out.index_axis_mut(Axis(0), i).assign(&row.index_axis(Axis(0), t));
            }
            transitions.insert(name.clone(), out);
        }

        let rewards = {
            let next_ag = transitions.try_get(&next_key(&self.achieved_goal))?;
            let goal = transitions.try_get(&self.desired_goal)?;
            (0..batch_size)
                .map(|i| {
                    let ag = next_ag.index_axis(Axis(0), i);
                    let g = goal.index_axis(Axis(0), i);
                    (self.reward_fn)(&ag, &g)
                })
                .collect::<Vec<_>>()
        };
        transitions.insert(
            REWARD_KEY,
            ArrayD::from_shape_vec(IxDyn(&[batch_size]), rewards)?,
        );

        Ok(transitions)
    }
}
