//! Columnar batch of transitions.
use super::{Transition, TransitionSchema};
use crate::error::RecallError;
use ndarray::{ArrayD, IxDyn};

/// A batch of transitions sampled from a replay buffer.
///
/// Every field is stacked along a leading batch axis, in sampling order.
#[derive(Clone, Debug)]
pub struct TransitionBatch {
    /// States, shape `[batch_size, state_shape..]`.
    pub state: ArrayD<f32>,

    /// Actions, shape `[batch_size, action_shape..]`.
    pub action: ArrayD<f32>,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Next states, shape `[batch_size, state_shape..]`.
    pub next_state: ArrayD<f32>,

    /// Done flags.
    pub is_done: Vec<i8>,

    /// n-step returns, if the schema declares them.
    pub n_step_return: Option<Vec<f32>>,

    /// Importance sampling weights, only for prioritized sampling.
    pub weight: Option<Vec<f32>>,

    /// Buffer indices of the samples, used for priority feedback.
    pub ix_sample: Vec<usize>,
}

impl TransitionBatch {
    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch holds no sample.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }
}

/// Accumulates sampled transitions column by column.
pub(crate) struct BatchBuilder<'a> {
    schema: &'a TransitionSchema,
    state: Vec<f32>,
    action: Vec<f32>,
    reward: Vec<f32>,
    next_state: Vec<f32>,
    is_done: Vec<i8>,
    n_step_return: Vec<f32>,
}

impl<'a> BatchBuilder<'a> {
    pub fn with_capacity(schema: &'a TransitionSchema, batch_size: usize) -> Self {
        Self {
            schema,
            state: Vec::with_capacity(batch_size * schema.state_len()),
            action: Vec::with_capacity(batch_size * schema.action_len()),
            reward: Vec::with_capacity(batch_size),
            next_state: Vec::with_capacity(batch_size * schema.state_len()),
            is_done: Vec::with_capacity(batch_size),
            n_step_return: Vec::with_capacity(batch_size),
        }
    }

    /// Copies a transition into the columns.
    pub fn push(&mut self, tr: &Transition) {
        self.state.extend(tr.state.iter().copied());
        self.action.extend(tr.action.iter().copied());
        self.reward.push(tr.reward);
        self.next_state.extend(tr.next_state.iter().copied());
        self.is_done.push(tr.done as i8);
        if let Some(g) = tr.n_step_return {
            self.n_step_return.push(g);
        }
    }

    pub fn build(
        self,
        ix_sample: Vec<usize>,
        weight: Option<Vec<f32>>,
    ) -> Result<TransitionBatch, RecallError> {
        let n = self.reward.len();
        let state = stack(n, &self.schema.state_shape, self.state, "state")?;
        let action = stack(n, &self.schema.action_shape, self.action, "action")?;
        let next_state = stack(n, &self.schema.state_shape, self.next_state, "next_state")?;
        let n_step_return = if self.schema.n_step_return {
            Some(self.n_step_return)
        } else {
            None
        };

        Ok(TransitionBatch {
            state,
            action,
            reward: self.reward,
            next_state,
            is_done: self.is_done,
            n_step_return,
            weight,
            ix_sample,
        })
    }
}

fn stack(
    n: usize,
    shape: &[usize],
    data: Vec<f32>,
    field: &str,
) -> Result<ArrayD<f32>, RecallError> {
    let mut batch_shape = Vec::with_capacity(shape.len() + 1);
    batch_shape.push(n);
    batch_shape.extend_from_slice(shape);
    let len = data.len();
    ArrayD::from_shape_vec(IxDyn(&batch_shape), data).map_err(|_| RecallError::SchemaMismatch {
        field: field.to_string(),
        expected: format!("{:?}", batch_shape),
        actual: format!("{} elements", len),
    })
}
