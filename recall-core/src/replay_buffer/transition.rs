//! Transitions and the schema agreed between producers and the replay buffer.
use crate::error::RecallError;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// One step of interaction `(s_t, a_t, r_t, s_t+1, done_t)`.
///
/// A transition is moved into the replay buffer when stored; the buffer never keeps
/// a reference to memory owned by the producer.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// State `s_t`.
    pub state: ArrayD<f32>,

    /// Action `a_t`. A discrete action is a zero-dimensional array.
    pub action: ArrayD<f32>,

    /// Reward `r_t`.
    pub reward: f32,

    /// Next state `s_t+1`, or the state `n` steps later for n-step transitions.
    pub next_state: ArrayD<f32>,

    /// `true` if the episode ended at this transition.
    pub done: bool,

    /// Discounted n-step return, present only when the schema asks for it.
    pub n_step_return: Option<f32>,

    /// Initial priority computed by the producer.
    ///
    /// Only a prioritized sampler looks at it; if `None`, the maximum priority in the
    /// index is used.
    pub priority: Option<f32>,
}

impl Transition {
    /// Creates a one-step transition without auxiliary fields.
    pub fn new(
        state: ArrayD<f32>,
        action: ArrayD<f32>,
        reward: f32,
        next_state: ArrayD<f32>,
        done: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
            n_step_return: None,
            priority: None,
        }
    }

    /// Sets the n-step return.
    pub fn with_n_step_return(mut self, n_step_return: f32) -> Self {
        self.n_step_return = Some(n_step_return);
        self
    }

    /// Tags the transition with an initial priority.
    pub fn with_priority(mut self, priority: f32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Fixed set of fields accepted by a replay buffer.
///
/// It is declared in [`ReplayBufferConfig`](super::ReplayBufferConfig) at construction
/// time, so a buffer never has to infer shapes from the data it receives.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TransitionSchema {
    /// Shape of `state` and `next_state`.
    pub state_shape: Vec<usize>,

    /// Shape of `action`; empty for scalar actions.
    pub action_shape: Vec<usize>,

    /// If `true`, every transition must carry `n_step_return`.
    pub n_step_return: bool,
}

impl Default for TransitionSchema {
    fn default() -> Self {
        Self {
            state_shape: vec![1],
            action_shape: vec![],
            n_step_return: false,
        }
    }
}

impl TransitionSchema {
    /// Creates a schema for the given state and action shapes.
    pub fn new(state_shape: &[usize], action_shape: &[usize]) -> Self {
        Self {
            state_shape: state_shape.to_vec(),
            action_shape: action_shape.to_vec(),
            n_step_return: false,
        }
    }

    /// Requires the `n_step_return` field.
    pub fn n_step_return(mut self, v: bool) -> Self {
        self.n_step_return = v;
        self
    }

    /// Checks a transition against the schema.
    pub fn validate(&self, tr: &Transition) -> Result<(), RecallError> {
        check_shape("state", &self.state_shape, tr.state.shape())?;
        check_shape("next_state", &self.state_shape, tr.next_state.shape())?;
        check_shape("action", &self.action_shape, tr.action.shape())?;

        if self.n_step_return != tr.n_step_return.is_some() {
            return Err(RecallError::SchemaMismatch {
                field: "n_step_return".to_string(),
                expected: presence(self.n_step_return),
                actual: presence(tr.n_step_return.is_some()),
            });
        }

        Ok(())
    }

    /// Number of scalars in a state.
    pub(crate) fn state_len(&self) -> usize {
        self.state_shape.iter().product()
    }

    /// Number of scalars in an action.
    pub(crate) fn action_len(&self) -> usize {
        self.action_shape.iter().product()
    }
}

fn check_shape(field: &str, expected: &[usize], actual: &[usize]) -> Result<(), RecallError> {
    if expected == actual {
        Ok(())
    } else {
        Err(RecallError::SchemaMismatch {
            field: field.to_string(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        })
    }
}

fn presence(v: bool) -> String {
    if v { "present" } else { "absent" }.to_string()
}
