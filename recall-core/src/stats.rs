//! Running statistics for normalizing observations and intrinsic rewards.
//!
//! Neither type is synchronized. When the statistics are updated by workers and read
//! by the learner, share them as `Arc<Mutex<_>>` so that every update and every read
//! sees a consistent `(mean, var, count)` triple.
use crate::{
    checkpoint::{get_state, Checkpoint, StateDict},
    error::RecallError,
};
use ndarray::{Array1, ArrayD, Axis, IxDyn};

/// Running mean and variance per element, updated with batches.
///
/// Batches are merged with the parallel algorithm of Chan et al., so updating with one
/// large batch or with its parts in any order gives the same moments.
#[derive(Clone, Debug, PartialEq)]
pub struct RunningMeanStd {
    mean: ArrayD<f32>,
    var: ArrayD<f32>,
    count: f64,
}

impl RunningMeanStd {
    /// Creates statistics for elements of the given shape.
    ///
    /// The count starts at `1e-4` so that the first update is not divided by zero.
    pub fn new(shape: &[usize]) -> Self {
        Self {
            mean: ArrayD::zeros(IxDyn(shape)),
            var: ArrayD::zeros(IxDyn(shape)),
            count: 1e-4,
        }
    }

    /// Running mean.
    pub fn mean(&self) -> &ArrayD<f32> {
        &self.mean
    }

    /// Running (population) variance.
    pub fn var(&self) -> &ArrayD<f32> {
        &self.var
    }

    /// Number of samples, including the initial `1e-4`.
    pub fn count(&self) -> f64 {
        self.count
    }

    /// Updates the statistics with a batch whose first axis is the sample axis.
    pub fn update(&mut self, x: &ArrayD<f32>) -> Result<(), RecallError> {
        if x.ndim() == 0 {
            return Err(RecallError::SchemaMismatch {
                field: "running_mean_std".to_string(),
                expected: format!("[batch, {:?}]", self.mean.shape()),
                actual: "[]".to_string(),
            });
        }
        let batch_count = x.len_of(Axis(0));
        if batch_count == 0 {
            return Ok(());
        }
        self.check_shape(&x.shape()[1..])?;
        let batch_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| self.mean.clone());
        let batch_var = x.var_axis(Axis(0), 0.0);
        self.update_from_moments(&batch_mean, &batch_var, batch_count)
    }

    /// Merges moments computed elsewhere.
    pub fn update_from_moments(
        &mut self,
        batch_mean: &ArrayD<f32>,
        batch_var: &ArrayD<f32>,
        batch_count: usize,
    ) -> Result<(), RecallError> {
        self.check_shape(batch_mean.shape())?;
        self.check_shape(batch_var.shape())?;

        let n_a = self.count;
        let n_b = batch_count as f64;
        let tot = n_a + n_b;
        let delta = batch_mean - &self.mean;

        let new_mean = &self.mean + &(&delta * (n_b / tot) as f32);
        let m_a = &self.var * n_a as f32;
        let m_b = batch_var * n_b as f32;
        let m2 = m_a + m_b + delta.mapv(|d| d * d) * (n_a * n_b / tot) as f32;

        self.mean = new_mean;
        self.var = m2 / tot as f32;
        self.count = tot;
        Ok(())
    }

    /// Standardizes `x` and clips the result to `[-5, 5]`.
    pub fn normalize(&self, x: &ArrayD<f32>) -> ArrayD<f32> {
        let std = self.var.mapv(|v| v.sqrt() + 1e-7);
        ((x - &self.mean) / &std).mapv(|v| v.max(-5.0).min(5.0))
    }

    fn check_shape(&self, shape: &[usize]) -> Result<(), RecallError> {
        if shape == self.mean.shape() {
            Ok(())
        } else {
            Err(RecallError::SchemaMismatch {
                field: "running_mean_std".to_string(),
                expected: format!("{:?}", self.mean.shape()),
                actual: format!("{:?}", shape),
            })
        }
    }
}

impl Checkpoint for RunningMeanStd {
    /// Elements are stored in logical order as `mean.{i}` and `var.{i}`.
    fn state_dict(&self) -> StateDict {
        let mut sd = StateDict::new();
        for (i, (m, v)) in self.mean.iter().zip(self.var.iter()).enumerate() {
            sd.insert(format!("mean.{}", i), *m as f64);
            sd.insert(format!("var.{}", i), *v as f64);
        }
        sd.insert("count".to_string(), self.count);
        sd
    }

    fn load_state_dict(&mut self, state_dict: &StateDict) -> Result<(), RecallError> {
        let mut mean = self.mean.clone();
        let mut var = self.var.clone();
        for (i, (m, v)) in mean.iter_mut().zip(var.iter_mut()).enumerate() {
            *m = get_state(state_dict, &format!("mean.{}", i))? as f32;
            *v = get_state(state_dict, &format!("var.{}", i))? as f32;
        }
        self.count = get_state(state_dict, "count")?;
        self.mean = mean;
        self.var = var;
        Ok(())
    }
}

/// Discounted running sum of rewards, one per worker.
///
/// Used to scale intrinsic rewards by the standard deviation of their returns.
#[derive(Clone, Debug, PartialEq)]
pub struct RewardForwardFilter {
    gamma: f32,
    rewems: Array1<f32>,
}

impl RewardForwardFilter {
    /// Creates a filter with a single zero sum.
    pub fn new(gamma: f32) -> Self {
        Self {
            gamma,
            rewems: Array1::zeros(1),
        }
    }

    /// Current running sums.
    pub fn rewems(&self) -> &Array1<f32> {
        &self.rewems
    }

    /// Adds rewards of one step, one per worker, and returns the updated sums.
    ///
    /// The sums are repeated to the number of workers on the first wider input, which
    /// must then be a multiple of the current width.
    pub fn update(&mut self, rews: &Array1<f32>) -> Result<Array1<f32>, RecallError> {
        let (n, m) = (self.rewems.len(), rews.len());
        if n < m && m % n == 0 {
            let tiled = (0..m).map(|i| self.rewems[i % n]).collect::<Vec<_>>();
            self.rewems = Array1::from(tiled);
        } else if n != m {
            return Err(RecallError::SchemaMismatch {
                field: "rewems".to_string(),
                expected: format!("[{}]", n),
                actual: format!("[{}]", m),
            });
        }
        self.rewems = &self.rewems * self.gamma + rews;
        Ok(self.rewems.clone())
    }
}

impl Checkpoint for RewardForwardFilter {
    fn state_dict(&self) -> StateDict {
        let mut sd = StateDict::new();
        sd.insert("len".to_string(), self.rewems.len() as f64);
        for (i, r) in self.rewems.iter().enumerate() {
            sd.insert(format!("rewems.{}", i), *r as f64);
        }
        sd
    }

    fn load_state_dict(&mut self, state_dict: &StateDict) -> Result<(), RecallError> {
        let len = get_state(state_dict, "len")? as usize;
        if len == 0 {
            return Err(RecallError::InvalidConfig(
                "reward forward filter needs at least one sum".to_string(),
            ));
        }
        let rewems = (0..len)
            .map(|i| get_state(state_dict, &format!("rewems.{}", i)).map(|r| r as f32))
            .collect::<Result<Vec<_>, _>>()?;
        self.rewems = Array1::from(rewems);
        Ok(())
    }
}
