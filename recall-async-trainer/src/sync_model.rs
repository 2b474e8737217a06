/// Shares a model between the learner and the actors.
///
/// The learner publishes [`SyncModel::model_info`] every `sync_interval` optimization
/// steps. Each [`Producer`](crate::Producer) applies the newest published value with
/// [`SyncModel::sync_model`] before its next environment step.
pub trait SyncModel {
    /// Value copy of the model, e.g. network parameters.
    type ModelInfo: Clone;

    /// Returns the number of optimization steps and the current model.
    fn model_info(&self) -> (usize, Self::ModelInfo);

    /// Replaces the model with `model_info`.
    fn sync_model(&mut self, model_info: &Self::ModelInfo);
}
