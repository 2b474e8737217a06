//! A single thread acting as both producer and learner.
use anyhow::Result;
use ndarray::{arr0, arr1, ArrayD};
use recall_core::{
    coordinator::{Coordinator, TargetSnapshot},
    replay_buffer::{NStepProcessor, ReplayBuffer, TransitionBatch},
    AgentKind, Learner, OptOutput, TrainConfig,
};
use test_log::test;

/// Counts its updates; the parameters are the update count.
struct CountingLearner {
    n_opts: usize,
    targets_seen: Vec<usize>,
}

impl Learner for CountingLearner {
    type Params = usize;

    fn kind(&self) -> AgentKind {
        AgentKind::Rainbow
    }

    fn params(&self) -> usize {
        self.n_opts
    }

    fn opt(&mut self, batch: &TransitionBatch, target: &TargetSnapshot<usize>) -> Result<OptOutput> {
        self.n_opts += 1;
        self.targets_seen.push(target.params);
        Ok(OptOutput {
            loss: 0.0,
            td_errors: Some(batch.reward.clone()),
        })
    }
}

const CONFIG: &str = "
name: rainbow
buffer_size: 1000
batch_size: 16
start_train_step: 100
update_period: 8
target_update_period: 5
n_step: 3
gamma: 0.9
";

fn state(t: usize) -> ArrayD<f32> {
    arr1(&[t as f32, 0.0]).into_dyn()
}

#[test]
fn test_learning_schedule_and_target_sync() -> Result<()> {
    let config: TrainConfig = serde_yaml::from_str(CONFIG)?;
    let buffer = ReplayBuffer::new(&config.replay_buffer_config(&[2], &[])?)?;
    let mut coordinator = Coordinator::new(&config.coordinator_config()?, 0usize)?;
    let mut n_step = match config.n_step_config()? {
        Some(c) => NStepProcessor::build(&c)?,
        None => panic!("rainbow uses n-step returns"),
    };
    let mut learner = CountingLearner {
        n_opts: 0,
        targets_seen: vec![],
    };

    let mut learn_steps = vec![];
    for t in 0..300 {
        let done = t % 50 == 49;
        let trs = n_step.process(state(t), arr0(0.0).into_dyn(), 1.0, state(t + 1), done);
        buffer.store(trs)?;

        if coordinator.step() {
            learn_steps.push(t);
            let batch = buffer.sample(config.batch_size)?;
            assert!(batch.weight.is_some());
            assert!(batch.n_step_return.is_some());

            let target = coordinator.target_snapshot();
            let out = learner.opt(&batch, &target)?;
            if let Some(td_errors) = out.td_errors {
                let ps = td_errors.iter().map(|e| e.abs()).collect::<Vec<_>>();
                buffer.update_priorities(&batch.ix_sample, &ps)?;
            }
            coordinator.record_opt(|| learner.params());
        }
    }

    assert_eq!(learn_steps, (100..300).step_by(8).collect::<Vec<_>>());
    // Target parameters only change every 5 updates.
    let expected = (0..learner.n_opts).map(|k| k / 5 * 5).collect::<Vec<_>>();
    assert_eq!(learner.targets_seen, expected);
    Ok(())
}
