use serde::{Deserialize, Serialize};

/// Decides at which steps output is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputTrigger {
    /// Writes every `skip + 1` steps, starting with the first.
    EveryStep { skip: usize },
    /// Writes when at least `time_skip` has elapsed since the last write, and at the first step.
    Time {
        time_skip: f64,
        #[serde(skip)]
        last_write: Option<f64>,
    },
}

impl Default for OutputTrigger {
    fn default() -> Self {
        Self::EveryStep { skip: 0 }
    }
}

impl OutputTrigger {
    pub fn every_step(skip: usize) -> Self {
        Self::EveryStep { skip }
    }

    pub fn time(time_skip: f64) -> Self {
        Self::Time {
            time_skip,
            last_write: None,
        }
    }

    /// Whether to write at time `t` (dimensional) and step `step`, recording the write.
    pub fn should_write(&mut self, t: f64, step: usize) -> bool {
        match self {
            Self::EveryStep { skip } => step % (*skip + 1) == 0,
            Self::Time { time_skip, last_write } => {
                let write = match last_write {
                    None => true,
                    // Relative slack so that accumulated round-off in t does not skip a write
                    Some(last) => t - *last >= *time_skip * (1.0 - 1e-10),
                };
                if write {
                    *last_write = Some(t);
                }
                write
            }
        }
    }
}
