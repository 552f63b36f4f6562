//! Scoring a candidate `ControlForm` so the planner can rank lines.

/// Non-negative weights applied to the three cost terms. Defaults match
/// the tunables in `engine-config`; callers in tests are free to
/// construct their own to exercise edge cases.
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub time: f64,
    pub queue: f64,
    pub step: f64,
}

impl Weights {
    pub const fn new(time: f64, queue: f64, step: f64) -> Self {
        Self { time, queue, step }
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self::new(1.0, 125.0, 100.0)
    }
}

/// Inputs a line contributes to a piece's candidate score: how long this
/// form takes to execute, how full the line's conveyor is right now, and
/// how far along the piece's recipe is.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    pub intrinsic_time_secs: u32,
    pub queue_size: u32,
    pub total_steps: u32,
    pub steps_completed: u32,
}

/// `score = TIME * intrinsicTime + QUEUE * queueSize + STEP * (totalSteps - stepsCompleted)`.
pub fn score(weights: Weights, inputs: ScoreInputs) -> f64 {
    let remaining_steps = inputs.total_steps.saturating_sub(inputs.steps_completed);
    weights.time * f64::from(inputs.intrinsic_time_secs)
        + weights.queue * f64::from(inputs.queue_size)
        + weights.step * f64::from(remaining_steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_matches_weighted_sum() {
        let inputs = ScoreInputs {
            intrinsic_time_secs: 40,
            queue_size: 2,
            total_steps: 5,
            steps_completed: 2,
        };
        let got = score(Weights::default(), inputs);
        assert_eq!(got, 1.0 * 40.0 + 125.0 * 2.0 + 100.0 * 3.0);
    }

    #[test]
    fn remaining_steps_never_underflows() {
        let inputs = ScoreInputs {
            intrinsic_time_secs: 0,
            queue_size: 0,
            total_steps: 1,
            steps_completed: 3,
        };
        let got = score(Weights::default(), inputs);
        assert_eq!(got, 0.0);
    }
}
