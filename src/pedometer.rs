#[derive(Clone, Debug)]
pub struct Step {
    pub timestamp: f64,
    pub magnitude: f64, // m/s², filtered
    pub count: u64,
}

/// Peak-magnitude step detector with a refractory window.
///
/// A step counts when the filtered acceleration magnitude lies strictly
/// between `threshold` and `2 * threshold` and more than `min_interval`
/// seconds have passed since the last counted step. Larger spikes are
/// rejected as non-gait motion.
#[derive(Clone, Debug)]
pub struct StepDetector {
    threshold: f64,
    min_interval: f64,
    last_step_time: Option<f64>,
    count: u64,
}

impl StepDetector {
    pub fn new(threshold: f64, min_interval: f64) -> Self {
        Self {
            threshold,
            min_interval,
            last_step_time: None,
            count: 0,
        }
    }

    pub fn detect(&mut self, magnitude: f64, timestamp: f64) -> Option<Step> {
        if magnitude <= self.threshold {
            return None;
        }

        // Reject spikes outside the gait window
        if magnitude >= 2.0 * self.threshold {
            return None;
        }

        if let Some(last) = self.last_step_time {
            if timestamp - last <= self.min_interval {
                return None;
            }
        }

        self.last_step_time = Some(timestamp);
        self.count += 1;
        Some(Step {
            timestamp,
            magnitude,
            count: self.count,
        })
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn last_step_time(&self) -> Option<f64> {
        self.last_step_time
    }
}
