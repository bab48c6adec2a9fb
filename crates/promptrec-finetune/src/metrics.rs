//! Step metrics logging

use std::time::Instant;

/// Metrics for one optimizer step.
#[derive(Debug, Clone)]
pub struct StepMetrics {
    pub epoch: usize,
    pub step: usize,
    pub loss: f32,
    pub accuracy: f32,
    pub learning_rate: f32,
    pub throughput: f32,
}

/// Prints training metrics every `log_interval` steps.
pub struct MetricsLogger {
    log_interval: usize,
    step: usize,
    last_log: Instant,
    tokens_since_log: usize,
    quiet: bool,
}

impl MetricsLogger {
    pub fn new(log_interval: usize, quiet: bool) -> Self {
        Self {
            log_interval: log_interval.max(1),
            step: 0,
            last_log: Instant::now(),
            tokens_since_log: 0,
            quiet,
        }
    }

    pub fn log_step(
        &mut self,
        epoch: usize,
        loss: f32,
        accuracy: f32,
        learning_rate: f32,
        tokens_processed: usize,
    ) {
        self.step += 1;
        self.tokens_since_log += tokens_processed;

        if self.step % self.log_interval != 0 {
            return;
        }

        let elapsed = self.last_log.elapsed().as_secs_f32();
        let throughput = if elapsed > 0.0 {
            self.tokens_since_log as f32 / elapsed
        } else {
            0.0
        };

        let metrics = StepMetrics {
            epoch,
            step: self.step,
            loss,
            accuracy,
            learning_rate,
            throughput,
        };
        if !self.quiet {
            self.print(&metrics);
        }

        self.last_log = Instant::now();
        self.tokens_since_log = 0;
    }

    fn print(&self, metrics: &StepMetrics) {
        println!(
            "Epoch {} step {}: loss={:.4}, acc={:.4}, lr={:.2e}, throughput={:.0} tokens/s",
            metrics.epoch,
            metrics.step,
            metrics.loss,
            metrics.accuracy,
            metrics.learning_rate,
            metrics.throughput
        );
    }

    pub fn step(&self) -> usize {
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_counter_advances() {
        let mut logger = MetricsLogger::new(10, true);
        logger.log_step(1, 2.0, 0.1, 3e-5, 128);
        logger.log_step(1, 1.9, 0.2, 3e-5, 128);
        assert_eq!(logger.step(), 2);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let logger = MetricsLogger::new(0, true);
        assert_eq!(logger.log_interval, 1);
    }
}
