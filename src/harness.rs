use std::time::Instant;

use crate::clock::CpuClock;
use crate::error::{BenchError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Profile {
    Quick,
    #[default]
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }
}

/// Default doubling ceiling for calibration.
pub const MAX_ITERATIONS: u64 = 1 << 30;

#[derive(Clone, Debug, PartialEq)]
pub struct BenchConfig {
    /// CPU budget a calibration batch must exceed before extrapolating.
    pub calibration_cpu_seconds: f64,
    /// CPU time the measured batch should consume.
    pub target_cpu_seconds: f64,
    /// Upper bound on any batch size, calibration or measured.
    pub max_iterations: u64,
}

impl BenchConfig {
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            // Several clock ticks, so the stopping batch is not dominated by
            // tick rounding.
            Profile::Quick => Self {
                calibration_cpu_seconds: 0.05,
                target_cpu_seconds: 0.25,
                max_iterations: MAX_ITERATIONS,
            },
            Profile::Full => Self {
                calibration_cpu_seconds: 0.1,
                target_cpu_seconds: 5.0,
                max_iterations: MAX_ITERATIONS,
            },
        }
    }

    /// Budgets must be positive and finite, and the target no smaller than
    /// the calibration budget.
    pub fn validate(&self) -> Result<()> {
        if !(self.calibration_cpu_seconds > 0.0 && self.calibration_cpu_seconds.is_finite()) {
            return Err(BenchError::Configuration(format!(
                "calibration runtime must be positive, got {}",
                self.calibration_cpu_seconds
            )));
        }
        if !(self.target_cpu_seconds >= self.calibration_cpu_seconds
            && self.target_cpu_seconds.is_finite())
        {
            return Err(BenchError::Configuration(format!(
                "target runtime {} must be at least the calibration runtime {}",
                self.target_cpu_seconds, self.calibration_cpu_seconds
            )));
        }
        if self.max_iterations == 0 {
            return Err(BenchError::Configuration(
                "iteration ceiling must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::for_profile(Profile::Full)
    }
}

/// One setup / N operations / teardown cycle.
///
/// `setup` and `teardown` run outside the timed region.
pub trait Batch {
    fn setup(&mut self, iterations: u64) -> Result<()>;
    fn run_one(&mut self) -> Result<()>;
    fn teardown(&mut self) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    pub user_cpu_seconds: f64,
    pub wall_seconds: f64,
}

/// Calibration outcome.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Estimate {
    pub iterations: u64,
    /// Wall time spent calibrating, all batches included.
    pub wall_seconds: f64,
    /// Number of calibration batches that were run.
    pub batches: u32,
}

/// Run setup once, time exactly `iterations` operations, run teardown once.
pub fn measure<C, B>(clock: &C, batch: &mut B, iterations: u64) -> Result<Timing>
where
    C: CpuClock + ?Sized,
    B: Batch + ?Sized,
{
    batch.setup(iterations)?;

    let cpu_start = clock.user_cpu_seconds();
    let start = Instant::now();
    for _ in 0..iterations {
        batch.run_one()?;
    }
    let wall_seconds = start.elapsed().as_secs_f64();
    let user_cpu_seconds = (clock.user_cpu_seconds() - cpu_start).max(0.0);

    batch.teardown()?;

    Ok(Timing {
        user_cpu_seconds,
        wall_seconds,
    })
}

/// Find how many iterations consume `cfg.target_cpu_seconds` of user CPU.
///
/// Doubles the batch size until a batch uses more than
/// `cfg.calibration_cpu_seconds`, then extrapolates linearly from that batch.
/// A batch that registers no CPU time at all always keeps doubling. If the
/// ceiling is reached first, the estimate is the ceiling.
pub fn estimate_iterations<C, B>(clock: &C, cfg: &BenchConfig, batch: &mut B) -> Result<Estimate>
where
    C: CpuClock + ?Sized,
    B: Batch + ?Sized,
{
    let ceiling = cfg.max_iterations.max(1);
    let start = Instant::now();
    let mut iterations: u64 = 1;
    let mut batches = 0u32;

    let estimated = loop {
        let timing = measure(clock, batch, iterations)?;
        batches += 1;
        log::debug!(
            "calibration batch {batches}: {iterations} iterations, {:.4}s user",
            timing.user_cpu_seconds
        );

        let used = timing.user_cpu_seconds;
        if used > cfg.calibration_cpu_seconds && used > 0.0 {
            let scaled = (iterations as f64 * cfg.target_cpu_seconds / used).round();
            break (scaled as u64).clamp(1, ceiling);
        }
        if iterations >= ceiling {
            log::warn!("calibration hit the {ceiling} iteration ceiling at {used:.4}s user");
            break ceiling;
        }
        iterations = iterations.saturating_mul(2).min(ceiling);
    };

    Ok(Estimate {
        iterations: estimated,
        wall_seconds: start.elapsed().as_secs_f64(),
        batches,
    })
}
