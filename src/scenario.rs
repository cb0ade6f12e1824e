//! One scenario: a payload shape swept over powers of a base, benchmarked
//! with one hook triple.

use std::io::Write;

use crate::clock::CpuClock;
use crate::context::RunContext;
use crate::error::Result;
use crate::harness::{estimate_iterations, measure, BenchConfig};
use crate::hooks::{HookRun, HookSet};
use crate::payload::{size_of, GeneratorId};
use crate::schema::{log2_floor, throughput, ResultRecord};
use crate::store::DocumentStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScenarioSpec {
    pub base: u32,
    /// Highest power measured, inclusive.
    pub max_power: u32,
    pub generator: GeneratorId,
    pub hooks: HookSet,
}

impl ScenarioSpec {
    pub const fn new(base: u32, max_power: u32, generator: GeneratorId, hooks: HookSet) -> Self {
        Self {
            base,
            max_power,
            generator,
            hooks,
        }
    }

    /// Same scenario with `max_power` limited to `cap`.
    pub fn capped(self, cap: Option<u32>) -> Self {
        match cap {
            Some(cap) => Self {
                max_power: self.max_power.min(cap),
                ..self
            },
            None => self,
        }
    }

    /// Reject bases below 2 and sizes that cannot be materialized.
    pub fn validate(&self) -> Result<()> {
        size_of(self.base, self.max_power).map(|_| ())
    }
}

/// Calibrates and measures single (scenario, power) pairs.
pub struct ScenarioRunner<'a, C: CpuClock + ?Sized> {
    pub clock: &'a C,
    pub config: &'a BenchConfig,
    pub context: &'a RunContext,
    pub collection: &'a str,
}

impl<C: CpuClock + ?Sized> ScenarioRunner<'_, C> {
    /// Generate the payload for `power`, calibrate, measure, and emit the
    /// record to `progress` before returning it.
    pub fn run_power(
        &self,
        store: &mut dyn DocumentStore,
        spec: &ScenarioSpec,
        power: u32,
        progress: &mut dyn Write,
    ) -> Result<ResultRecord> {
        let payload = spec.generator.generate(spec.base, power)?;
        let size = payload.size;

        // Hook state lives exactly as long as this pair's run.
        let mut run = HookRun::new(spec.hooks, store, self.collection, payload.document);
        let estimate = estimate_iterations(self.clock, self.config, &mut run)?;
        let timing = measure(self.clock, &mut run, estimate.iterations)?;
        drop(run);

        let (ops_per_second, microseconds_per_op) =
            throughput(estimate.iterations, timing.user_cpu_seconds, timing.wall_seconds);

        let record = ResultRecord {
            base: spec.base,
            power,
            size,
            log2_size: log2_floor(size),
            generator_name: spec.generator.name().to_string(),
            operation_name: spec.hooks.operation.name().to_string(),
            iterations: estimate.iterations,
            user_cpu_seconds: timing.user_cpu_seconds,
            wall_seconds: timing.wall_seconds,
            estimation_wall_seconds: estimate.wall_seconds,
            ops_per_second,
            microseconds_per_op,
            mode: self.context.mode,
            hostname: self.context.hostname.clone(),
            os_name: self.context.os_name.clone(),
            date: self.context.date.clone(),
            tag: self.context.tag.clone(),
        };

        serde_json::to_writer(&mut *progress, &record)?;
        writeln!(progress)?;
        progress.flush()?;

        Ok(record)
    }
}
