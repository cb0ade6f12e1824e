//! Scenario tables, the suite driver, and result persistence.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;

use crate::clock::CpuClock;
use crate::context::RunContext;
use crate::error::Result;
use crate::harness::BenchConfig;
use crate::hooks::HookSet;
use crate::payload::GeneratorId;
use crate::scenario::{ScenarioRunner, ScenarioSpec};
use crate::schema::ResultRecord;
use crate::store::DocumentStore;

/// Which scenario tables to run.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum SuiteSelection {
    /// Create: repeated inserts of the same document.
    #[default]
    Insert,
    /// Read: fetch a single document.
    FindOne,
    /// Read: walk a cursor over pre-inserted documents.
    Cursor,
    /// All of the above, in that order.
    All,
}

/// (base, max_power, generator) for every table.
const SHAPES: [(u32, u32, GeneratorId); 14] = [
    (2, 15, GeneratorId::ValueStringSize),
    (2, 15, GeneratorId::KeyStringSize),
    (2, 14, GeneratorId::ArraySizeFixnum),
    (2, 17, GeneratorId::HashSizeFixnum),
    (2, 12, GeneratorId::ArrayNestFixnum),
    (4, 6, GeneratorId::ArrayNestFixnum),
    (8, 4, GeneratorId::ArrayNestFixnum),
    (16, 3, GeneratorId::ArrayNestFixnum),
    (32, 2, GeneratorId::ArrayNestFixnum),
    (2, 15, GeneratorId::HashNestFixnum),
    (4, 8, GeneratorId::HashNestFixnum),
    (8, 4, GeneratorId::HashNestFixnum),
    (16, 4, GeneratorId::HashNestFixnum),
    (32, 3, GeneratorId::HashNestFixnum),
];

fn table(hooks: HookSet) -> impl Iterator<Item = ScenarioSpec> {
    SHAPES
        .into_iter()
        .map(move |(base, max_power, generator)| ScenarioSpec::new(base, max_power, generator, hooks))
}

/// Scenario list for `selection`, in declaration order.
pub fn scenarios(selection: SuiteSelection) -> Vec<ScenarioSpec> {
    let hook_sets: &[HookSet] = match selection {
        SuiteSelection::Insert => &[HookSet::INSERT_ONLY],
        SuiteSelection::FindOne => &[HookSet::FIND_ONE],
        SuiteSelection::Cursor => &[HookSet::CURSOR_SCAN],
        SuiteSelection::All => &[HookSet::INSERT_ONLY, HookSet::FIND_ONE, HookSet::CURSOR_SCAN],
    };
    hook_sets.iter().flat_map(|hooks| table(*hooks)).collect()
}

/// Runs scenario lists against one store and collects their records.
pub struct SuiteDriver<'a, C: CpuClock + ?Sized> {
    pub store: &'a mut dyn DocumentStore,
    pub clock: &'a C,
    pub config: BenchConfig,
    pub context: RunContext,
    pub collection: String,
    /// Receives one JSON line per record as soon as it is measured.
    pub progress: Box<dyn Write + 'a>,
}

impl<C: CpuClock + ?Sized> SuiteDriver<'_, C> {
    /// Every power `0..=max_power` of every scenario, in order.
    ///
    /// The database is dropped before the first and after the last scenario.
    pub fn run(&mut self, scenarios: &[ScenarioSpec]) -> Result<Vec<ResultRecord>> {
        for spec in scenarios {
            spec.validate()?;
        }

        self.store.drop_database()?;

        let runner = ScenarioRunner {
            clock: self.clock,
            config: &self.config,
            context: &self.context,
            collection: &self.collection,
        };

        let mut results = Vec::new();
        for spec in scenarios {
            log::info!(
                "{}/{}/{} {} base={} powers=0..={}",
                spec.hooks.setup.name(),
                spec.hooks.operation.name(),
                spec.hooks.teardown.name(),
                spec.generator.name(),
                spec.base,
                spec.max_power
            );
            for power in 0..=spec.max_power {
                let record = runner.run_power(&mut *self.store, spec, power, &mut *self.progress)?;
                results.push(record);
            }
        }

        self.store.drop_database()?;
        Ok(results)
    }
}

/// `exp_series-<date>-<tag>.json`
pub fn output_file_name(context: &RunContext) -> String {
    format!("exp_series-{}-{}.json", context.date, context.tag)
}

/// Write `records` as a JSON array with one record per line.
pub fn write_records<W: Write>(mut w: W, records: &[ResultRecord]) -> Result<()> {
    writeln!(w, "[")?;
    for (i, record) in records.iter().enumerate() {
        serde_json::to_writer(&mut w, record)?;
        if i + 1 < records.len() {
            write!(w, ",")?;
        }
        writeln!(w)?;
    }
    writeln!(w, "]")?;
    w.flush()?;
    Ok(())
}

/// Persist `records` under `dir`, returning the file written.
pub fn persist(dir: &Path, context: &RunContext, records: &[ResultRecord]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(output_file_name(context));
    let file = fs::File::create(&path)?;
    write_records(BufWriter::new(file), records)?;
    log::info!("results saved to {}", path.display());
    Ok(path)
}

/// Progress stream used by the binary.
pub fn stderr_progress() -> Box<dyn Write> {
    Box::new(io::stderr())
}
