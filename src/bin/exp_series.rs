use clap::{Parser, ValueEnum};
use exp_series_bench::clock::ProcessClock;
use exp_series_bench::context::{sys_info, RunContext};
use exp_series_bench::harness::{BenchConfig, Profile};
use exp_series_bench::store::MemoryStore;
use exp_series_bench::suite::{self, SuiteDriver, SuiteSelection};
use exp_series_bench::{Mode, Result, COLLECTION_NAME, DB_NAME};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "exp-series")]
#[command(
    about = "Exploratory/experimental/exponential series benchmarks for document store performance tuning"
)]
struct Args {
    /// Store code path: "native" (alias "c") or "interpreted" (alias "ruby").
    #[arg(short, long, value_enum, default_value_t = Mode::Interpreted)]
    mode: Mode,

    /// Tag for the run; defaults to the short id of the current git commit.
    #[arg(short, long)]
    tag: Option<String>,

    /// Which scenario tables to run.
    #[arg(long, value_enum, default_value_t = SuiteSelection::Insert)]
    suite: SuiteSelection,

    /// Calibration and target budgets: full is 0.1s/5.0s, quick is 0.05s/0.25s.
    #[arg(long, value_enum, default_value_t = ProfileArg::Full)]
    profile: ProfileArg,

    /// Cap the highest power of every scenario.
    #[arg(long, value_name = "N")]
    max_power: Option<u32>,

    /// User CPU seconds a calibration batch must exceed.
    #[arg(long, value_name = "SECS")]
    calibration_runtime: Option<f64>,

    /// User CPU seconds the measured batch should take.
    #[arg(long, value_name = "SECS")]
    target_runtime: Option<f64>,

    /// Directory for the results file.
    #[arg(long, value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,
}

fn bench_config(args: &Args) -> Result<BenchConfig> {
    let mut cfg = BenchConfig::for_profile(args.profile.into());
    if let Some(secs) = args.calibration_runtime {
        cfg.calibration_cpu_seconds = secs;
    }
    if let Some(secs) = args.target_runtime {
        cfg.target_cpu_seconds = secs;
    }

    cfg.validate()?;
    Ok(cfg)
}

fn run(args: Args) -> Result<()> {
    let config = bench_config(&args)?;
    let context = RunContext::detect(args.mode, args.tag.clone());

    log::info!("{}", serde_json::to_string(&context)?);
    log::info!("{}", sys_info());
    log::info!(
        "profile={} calibration={}s target={}s",
        Profile::from(args.profile).as_str(),
        config.calibration_cpu_seconds,
        config.target_cpu_seconds
    );

    let scenarios: Vec<_> = suite::scenarios(args.suite)
        .into_iter()
        .map(|s| s.capped(args.max_power))
        .collect();

    let clock = ProcessClock::new();
    let mut store = MemoryStore::new(DB_NAME, context.mode);
    let mut driver = SuiteDriver {
        store: &mut store,
        clock: &clock,
        config,
        context: context.clone(),
        collection: COLLECTION_NAME.to_string(),
        progress: suite::stderr_progress(),
    };
    let records = driver.run(&scenarios)?;

    let path = suite::persist(&args.out_dir, &context, &records)?;
    eprintln!("{} results written to {}", records.len(), path.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("exp-series: {e}");
            ExitCode::FAILURE
        }
    }
}
