use super::CliError;
use super::helpers::*;
use fdtd_core::compare::{ProbeComparator, compare_probe_files};
use fdtd_core::config::{RunConfig, case_name_from_path};
use fdtd_core::probes::read_probe;
use fdtd_core::solver::{
    DEFAULT_SUCCESS_CODE, SolverOptions, SolverRun, discover_probe_files, list_probe_files,
};
use fdtd_core::workspace::stage_file;
use std::path::PathBuf;
use std::time::Duration;

#[derive(clap::Args)]
pub(super) struct RunArgs {
    /// Case configuration (`<case>.fdtd.json`); the solver runs in its directory
    config: PathBuf,

    /// Solver executable
    #[arg(long, env = "FDTD_SOLVER_EXE")]
    exe: PathBuf,

    /// Overwrite general.numberOfSteps before running
    #[arg(long)]
    steps: Option<u64>,

    /// Overwrite probes[<probe-index>].domain.numberOfFrequencies before running
    #[arg(long)]
    frequencies: Option<u64>,

    /// Probe index that --frequencies applies to
    #[arg(long, requires = "frequencies")]
    probe_index: Option<usize>,

    /// Kill the solver after this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout_secs: Option<u64>,

    /// Exit code the solver reports on success
    #[arg(long, default_value_t = DEFAULT_SUCCESS_CODE, allow_negative_numbers = true)]
    success_code: i32,

    /// Copy a file (e.g. an excitation) next to the configuration before running
    #[arg(long = "stage", value_name = "FILE")]
    stage: Vec<PathBuf>,

    /// Report the files written for this probe name (repeatable)
    #[arg(long = "probe", value_name = "NAME")]
    probes: Vec<String>,
}

#[derive(clap::Args)]
pub(super) struct ReadArgs {
    /// Probe output file
    file: PathBuf,

    /// Print the parsed record as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
pub(super) struct DiscoverArgs {
    /// Directory to scan
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Only list files for this probe name
    #[arg(long)]
    probe: Option<String>,
}

#[derive(clap::Args)]
pub(super) struct CompareArgs {
    /// Reference probe file
    expected: PathBuf,

    /// Probe file under test
    actual: PathBuf,

    /// Tolerance policy JSON
    #[arg(long)]
    policy: Option<PathBuf>,

    /// JSON report output path
    #[arg(long)]
    report: Option<PathBuf>,
}

impl RunArgs {
    fn options(&self) -> SolverOptions {
        SolverOptions {
            success_code: self.success_code,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

pub(super) fn run_solver_command(args: RunArgs) -> Result<i32, CliError> {
    let working_dir = current_working_dir()?;
    let config_path = resolve_cli_path(&working_dir, &args.config);

    if args.steps.is_some() || args.frequencies.is_some() {
        let mut config = RunConfig::load(&config_path).map_err(CliError::compute)?;
        if let Some(steps) = args.steps {
            config
                .set_number_of_steps(steps)
                .map_err(CliError::compute)?;
        }
        if let Some(frequencies) = args.frequencies {
            config
                .set_number_of_frequencies(args.probe_index.unwrap_or(0), frequencies)
                .map_err(CliError::compute)?;
        }
        config.save(&config_path).map_err(CliError::compute)?;
        tracing::debug!(
            config = %config_path.display(),
            steps = ?args.steps,
            frequencies = ?args.frequencies,
            "patched run configuration"
        );
    }

    let mut run = SolverRun::new(&args.exe, &config_path).with_options(args.options());
    for input in &args.stage {
        let staged = stage_file(resolve_cli_path(&working_dir, input), run.working_directory())
            .map_err(CliError::compute)?;
        println!("Staged {}", staged.display());
    }

    let case_name =
        case_name_from_path(&config_path).unwrap_or_else(|| config_path.display().to_string());
    println!("Running solver for case '{}'...", case_name);
    let status = run.run().map_err(CliError::compute)?;
    match run.termination() {
        Some(termination) => println!("Solver {} ({}).", status, termination),
        None => println!("Solver {}.", status),
    }

    if args.probes.is_empty() {
        let probes = run.solved_probes().map_err(CliError::compute)?;
        println!("{} probe file(s) in '{}'.", probes.len(), run.working_directory().display());
        for probe in probes {
            println!("  {}", probe);
        }
    } else {
        for probe in &args.probes {
            let files = run
                .solved_probe_filenames(probe)
                .map_err(CliError::compute)?;
            println!("Probe '{}': {} file(s).", probe, files.len());
            for file in files {
                println!("  {}", file);
            }
        }
    }

    if run.has_finished_successfully() { Ok(0) } else { Ok(1) }
}

pub(super) fn run_read_command(args: ReadArgs) -> Result<i32, CliError> {
    let working_dir = current_working_dir()?;
    let record =
        read_probe(resolve_cli_path(&working_dir, &args.file)).map_err(CliError::compute)?;

    if args.json {
        let json = serde_json::to_string_pretty(&record)
            .map_err(|source| CliError::Internal(source.into()))?;
        println!("{}", json);
    } else {
        println!("{}", render_record_summary(&record));
    }
    Ok(0)
}

pub(super) fn run_discover_command(args: DiscoverArgs) -> Result<i32, CliError> {
    let working_dir = current_working_dir()?;
    let dir = resolve_cli_path(&working_dir, &args.dir);

    match &args.probe {
        Some(probe) => {
            let files = discover_probe_files(&dir, probe).map_err(CliError::compute)?;
            for file in &files {
                println!("{}", file.display());
            }
            println!("{} file(s) for probe '{}'.", files.len(), probe);
        }
        None => {
            let probes = list_probe_files(&dir).map_err(CliError::compute)?;
            for probe in &probes {
                println!(
                    "{}\t{}\t{}",
                    probe.file_name,
                    probe.file_name.kind(),
                    probe.file_name.probe_name()
                );
            }
            println!("{} probe file(s).", probes.len());
        }
    }
    Ok(0)
}

pub(super) fn run_compare_command(args: CompareArgs) -> Result<i32, CliError> {
    let working_dir = current_working_dir()?;
    let comparator = match &args.policy {
        Some(policy) => ProbeComparator::from_policy_path(resolve_cli_path(&working_dir, policy))
            .map_err(CliError::compute)?,
        None => ProbeComparator::default(),
    };

    let comparison = compare_probe_files(
        &comparator,
        resolve_cli_path(&working_dir, &args.expected),
        resolve_cli_path(&working_dir, &args.actual),
    )
    .map_err(CliError::compute)?;

    let category = comparison.category.as_deref().unwrap_or("default");
    match &comparison.reason {
        None => println!("PASS {} [{}]", comparison.file_name, category),
        Some(reason) => println!("FAIL {} [{}]: {}", comparison.file_name, category, reason),
    }

    if let Some(report) = &args.report {
        let report_path = resolve_cli_path(&working_dir, report);
        write_json_report(&report_path, &comparison)?;
        println!("JSON report: {}", report_path.display());
    }

    if comparison.passed { Ok(0) } else { Ok(1) }
}
