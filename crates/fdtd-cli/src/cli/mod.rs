mod commands;
mod helpers;

use clap::Parser;
use std::io::IsTerminal;
use fdtd_core::domain::FdtdError;
use tracing_subscriber::EnvFilter;

const PROGRAM_NAME: &str = "fdtd-rs";

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let diagnostic = error.as_fdtd_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            eprintln!("{}", diagnostic.fatal_exit_line());
            diagnostic.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once(PROGRAM_NAME.to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A second initialization (e.g. repeated `run` calls in one process) is a no-op.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(name = "fdtd-rs", version, about = "Drive an FDTD solver and inspect its probe output")]
struct Cli {
    /// Log solver launches, discovery and parsing at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Run the solver on a case configuration and list the probe files it wrote
    Run(commands::RunArgs),
    /// Parse one probe file and summarize it
    Read(commands::ReadArgs),
    /// List probe files in a directory
    Discover(commands::DiscoverArgs),
    /// Compare two probe files under a tolerance policy
    Compare(commands::CompareArgs),
}

impl CliCommand {
    const fn name(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::Read(_) => "read",
            Self::Discover(_) => "discover",
            Self::Compare(_) => "compare",
        }
    }
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    tracing::debug!(command = command.name(), "dispatching command");
    match command {
        CliCommand::Run(args) => commands::run_solver_command(args),
        CliCommand::Read(args) => commands::run_read_command(args),
        CliCommand::Discover(args) => commands::run_discover_command(args),
        CliCommand::Compare(args) => commands::run_compare_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(FdtdError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    /// Wraps any core error that knows its diagnostic category.
    fn compute(error: impl Into<FdtdError>) -> Self {
        Self::Compute(error.into())
    }

    fn as_fdtd_error(&self) -> FdtdError {
        match self {
            Self::Usage(message) => FdtdError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => FdtdError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
