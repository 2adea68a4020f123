use crate::report::{print_parameters, run_match_report, MatchArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use lender_match::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "lender-match",
    about = "Match loan applications against lender credit policies",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the default parameter catalogue
    Parameters,
    /// Evaluate one application against policies read from JSON files
    Match(MatchArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Parameters => {
            print_parameters();
            Ok(())
        }
        Command::Match(args) => run_match_report(args),
    }
}
