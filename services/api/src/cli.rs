use crate::infra::parse_date;
use crate::recompute::{run_dashboard, run_recompute};
use crate::server;
use accredivault::compliance::BatchArgs;
use accredivault::error::AppError;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "accredivault",
    about = "Compute and report control statuses for regulatory compliance packs",
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
    /// Recompute cached statuses for every control in a standard pack
    Recompute(RecomputeArgs),
    /// Recompute a pack and print its dashboard summary
    Dashboard(DashboardArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// JSON snapshot used to seed the in-memory store
    #[arg(long)]
    pub(crate) snapshot: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct RecomputeArgs {
    /// Target the most recent pack with this version string
    #[arg(long)]
    pub(crate) pack_version: Option<String>,
    /// Target the most recently created pack
    #[arg(long)]
    pub(crate) latest: bool,
    /// Only count and persist controls that resolve to OVERDUE
    #[arg(long)]
    pub(crate) only_overdue: bool,
    /// Only count and persist controls due within N days
    #[arg(long, value_name = "DAYS", allow_negative_numbers = true)]
    pub(crate) only_near_due: Option<i64>,
    /// Compute without writing the status cache
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Exit 0 even when controls are overdue
    #[arg(long)]
    pub(crate) no_fail_on_overdue: bool,
    /// Evaluation date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// JSON snapshot with packs, controls, rules, evidence, links and verifications
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
}

impl RecomputeArgs {
    pub(crate) fn batch_args(&self) -> BatchArgs {
        BatchArgs {
            pack_version: self.pack_version.clone(),
            latest: self.latest,
            only_overdue: self.only_overdue,
            only_near_due: self.only_near_due,
            dry_run: self.dry_run,
            no_fail_on_overdue: self.no_fail_on_overdue,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct DashboardArgs {
    /// Pack version to summarize. Defaults to the latest pack.
    #[arg(long)]
    pub(crate) pack_version: Option<String>,
    /// Evaluation date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Emit the summary as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
    /// JSON snapshot with packs, controls, rules, evidence, links and verifications
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
}

pub(crate) async fn run() -> Result<u8, AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await.map(|()| 0),
        Command::Recompute(args) => run_recompute(args),
        Command::Dashboard(args) => run_dashboard(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recompute_flags_parse_into_batch_args() {
        let cli = Cli::try_parse_from([
            "accredivault",
            "recompute",
            "--latest",
            "--only-near-due",
            "-3",
            "--dry-run",
            "--snapshot",
            "pack.json",
        ])
        .expect("parse");

        let Some(Command::Recompute(args)) = cli.command else {
            panic!("expected recompute command");
        };
        let batch = args.batch_args();
        assert!(batch.latest);
        assert!(batch.dry_run);
        assert_eq!(batch.only_near_due, Some(-3));
        assert_eq!(batch.pack_version, None);
    }

    #[test]
    fn default_command_is_serve() {
        let cli = Cli::try_parse_from(["accredivault"]).expect("parse");
        assert!(cli.command.is_none());
    }
}
