mod cli;
mod infra;
mod recompute;
mod routes;
mod server;

use accredivault::error::AppError;

/// Run the selected command, returning the process exit code.
pub async fn run() -> Result<u8, AppError> {
    cli::run().await
}
