use std::process::ExitCode;

use accredivault_api::run;

const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("application error: {err}");
            if err.is_usage_error() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
