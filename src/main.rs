/// Main entry point for the top-moves compute service
///
/// This serves as a thin wrapper that delegates to the interfaces layer.
/// The actual application logic is implemented in `interfaces::cli`.

use std::process::ExitCode;
use topmoves_service::interfaces::cli;

#[tokio::main]
async fn main() -> ExitCode {
    cli::run().await
}
