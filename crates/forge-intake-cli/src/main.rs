use forge_intake_cli::run_cli;
use tracing::debug;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        debug!(exit_code = e.exit_code(), "CLI command failed");
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
