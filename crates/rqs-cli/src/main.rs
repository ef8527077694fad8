use rqs_cli::{run_cli, CliError};
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!("CLI error: {}", e);

        let exit_code = match e {
            CliError::Configuration(_) => 1,
            CliError::Client(_) => 2,
            CliError::CommandFailed { .. } => 3,
            CliError::InvalidArgument { .. } => 4,
            CliError::Io(_) | CliError::Output(_) => 5,
        };

        std::process::exit(exit_code);
    }
}
