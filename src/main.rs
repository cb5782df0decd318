use anta::app;
use anta::config::cli::LogFormat;
use anta::utils::logger;
use anta::Cli;
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.global.log_format {
        LogFormat::Text => logger::init_cli_logger(&cli.global.log_level),
        LogFormat::Json => logger::init_json_logger(&cli.global.log_level),
    }
    tracing::debug!("CLI arguments: {:?}", cli.command);

    match app::execute(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(
                "❌ {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            ExitCode::from(e.exit_code())
        }
    }
}
