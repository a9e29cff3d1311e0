//! oof-trainer entry point

use clap::Parser;
use oof_trainer::cli::{cmd_info, cmd_models, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oof_trainer=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => {
            cmd_train(&args)?;
        }
        Commands::Models => cmd_models()?,
        Commands::Info { data, target } => cmd_info(&data, target.as_deref())?,
    }

    Ok(())
}
