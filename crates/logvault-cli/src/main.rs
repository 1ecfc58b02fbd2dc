use std::sync::Arc;

use clap::Parser;

use logvault_cli::commands::{format_info, format_sessions, open_store, run_export};
use logvault_cli::{Cli, CliConfig, Command};
use logvault_logging::LogvaultSubscriberBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref())?;
    config.apply(&cli);

    let _log_guard = LogvaultSubscriberBuilder::new()
        .with_config(config.log.clone())
        .init()?;

    let filter = cli.command.filter();
    match cli.command {
        Command::Info => {
            let store = open_store(&config.store)?;
            print!("{}", format_info(&store.info()?, &config.store));
        }

        Command::Sessions => {
            let store = open_store(&config.store)?;
            print!("{}", format_sessions(&store.sessions()?));
        }

        Command::Export { format, output, .. } => {
            let store = Arc::new(open_store(&config.store)?);
            let filter = filter.unwrap_or_default();
            let written =
                run_export(store, filter, format, config.export, output.as_deref()).await?;
            for path in written {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}
