use clap::Parser;

use supplyr::cli::{Cli, Commands, ConfigCommands, generate_config};
use supplyr::config::{get_config, init_config};
use supplyr::runtime::modes::run_server;
use supplyr::system::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config {
            action: ConfigCommands::Generate { output_path, force },
        }) => {
            if let Err(e) = generate_config(output_path.as_deref(), force) {
                eprintln!("{}", e.format_colored());
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::Serve) | None => {
            init_config(&cli.config);
            let config = get_config();

            // guard 必须活到进程结束
            let _log_guard = init_logging(&config.logging)?;

            run_server(&config).await
        }
    }
}
