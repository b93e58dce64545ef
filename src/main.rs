use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use ocypus_lcdd::{
    application::Application,
    cli::{Cli, Command},
    config::{Config, DaemonConfig},
    error::{ConfigError, OpenError, exit_code},
    logging::{self, LogTarget},
    poll_loop::LoopExit,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = Config::locate(cli.config.clone());
    let config = match Config::load_from(config_path.as_deref())
        .map_err(ConfigError::from)
        .and_then(|file| DaemonConfig::resolve(file, &cli.overrides()))
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ocypus_lcdd: {e}");
            return ExitCode::from(exit_code::CONFIG);
        }
    };

    if cli.daemonize {
        if let Err(e) = logging::into_daemon() {
            eprintln!("ocypus_lcdd: failed to daemonize: {e:#}");
            return ExitCode::from(exit_code::GENERAL);
        }
    }

    if let Err(e) = logging::init_log(LogTarget::select(cli.wants_syslog()), config.log_level) {
        eprintln!("ocypus_lcdd: failed to initialize logging: {e:#}");
    }

    match &config_path {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    match run(cli.command, config) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:#}");
            eprintln!("ocypus_lcdd: {e:#}");
            ExitCode::from(failure_code(&e))
        }
    }
}

fn run(command: Command, config: DaemonConfig) -> Result<u8> {
    let app = Application::builder().with_config(config).build()?;

    match command {
        Command::On(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("tokio runtime")?;

            match runtime.block_on(app.run())? {
                LoopExit::Shutdown => Ok(exit_code::SUCCESS),
                LoopExit::OpenRetriesExhausted(e) => {
                    error!("Giving up on the display: {e}");
                    Ok(e.exit_code())
                }
            }
        }
        Command::Off(_) => {
            app.off()?;
            Ok(exit_code::SUCCESS)
        }
        Command::List => {
            let lines = app.list()?;
            if lines.is_empty() {
                info!("No Ocypus display found");
            }
            lines.iter().for_each(|line| println!("{line}"));
            Ok(exit_code::SUCCESS)
        }
        Command::Sensors(_) => {
            app.sensors().iter().for_each(|line| println!("{line}"));
            Ok(exit_code::SUCCESS)
        }
    }
}

fn failure_code(e: &anyhow::Error) -> u8 {
    e.downcast_ref::<OpenError>()
        .map(OpenError::exit_code)
        .unwrap_or(exit_code::GENERAL)
}
