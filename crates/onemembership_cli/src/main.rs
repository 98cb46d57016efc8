//! Operator entry point.
//!
//! # Responsibility
//! - Load the config directory, start logging and open the store.
//! - Seed default languages and print a short health summary.
//!
//! Usage: `onemembership_cli [CONFIG_DIR]` (default `./config`).
//! `ONEMEMBERSHIP_LOG_MODE` selects `debug`, `normal` or `off`.

use log::{error, info};
use onemembership_core::logging::{
    archive_rotated_logs, init_logging_with_files, LogMode, SERVER_LOG,
};
use onemembership_core::service::common_service::CommonService;
use onemembership_core::service::provider_service::ServiceProviderService;
use onemembership_core::{default_log_level, load_config_dir, open_db, UserService};
use std::path::Path;
use std::process::ExitCode;

const DEFAULT_CONFIG_DIR: &str = "./config";

fn main() -> ExitCode {
    let config_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_DIR.to_string());
    match run(&config_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!(target: SERVER_LOG, "event=startup module=cli status=error error={message}");
            eprintln!("onemembership: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_dir: &str) -> Result<(), String> {
    let config = load_config_dir(config_dir).map_err(|err| err.to_string())?;

    let mode = std::env::var("ONEMEMBERSHIP_LOG_MODE")
        .ok()
        .and_then(|raw| LogMode::parse(&raw))
        .unwrap_or(LogMode::Normal);
    init_logging_with_files(
        default_log_level(),
        &config.system.logs_path,
        mode,
        &config.system.logs,
    )?;
    match archive_rotated_logs(
        Path::new(&config.system.logs_path),
        Path::new(&config.system.archives_path),
    ) {
        Ok(moved) => info!(
            target: SERVER_LOG,
            "event=log_archive module=cli status=ok moved={moved}"
        ),
        Err(err) => error!(
            target: SERVER_LOG,
            "event=log_archive module=cli status=error error={err}"
        ),
    }

    let conn = open_db(&config.system.database_path).map_err(|err| err.to_string())?;
    let common = CommonService::new(&conn);
    let seeded = common
        .seed_default_languages()
        .map_err(|err| err.to_string())?;
    info!(
        target: SERVER_LOG,
        "event=startup module=cli status=ok seeded_languages={seeded}"
    );

    println!("onemembership_core version={}", onemembership_core::core_version());
    println!("languages={}", common.all_languages().len());
    println!("users={}", UserService::new(&conn).total_users());
    println!(
        "service_providers={}",
        ServiceProviderService::new(&conn).total_service_providers()
    );
    println!("bot={}", config.bot.sp_bot_username);
    Ok(())
}
