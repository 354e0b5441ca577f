use std::env::current_dir;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::error;

use common::config::{read_config, EngineConfig};
use common::err::{CResult, EngineError};
use common::log;
use common::server::Server;
use server::MySqlServer;

#[derive(Parser, Serialize, Debug, Clone)]
#[command(name = "sql-engine")]
#[command(version = "0.1.0")]
#[command(author = "rust-us")]
#[command(about = "MySQL wire compatible SQL engine impl with Rust")]
#[command(long_about = None)]
pub(crate) struct CliArgs {
    #[arg(short, long, help = "Path to loaded configuration file", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// enable debug info
    #[arg(short, long, help = "enable debug mode", default_value_t = false)]
    pub debug: bool,

    #[arg(long = "host", help = "listen host", value_name = "host")]
    pub host: Option<String>,

    #[arg(long = "port", help = "listen port, [1-65535]", value_name = "port")]
    pub port: Option<u16>,

    #[arg(short, long = "username", help = "server username", value_name = "username")]
    pub username: Option<String>,

    #[arg(short, long = "password", help = "server password", value_name = "password")]
    pub password: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    if args.debug {
        eprintln!(
            "args: \n{}",
            serde_json::to_string_pretty(&args).unwrap_or_default()
        );
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {}", err);
            return ExitCode::from(2);
        }
    };

    log::init(&config.log);

    eprintln!();
    eprintln!("╦═╗╔═╗╔═╗ ╦  ");
    eprintln!("╠╦╝╚═╗║═╬╗║  ");
    eprintln!("╩╚═╚═╝╚═╝╚╩═╝ SQL engine listening as MySQL {}", server::SERVER_VERSION);
    eprintln!();

    let mut srv = match MySqlServer::new(config) {
        Ok(srv) => srv,
        Err(err) => {
            error!("startup failed: {}", err);
            return ExitCode::from(2);
        }
    };

    match srv.start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ EngineError::Connection(_)) => {
            error!("listen failed: {}", err);
            ExitCode::from(1)
        }
        Err(err) => {
            error!("server stopped: {}", err);
            ExitCode::from(1)
        }
    }
}

/// Config file, then CLI overrides on top.
fn load_config(args: &CliArgs) -> CResult<EngineConfig> {
    let mut config = match config_path(args) {
        Some(path) => read_config(&path)?,
        None => EngineConfig::default(),
    };

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(username) = &args.username {
        config.server.user = username.clone();
    }
    if let Some(password) = &args.password {
        config.server.password = password.clone();
    }
    if args.debug {
        config.log.debug = true;
    }
    Ok(config)
}

fn config_path(args: &CliArgs) -> Option<PathBuf> {
    if let Some(path) = &args.config {
        return Some(path.clone());
    }
    // ./conf/engine.toml next to the working directory, when present
    let mut pwd = current_dir().unwrap_or_else(|_| "/".into());
    pwd.push("conf");
    pwd.push("engine.toml");
    if pwd.exists() {
        Some(pwd)
    } else {
        None
    }
}
