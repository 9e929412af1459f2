//! Run one command on a remote host and print its merged output.
//!
//! Configuration comes from `SKIFF_*` environment variables and, if
//! present, `~/.config/skiff/config.toml`; the agent is tried when nothing
//! else is configured.
//!
//! Run with: `cargo run --example run_command -- host 'uname -a'`

use std::io::Write;

use skiff::prelude::*;
use skiff::{ConfigFile, EnvConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [host, command] = args.as_slice() else {
        eprintln!("usage: run_command HOST COMMAND");
        std::process::exit(2);
    };

    let mut config = ClientConfig::default();
    if let Some(path) = ConfigFile::default_path() {
        config = ConfigFile::load(&path)?.apply(config)?;
    }
    config = config.with_env(&EnvConfig::default())?;
    if config.auth_methods().is_empty() {
        config = config.with_agent();
    }

    let conn = connect(host, &config).await?;
    let result = run_command(&conn, command).await;
    conn.close().await?;

    match result {
        Ok(output) => {
            std::io::stdout().write_all(&output)?;
            Ok(())
        }
        Err(e) => {
            if let Some(output) = e.output() {
                std::io::stdout().write_all(output)?;
            }
            Err(e)
        }
    }
}
