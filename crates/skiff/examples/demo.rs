//! End-to-end demo against a real SSH server.
//!
//! Connects with a password, falling back to a prompted password, opens an
//! interactive shell, then copies this file to the remote home directory,
//! prints it back with `cat` and removes it again.
//!
//! Run with: `cargo run --example demo -- user@host[:port] [password]`
//!
//! Set `RUST_LOG=skiff=debug` to watch each authentication attempt.

use std::io::{self, BufRead, Write};

use skiff::prelude::*;
use tracing_subscriber::EnvFilter;

fn prompt_password() -> io::Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(target) = args.next() else {
        eprintln!("usage: demo user@host[:port] [password]");
        std::process::exit(2);
    };
    let (user, address) = target
        .split_once('@')
        .ok_or_else(|| Error::config(format!("expected user@host, got '{target}'")))?;

    let config = ClientConfig::new(user)
        .host_key_verification(HostKeyVerification::Tofu)
        .with_password(args.next().unwrap_or_default())
        .with_password_prompt(prompt_password);

    let client = SyncClient::connect(address, &config)?;

    println!("Starting interactive shell; exit it to continue the demo.");
    client.run_interactive_shell()?;

    let source = concat!(env!("CARGO_MANIFEST_DIR"), "/examples/demo.rs");
    let remote = client.copy_file(source, "./")?;
    println!("Copied {source} to {remote}");

    let listing = client.run_command(&format!("cat {remote}"))?;
    io::stdout().write_all(&listing)?;

    client.remove_file(&remote)?;
    println!("Removed {remote}");

    client.close()
}
