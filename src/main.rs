//! dotvault CLI - track your dotfiles, encrypt your secrets.
//!
//! Dotfiles live as plain files in a git-backed vault; secrets are
//! encrypted into tagged artifacts before they touch the repository.

mod cli;

use clap::Parser;
use cli::{commands, Cli, Commands};
use colored::Colorize;
use dotvault::CryptoError;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = commands::load_config(&cli)?;

    match cli.command {
        Commands::Init { remote } => commands::init(config, remote.as_deref()),
        Commands::Add { source, dest } => commands::add(config, &source, dest.as_deref()),
        Commands::Encrypt {
            file,
            method,
            recipient,
            passphrase_file,
        } => commands::encrypt(
            config,
            &file,
            &method,
            recipient.as_deref(),
            passphrase_file.as_deref(),
        ),
        Commands::Decrypt {
            artifact,
            dest,
            identity,
            passphrase_file,
        } => commands::decrypt(
            config,
            &artifact,
            dest.as_deref(),
            identity.as_deref(),
            passphrase_file.as_deref(),
        ),
        Commands::Push => commands::push(config),
        Commands::Status => commands::status(config),
        Commands::List => commands::list(config),
        Commands::Keygen { output } => commands::keygen(output.as_deref()),
    }
}

/// Map the error chain to a process exit code. Encryption backends
/// carry their own codes; everything else exits 1.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CryptoError>())
        .map(CryptoError::exit_code)
        .unwrap_or(1)
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dotvault={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
