//! secure CLI - pack and seal directories under a passphrase
//!
//! `encrypt` archives a file or directory and seals it with AES-256-GCM
//! under a key derived from the passphrase; `decrypt` reverses it.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use secure::error::Result;
use secure::file_ops::{self, DecryptTarget, Payload};
use secure::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};

#[derive(Parser)]
#[command(name = "secure")]
#[command(version)]
#[command(about = "Pack a file or directory and seal it with a passphrase.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin (verbatim, up to EOF) instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Log more (-v for progress, -vv for every step). RUST_LOG overrides this.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive and encrypt a file or directory
    #[command(alias = "e")]
    Encrypt {
        /// File or directory to encrypt
        #[arg(value_name = "PATH")]
        input: PathBuf,

        /// Where to write the sealed container [default: <PATH>.encrypted]
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Seal the bytes of a single file without archiving them
        #[arg(long)]
        raw: bool,
    },

    /// Decrypt a sealed container and unpack it
    #[command(alias = "d")]
    Decrypt {
        /// Sealed container to decrypt
        #[arg(value_name = "PATH")]
        input: PathBuf,

        /// Directory to unpack into
        #[arg(short = 'C', long, value_name = "DIR", default_value = ".", conflicts_with = "raw")]
        directory: PathBuf,

        /// Write the recovered bytes to a single file instead of unpacking
        #[arg(long)]
        raw: bool,

        /// Output file for --raw [default: <PATH> without .encrypted]
        #[arg(short, long, value_name = "FILE", requires = "raw")]
        output: Option<PathBuf>,
    },

    /// Archive a file or directory without encrypting it
    #[command(alias = "p")]
    Pack {
        /// File or directory to archive
        #[arg(value_name = "PATH")]
        input: PathBuf,

        /// Where to write the archive [default: <PATH>.archive]
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Unpack an unencrypted archive
    #[command(alias = "u")]
    Unpack {
        /// Archive to unpack
        #[arg(value_name = "PATH")]
        input: PathBuf,

        /// Directory to unpack into
        #[arg(short = 'C', long, value_name = "DIR", default_value = ".")]
        directory: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e.report());
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Encrypt { input, output, raw } => {
            let output = match output {
                Some(path) => path,
                None => file_ops::default_encrypted_path(&input)?,
            };
            let payload = if raw { Payload::Raw } else { Payload::Archive };
            let mut reader = get_passphrase_reader(cli.passphrase_stdin);
            file_ops::encrypt_path(&input, &output, payload, &mut *reader)
        }
        Commands::Decrypt {
            input,
            directory,
            raw,
            output,
        } => {
            let target = if raw {
                match output {
                    Some(path) => DecryptTarget::Raw(path),
                    None => DecryptTarget::Raw(file_ops::default_decrypted_path(&input)?),
                }
            } else {
                DecryptTarget::Extract(directory)
            };
            let mut reader = get_passphrase_reader(cli.passphrase_stdin);
            file_ops::decrypt_path(&input, &target, &mut *reader).map(|_| ())
        }
        Commands::Pack { input, output } => {
            let output = match output {
                Some(path) => path,
                None => file_ops::default_archive_path(&input)?,
            };
            file_ops::pack_path(&input, &output)
        }
        Commands::Unpack { input, directory } => {
            file_ops::unpack_path(&input, &directory).map(|_| ())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .init();
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}
