//! Command line front end.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;

use jrelax::{ClassFile, Session};

#[derive(Parser)]
#[command(
    name = "jrelax",
    version,
    about = "Rewrite jar archives to run under emulated relaxed memory consistency"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite every class of an archive and emit the transformed archive
    Transform {
        /// Input jar archive
        input: PathBuf,
        /// Output jar archive
        output: PathBuf,
        /// Class name pattern to exclude from rewriting (repeatable);
        /// matches by substring, dots or slashes both accepted
        #[arg(short = 'x', long = "exclude")]
        exclude: Vec<String>,
    },
    /// List the classes of an archive and how a transform would treat them
    Info {
        /// Input jar archive
        input: PathBuf,
        /// Class name pattern to exclude from rewriting (repeatable)
        #[arg(short = 'x', long = "exclude")]
        exclude: Vec<String>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Transform {
            input,
            output,
            exclude,
        } => {
            let session = Session::new(&exclude);
            let stats = session
                .transform_archive(&input, &output)
                .with_context(|| format!("failed to transform {}", input.display()))?;
            println!(
                "{}: {} rewritten, {} excluded, {} resources, {} generated -> {}",
                input.display(),
                stats.rewritten,
                stats.excluded,
                stats.resources,
                stats.generated,
                output.display()
            );
        }
        Command::Info { input, exclude } => {
            let session = Session::new(&exclude);
            let entries = jrelax::archive::extract(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;

            for entry in entries {
                if !entry.name.ends_with(".class") {
                    continue;
                }
                let class = ClassFile::parse(&entry.data)
                    .with_context(|| format!("failed to parse {}", entry.name))?;
                let name = class
                    .name()
                    .with_context(|| format!("unresolvable class name in {}", entry.name))?;
                let disposition = if session.is_excluded(name) {
                    "excluded"
                } else {
                    "rewrite"
                };
                println!(
                    "{disposition:8} {name} (version {}.{}, {} fields, {} methods)",
                    class.major_version,
                    class.minor_version,
                    class.fields.len(),
                    class.methods.len()
                );
            }
        }
    }
    Ok(())
}
