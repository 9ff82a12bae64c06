//! typeprobe CLI

use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use typeprobe::interp::{Declarations, Interpreter};
use typeprobe::{Harvester, Layout, ProbeConfig};

#[derive(Parser)]
#[command(name = "typeprobe", version, about = "Builtin catalog and operator prober")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest the runtime and write the knowledge base as JSON
    Dump {
        /// Output file
        output: PathBuf,
        /// Probe configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Local namespace declarations (TOML)
        #[arg(long)]
        declare: Option<PathBuf>,
        /// Shape of the `funcs` section
        #[arg(long, value_enum)]
        layout: Option<Layout>,
        /// Per-probe time limit in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Leave the builtin namespace out
        #[arg(long)]
        no_builtins: bool,
        /// Write single-line JSON
        #[arg(long)]
        compact: bool,
    },
    /// List the type catalog (debug)
    Types {
        /// Local namespace declarations (TOML)
        #[arg(long)]
        declare: Option<PathBuf>,
    },
    /// Parse a textual signature and dump its shape (debug)
    Sig {
        /// Signature text, e.g. "($self, /, sep=None)"
        text: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Dump {
            output,
            config,
            declare,
            layout,
            timeout_ms,
            no_builtins,
            compact,
        } => {
            let options = DumpOptions {
                layout,
                timeout_ms,
                no_builtins,
                compact,
            };
            dump(&output, config.as_deref(), declare.as_deref(), options)
        }
        Command::Types { declare } => list_types(declare.as_deref()),
        Command::Sig { text } => show_signature(&text),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::{EnvFilter, fmt};

    let directive = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let subscriber = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

struct DumpOptions {
    layout: Option<Layout>,
    timeout_ms: Option<u64>,
    no_builtins: bool,
    compact: bool,
}

fn load_runtime(declare: Option<&Path>) -> Result<Interpreter, Box<dyn std::error::Error>> {
    let runtime = match declare {
        Some(path) => Interpreter::with_declarations(&Declarations::load(path)?)?,
        None => Interpreter::new(),
    };
    Ok(runtime)
}

fn dump(
    output: &Path,
    config: Option<&Path>,
    declare: Option<&Path>,
    options: DumpOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config {
        Some(path) => ProbeConfig::load(path)?,
        None => ProbeConfig::default(),
    };
    if let Some(layout) = options.layout {
        config.layout = layout;
    }
    if let Some(ms) = options.timeout_ms {
        config.probe_timeout_ms = ms;
    }
    if options.no_builtins {
        config.include_builtins = false;
    }
    if options.compact {
        config.pretty = false;
    }

    let runtime = Arc::new(load_runtime(declare)?);
    let kb = Harvester::new(runtime, config.clone()).run()?;
    kb.write_to(output, config.pretty)?;

    println!(
        "✓ {} types, {} callables, {} operators written to {}",
        kb.types.len(),
        kb.signatures().count(),
        kb.ops.len() + kb.uops.len(),
        output.display()
    );
    Ok(())
}

fn list_types(declare: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Arc::new(load_runtime(declare)?);
    let catalog = Harvester::new(runtime, ProbeConfig::default()).catalog();
    for (index, name) in catalog.names().iter().enumerate() {
        println!("{index:>4}  {name}");
    }
    Ok(())
}

fn show_signature(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    match typeprobe::extract::parse_text_signature(text) {
        Some(shape) => {
            println!("{shape:#?}");
            println!("arity: {}", shape.arity());
            Ok(())
        }
        None => Err(format!("not a signature: {text}").into()),
    }
}
