use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

pub mod error;
pub mod generate;
pub mod hooks;
pub mod layout;
pub mod lower;
pub mod resolve;
pub mod types;
pub mod utils;

use error::GenerateError;
use generate::{GenerateConfig, GenerateSummary, Generator, DEFAULT_SOURCE_NAME};
use layout::CollisionPolicy;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Generates packed C struct layouts and native hook stubs from .NET assemblies"
)]
pub struct Args {
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the struct header and hook source for every assembly in a directory
    Generate(GenerateArgs),
}

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// Directory of assemblies, or a single DLL
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
    /// Directory receiving the generated files
    #[arg(value_name = "OUTPUT_DIR")]
    pub output: PathBuf,
    /// Name of the hook source file; the header name is derived from it
    #[arg(long, value_name = "FILE", default_value = DEFAULT_SOURCE_NAME)]
    pub source_name: String,
    /// Leave struct definitions out of the header
    #[arg(long)]
    pub no_structs: bool,
    /// Do not write hook bodies (also disables installation)
    #[arg(long)]
    pub no_hooks: bool,
    /// Do not write the installation routine
    #[arg(long)]
    pub no_install: bool,
    /// Only write the header
    #[arg(long)]
    pub only_header: bool,
    /// Keep distinct types that sanitize to the same name apart instead of reusing one record
    #[arg(long)]
    pub strict_names: bool,
    /// Additional namespace treated as platform code and never expanded
    #[arg(long = "exclude-namespace", value_name = "NS")]
    pub exclude_namespaces: Vec<String>,
    /// Also write lowered method bodies to this file
    #[arg(long, value_name = "FILE")]
    pub lowered: Option<String>,
}

impl GenerateArgs {
    pub fn config(&self) -> GenerateConfig {
        let mut config = GenerateConfig::new(&self.source_name);
        config.set_dump_structs(!self.no_structs);
        if self.no_install {
            config.set_dump_hook_installation(false);
        }
        if self.no_hooks {
            config.set_dump_hook_creation(false);
        }
        if self.only_header {
            config.set_only_make_header(true);
        }
        config.lowered_name = self.lowered.clone();
        if self.strict_names {
            config.layout.collision = CollisionPolicy::Strict;
        }
        config
            .layout
            .excluded_namespaces
            .extend(self.exclude_namespaces.iter().cloned());
        config
    }
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn generate(args: &GenerateArgs) -> Result<GenerateSummary, GenerateError> {
    let assemblies = resolve::AssemblySet::load(&args.input)?;
    let assemblies: &'static resolve::AssemblySet = Box::leak(Box::new(assemblies));
    let metadata = assemblies.build_metadata();

    let mut generator = Generator::new(&metadata, args.config());
    generator.write_to_dir(&args.output)
}

/// Runs one parsed command; failures are reported once, through the log.
pub fn run(args: &Args) -> ExitCode {
    let result = match &args.command {
        Command::Generate(g) => generate(g),
    };
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

pub fn run_cli() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    run(&args)
}
