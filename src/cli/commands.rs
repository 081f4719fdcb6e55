use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Declarative delivery pipeline synthesizer
#[derive(Parser, Debug)]
#[command(
    name = "cdpipe",
    about = "Synthesize delivery pipeline topologies from definitions",
    version,
    long_about = "cdpipe reads pipeline definitions and assembles each one into a fixed \
                  Source, Build and per-environment deployment topology, either blue/green \
                  container deployments or staged change-set deployments."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Assemble pipelines and print their topology",
        long_about = "Assembles every pipeline in the definitions file (or just one) and prints \
                      the resulting stages, actions and artifacts.\n\n\
                      Examples:\n  \
                      cdpipe synth\n  \
                      cdpipe synth --pipeline trivia-backend --format json\n  \
                      cdpipe synth --config pipelines.toml -o topology.yaml -f yaml"
    )]
    Synth(SynthArgs),

    #[command(
        about = "Check that every pipeline assembles",
        long_about = "Assembles every pipeline and reports which ones fail, with the failing rule.\n\n\
                      Examples:\n  \
                      cdpipe validate\n  \
                      cdpipe validate --config pipelines.yaml --format json"
    )]
    Validate(ValidateArgs),

    #[command(
        about = "List deployment targets per pipeline",
        long_about = "Shows the pre-existing applications, deployment groups or stacks each \
                      pipeline promotes into, in promotion order.\n\n\
                      Examples:\n  \
                      cdpipe targets\n  \
                      cdpipe targets --pipeline trivia-backend"
    )]
    Targets(TargetsArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct SynthArgs {
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        help = "Pipeline definitions file (defaults to CDPIPE_CONFIG or pipelines.yaml)"
    )]
    pub config: Option<PathBuf>,

    #[arg(short = 'p', long, value_name = "NAME", help = "Only this pipeline")]
    pub pipeline: Option<String>,

    #[arg(short = 'f', long, value_enum, help = "Output format")]
    pub format: Option<OutputFormatArg>,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(short = 'c', long, value_name = "FILE", help = "Pipeline definitions file")]
    pub config: Option<PathBuf>,

    #[arg(short = 'f', long, value_enum, help = "Output format")]
    pub format: Option<OutputFormatArg>,
}

#[derive(Parser, Debug, Clone)]
pub struct TargetsArgs {
    #[arg(short = 'c', long, value_name = "FILE", help = "Pipeline definitions file")]
    pub config: Option<PathBuf>,

    #[arg(short = 'p', long, value_name = "NAME", help = "Only this pipeline")]
    pub pipeline: Option<String>,

    #[arg(short = 'f', long, value_enum, help = "Output format")]
    pub format: Option<OutputFormatArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
