use cdpipe::cli::commands::{CliArgs, Commands};
use cdpipe::cli::handlers::{handle_synth, handle_targets, handle_validate};
use cdpipe::config::AppConfig;
use cdpipe::util::logging::{init_logging, parse_level, LoggingConfig};
use cdpipe::VERSION;

use clap::Parser;
use tracing::{debug, error, Level};

fn main() {
    let args = CliArgs::parse();
    let config = AppConfig::default();
    init_logging(logging_from_args(&args, &config));

    debug!("cdpipe v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        eprintln!("\nPlease check your CDPIPE_* environment variables.");
        std::process::exit(1);
    }
    debug!("{}", config);

    let exit_code = match &args.command {
        Commands::Synth(synth_args) => handle_synth(synth_args, &config, args.quiet),
        Commands::Validate(validate_args) => handle_validate(validate_args, &config),
        Commands::Targets(targets_args) => handle_targets(targets_args, &config),
    };

    std::process::exit(exit_code);
}

fn logging_from_args(args: &CliArgs, config: &AppConfig) -> LoggingConfig {
    let mut logging = LoggingConfig::from_app_config(config);
    if let Some(level_str) = &args.log_level {
        logging.level = parse_level(level_str).unwrap_or_else(|| {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        });
    } else if args.verbose {
        logging.level = Level::DEBUG;
    } else if args.quiet {
        logging.level = Level::ERROR;
    }
    logging
}
