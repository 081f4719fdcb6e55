//! Command handlers
//!
//! Each handler returns the process exit code. Failures are logged and turned
//! into a non-zero code; nothing partial is written on error.

use crate::cli::commands::{OutputFormatArg, SynthArgs, TargetsArgs, ValidateArgs};
use crate::cli::output::{OutputFormat, OutputFormatter, PipelineReport, TargetListing};
use crate::config::{AppConfig, PipelinesFile};
use crate::topology::{PipelineBuilder, PipelineSettings, PipelineSpec};
use crate::validation::Validator;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

fn definitions_path(arg: &Option<PathBuf>, config: &AppConfig) -> PathBuf {
    arg.clone().unwrap_or_else(|| config.config_path.clone())
}

fn output_format(arg: Option<OutputFormatArg>, config: &AppConfig) -> OutputFormat {
    arg.map(OutputFormat::from)
        .or_else(|| OutputFormat::parse(&config.output_format))
        .unwrap_or(OutputFormat::Human)
}

/// Loads definitions and resolves either one named pipeline or all of them
fn load_settings(path: &Path, pipeline: Option<&str>) -> Option<Vec<PipelineSettings>> {
    debug!("Definitions file: {}", path.display());

    let file = match PipelinesFile::load(path) {
        Ok(file) => file,
        Err(e) => {
            error!("{}", e);
            return None;
        }
    };

    let resolved = match pipeline {
        Some(name) => file.resolve(name).map(|settings| vec![settings]),
        None => file.resolve_all(),
    };
    match resolved {
        Ok(settings) if settings.is_empty() => {
            error!("No pipelines defined in {}", path.display());
            None
        }
        Ok(settings) => Some(settings),
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

/// Splits a fingerprint result into the report's fingerprint and error fields
fn fingerprint_outcome(
    pipeline: &str,
    result: Result<String, serde_json::Error>,
) -> (Option<String>, Option<String>) {
    match result {
        Ok(digest) => (Some(digest), None),
        Err(e) => {
            warn!("Failed to fingerprint pipeline '{}': {}", pipeline, e);
            (None, Some(format!("Failed to fingerprint pipeline: {}", e)))
        }
    }
}

pub fn handle_synth(args: &SynthArgs, config: &AppConfig, quiet: bool) -> i32 {
    let path = definitions_path(&args.config, config);
    let Some(all_settings) = load_settings(&path, args.pipeline.as_deref()) else {
        return 1;
    };

    let mut specs: Vec<PipelineSpec> = Vec::with_capacity(all_settings.len());
    for settings in all_settings {
        let name = settings.name.clone();
        match PipelineBuilder::new(settings).build() {
            Ok(spec) => specs.push(spec),
            Err(e) => {
                error!("Pipeline '{}' failed to assemble: {}", name, e);
                return 1;
            }
        }
    }
    info!("Assembled {} pipeline(s)", specs.len());

    let formatter = OutputFormatter::new(output_format(args.format, config));
    let output = match formatter.format_pipelines(&specs) {
        Ok(out) => out,
        Err(e) => {
            error!("Failed to format output: {}", e);
            return 1;
        }
    };

    if let Some(output_file) = &args.output {
        match std::fs::write(output_file, &output) {
            Ok(_) => {
                info!("Output written to: {}", output_file.display());
                if !quiet {
                    println!("Output written to: {}", output_file.display());
                }
            }
            Err(e) => {
                error!("Failed to write output to file: {}", e);
                return 1;
            }
        }
    } else {
        println!("{}", output);
    }

    0
}

pub fn handle_validate(args: &ValidateArgs, config: &AppConfig) -> i32 {
    let path = definitions_path(&args.config, config);
    let Some(all_settings) = load_settings(&path, None) else {
        return 1;
    };

    let validator = Validator::default();
    let reports: Vec<PipelineReport> = all_settings
        .into_iter()
        .map(|settings| {
            let pipeline = settings.name.clone();
            match PipelineBuilder::new(settings).build() {
                Ok(spec) => {
                    let (fingerprint, error) = fingerprint_outcome(&pipeline, spec.fingerprint());
                    PipelineReport {
                        pipeline,
                        valid: true,
                        fingerprint,
                        error,
                        rules: validator.report(&spec),
                    }
                }
                Err(e) => PipelineReport {
                    pipeline,
                    valid: false,
                    fingerprint: None,
                    error: Some(e.to_string()),
                    rules: Vec::new(),
                },
            }
        })
        .collect();

    let formatter = OutputFormatter::new(output_format(args.format, config));
    match formatter.format_reports(&reports) {
        Ok(out) => println!("{}", out),
        Err(e) => {
            error!("Failed to format output: {}", e);
            return 1;
        }
    }

    let failed = reports.iter().filter(|r| !r.valid).count();
    if failed > 0 {
        error!("{} of {} pipeline(s) failed validation", failed, reports.len());
        return 1;
    }
    0
}

pub fn handle_targets(args: &TargetsArgs, config: &AppConfig) -> i32 {
    let path = definitions_path(&args.config, config);
    let Some(all_settings) = load_settings(&path, args.pipeline.as_deref()) else {
        return 1;
    };

    let mut listings = Vec::with_capacity(all_settings.len());
    for settings in all_settings {
        let pipeline = settings.name.clone();
        match PipelineBuilder::new(settings).targets() {
            Ok(targets) => listings.push(TargetListing { pipeline, targets }),
            Err(e) => {
                error!("Pipeline '{}' has no valid targets: {}", pipeline, e);
                return 1;
            }
        }
    }

    let formatter = OutputFormatter::new(output_format(args.format, config));
    match formatter.format_targets(&listings) {
        Ok(out) => {
            println!("{}", out);
            0
        }
        Err(e) => {
            error!("Failed to format output: {}", e);
            1
        }
    }
}
