//! Output formatting for synthesized pipelines
//!
//! JSON and YAML carry the full topology for machines; the human format is a
//! compact summary for terminals.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::topology::{DeploymentTarget, PipelineSpec, TargetResources};
use crate::validation::RuleOutcome;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "human" => Some(Self::Human),
            _ => None,
        }
    }
}

/// Validation outcome for one pipeline definition
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub pipeline: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleOutcome>,
}

/// Deployment targets one pipeline promotes into, in promotion order
#[derive(Debug, Clone, Serialize)]
pub struct TargetListing {
    pub pipeline: String,
    pub targets: Vec<DeploymentTarget>,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_pipeline(&self, spec: &PipelineSpec) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(spec)
                .context("Failed to serialize pipeline to JSON"),
            OutputFormat::Yaml => spec
                .to_yaml()
                .context("Failed to serialize pipeline to YAML"),
            OutputFormat::Human => Ok(spec.to_string()),
        }
    }

    /// A single pipeline renders as an object, several as a list
    pub fn format_pipelines(&self, specs: &[PipelineSpec]) -> Result<String> {
        if let [single] = specs {
            return self.format_pipeline(single);
        }
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(specs)
                .context("Failed to serialize pipelines to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(specs).context("Failed to serialize pipelines to YAML")
            }
            OutputFormat::Human => {
                let rendered: Vec<String> = specs.iter().map(|s| s.to_string()).collect();
                Ok(rendered.join("\n"))
            }
        }
    }

    pub fn format_reports(&self, reports: &[PipelineReport]) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(reports)
                .context("Failed to serialize validation report to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(reports)
                .context("Failed to serialize validation report to YAML"),
            OutputFormat::Human => Ok(self.format_reports_human(reports)),
        }
    }

    pub fn format_targets(&self, listings: &[TargetListing]) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(listings)
                .context("Failed to serialize targets to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(listings).context("Failed to serialize targets to YAML")
            }
            OutputFormat::Human => Ok(self.format_targets_human(listings)),
        }
    }

    fn format_reports_human(&self, reports: &[PipelineReport]) -> String {
        let mut output = String::new();
        output.push_str("Pipeline Validation\n");
        output.push_str(RULE);
        output.push_str("\n\n");

        for report in reports {
            let symbol = if report.valid { "\u{2713}" } else { "\u{2717}" };
            output.push_str(&format!("{} {}\n", symbol, report.pipeline));
            if let Some(ref fingerprint) = report.fingerprint {
                let short = &fingerprint[..fingerprint.len().min(12)];
                output.push_str(&format!("  Fingerprint: {}\n", short));
            }
            if let Some(ref error) = report.error {
                output.push_str(&format!("  Error: {}\n", error));
            }
            for outcome in report.rules.iter().filter(|o| !o.passed) {
                output.push_str(&format!(
                    "  [{}] {}\n",
                    outcome.rule,
                    outcome.error.as_deref().unwrap_or("failed")
                ));
            }
        }

        let failed = reports.iter().filter(|r| !r.valid).count();
        output.push_str(&format!(
            "\n{} pipeline(s) checked, {} failed\n",
            reports.len(),
            failed
        ));
        output
    }

    fn format_targets_human(&self, listings: &[TargetListing]) -> String {
        let mut output = String::new();
        for listing in listings {
            output.push_str(&format!("{}\n", listing.pipeline));
            for (i, target) in listing.targets.iter().enumerate() {
                let connector = if i + 1 == listing.targets.len() {
                    "\u{2514}\u{2500}"
                } else {
                    "\u{251C}\u{2500}"
                };
                match &target.resources {
                    TargetResources::Container {
                        application,
                        deployment_group,
                        deployment_config,
                    } => output.push_str(&format!(
                        "{} {:<8} {} / {} ({})\n",
                        connector, target.label, application, deployment_group, deployment_config
                    )),
                    TargetResources::Stack {
                        stack_name,
                        template_file,
                    } => output.push_str(&format!(
                        "{} {:<8} {} ({})\n",
                        connector, target.label, stack_name, template_file
                    )),
                }
            }
        }
        output
    }
}
