//! Subcommand handlers.

use crate::{Commands, ConfigAction};
use anyhow::{Context, bail};
use lungprep_core::{AppConfig, load_config};
use lungprep_data::{
    DriftOptions, IngestionResult, ManifestTable, Pipeline, detect_drift, save_drift_report,
};
use std::path::Path;

fn load(root: &Path, config_file: Option<&Path>) -> anyhow::Result<AppConfig> {
    load_config(root, config_file).map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
}

/// Load the config and refuse to start a run with known problems.
fn load_runnable(root: &Path, config_file: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = load(root, config_file)?;
    let problems = config.validate();
    if !problems.is_empty() {
        bail!("Invalid configuration:\n  {}", problems.join("\n  "));
    }
    Ok(config)
}

pub(crate) async fn handle_command(
    command: Commands,
    root: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    tracing::debug!(command = ?command, root = %root.display(), "Dispatching command");
    match command {
        Commands::Run => {
            let pipeline = Pipeline::new(load_runnable(root, config_file)?, root);
            let run = pipeline.run().await?;
            println!("Pipeline run {}", pipeline.paths().timestamp);
            println!(
                "  rows: train {}, test {}, val {}",
                run.ingestion.row_counts.train,
                run.ingestion.row_counts.test,
                run.ingestion.row_counts.val
            );
            println!("  reports: {}", run.validation.reports_dir.display());
            println!(
                "  drift: {} ({})",
                if run.validation.dataset_drift {
                    "detected"
                } else {
                    "not detected"
                },
                run.validation.drift_report_html.display()
            );
            println!(
                "  augmented samples: {}",
                run.transformation.transformed_dirs.train.display()
            );
            Ok(())
        }
        Commands::Ingest => {
            let pipeline = Pipeline::new(load_runnable(root, config_file)?, root);
            pipeline.start_data_ingestion().await?;
            let path = pipeline
                .paths()
                .data_ingestion
                .local_ingested_csv_data_dir
                .join(lungprep_data::INGESTION_RESULT_FILE);
            println!("{}", path.display());
            Ok(())
        }
        Commands::Validate { ingestion_result } => {
            let ingestion = IngestionResult::load(&ingestion_result)?;
            let pipeline = Pipeline::new(load(root, config_file)?, root);
            let result = pipeline.start_data_validation(&ingestion).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Commands::Drift {
            reference,
            current,
            out,
        } => {
            let config = load(root, config_file)?;
            let reference = ManifestTable::read(&reference)?;
            let current = ManifestTable::read(&current)?;
            let options = DriftOptions {
                p_value_threshold: config.data_validation.drift_p_value_threshold,
                share_threshold: config.data_validation.drift_share_threshold,
                ..DriftOptions::default()
            };
            let report = detect_drift(&reference, &current, &options)?;
            let outcome = save_drift_report(&report, &out)?;
            tracing::info!(
                dataset_drift = outcome.dataset_drift,
                out = %out.display(),
                "Wrote drift report"
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Commands::Config { action } => {
            let config = load(root, config_file)?;
            match action {
                ConfigAction::Show => {
                    let rendered =
                        toml::to_string_pretty(&config).context("Failed to render config")?;
                    print!("{rendered}");
                    Ok(())
                }
                ConfigAction::Check => {
                    let problems = config.validate();
                    tracing::info!(problems = problems.len(), "Checked configuration");
                    if problems.is_empty() {
                        println!("Configuration OK");
                        Ok(())
                    } else {
                        for problem in &problems {
                            println!("- {problem}");
                        }
                        bail!("{} configuration problem(s)", problems.len())
                    }
                }
            }
        }
    }
}
