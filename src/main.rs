use std::{env, fs, path::Path};

use anyhow::{Context, Result, bail};
use log::{info, warn};
use mlp_trainer::{
    TrainingSession,
    config::TrainConfig,
    dataset::{self, Letter},
    report,
};

const BUILD_DIR: &str = "build";

fn main() -> Result<()> {
    env_logger::init();

    let run = env::var("RUN").unwrap_or_default();
    if run.is_empty() {
        info!("RUN is not set, nothing to do");
        return Ok(());
    }
    let folder = env::var("FOLDER").ok().filter(|f| !f.is_empty());

    match run.as_str() {
        "TRAIN" => train_all(folder.as_deref()),
        other => bail!("unsupported RUN mode {other:?}"),
    }
}

/// Trains every dataset folder under `build/`, or just the one `FOLDER`
/// names.
fn train_all(folder: Option<&str>) -> Result<()> {
    for entry in fs::read_dir(BUILD_DIR).with_context(|| format!("reading {BUILD_DIR}/"))? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if folder.is_some_and(|f| f != name) {
            continue;
        }
        train_dataset(&path).with_context(|| format!("training dataset {name:?}"))?;
    }
    Ok(())
}

/// Runs one training session per feature file in a dataset folder.
fn train_dataset(dir: &Path) -> Result<()> {
    let train_dir = dir.join("train");
    let config_path = train_dir.join("config.txt");
    let config = TrainConfig::load(&config_path, &mut rand::rng())
        .with_context(|| format!("loading {}", config_path.display()))?;
    info!(
        "config: hidden={} outputs={} iter_max={} legacy_step={}",
        config.hidden_units, config.output_units, config.iter_max, config.initial_step
    );

    let samples_dir = train_dir.join("hog_train");
    for entry in
        fs::read_dir(&samples_dir).with_context(|| format!("reading {}", samples_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let file = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let Some(letter) = Letter::from_file_name(&file) else {
            warn!("{file}: no letter class in file name, skipping");
            continue;
        };

        let x = dataset::load_sample(&path, config.feature_len)?;
        let d = config.target_row(letter);
        let mut session = TrainingSession::new(
            x,
            d,
            config.hidden_units,
            config.iter_max,
            Some(config.initial_weights.clone()),
            rand::rng(),
        )?;
        let outcome = session.run()?;
        report::log_run(
            &file,
            letter,
            config.target(letter),
            &outcome,
            session.final_error(),
        );
    }
    Ok(())
}
