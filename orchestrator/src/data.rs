//! Dataset loading and partitioning among simulated clients.

use std::fs;

use machine_learning::dataset::Dataset;
use rand::Rng;

use crate::{
    OrchestratorError,
    configs::{DataConfig, DatasetConfig},
};

/// Reads the whole dataset described by `config`.
///
/// # Returns
/// A dataset error if the file can't be read or a row has the wrong amount of values.
pub fn load(config: &DataConfig) -> Result<Dataset, OrchestratorError> {
    let row_size = config.x_size + config.y_size;

    let data = match &config.dataset {
        DatasetConfig::Inline { data } => data.clone(),
        DatasetConfig::Csv { path, has_header } => {
            let text = fs::read_to_string(path).map_err(|e| {
                OrchestratorError::Dataset(format!("couldn't read {}: {e}", path.display()))
            })?;
            parse_csv(&text, *has_header, row_size)?
        }
    };

    Dataset::from_flat(&data, config.x_size, config.y_size)
        .map_err(|e| OrchestratorError::Dataset(e.to_string()))
}

fn parse_csv(text: &str, has_header: bool, row_size: usize) -> Result<Vec<f32>, OrchestratorError> {
    let mut data = Vec::new();
    let lines = text
        .lines()
        .enumerate()
        .skip(usize::from(has_header))
        .filter(|(_, line)| !line.trim().is_empty());

    for (i, line) in lines {
        let start = data.len();

        for field in line.split(',') {
            let value = field.trim().parse::<f32>().map_err(|e| {
                OrchestratorError::Dataset(format!("line {}: '{}' {e}", i + 1, field.trim()))
            })?;
            data.push(value);
        }

        let got = data.len() - start;
        if got != row_size {
            return Err(OrchestratorError::Dataset(format!(
                "line {}: expected {row_size} values, got {got}",
                i + 1
            )));
        }
    }

    Ok(data)
}

/// Shuffles `dataset` and sets `fraction` of its samples aside.
///
/// # Returns
/// The remaining samples and the held out ones, if any.
pub fn holdout<R: Rng>(
    mut dataset: Dataset,
    fraction: f64,
    rng: &mut R,
) -> Result<(Dataset, Option<Dataset>), OrchestratorError> {
    dataset.shuffle(rng);

    let n = dataset.len();
    let held = (fraction * n as f64).floor() as usize;
    if held == 0 {
        return Ok((dataset, None));
    }

    let rows: Vec<usize> = (0..n).collect();
    let (held_rows, train_rows) = rows.split_at(held);
    let select = |rows: &[usize]| {
        dataset
            .select(rows)
            .map_err(|e| OrchestratorError::Dataset(e.to_string()))
    };

    Ok((select(train_rows)?, Some(select(held_rows)?)))
}

/// Splits `dataset` into `shards` contiguous parts whose sizes differ by at most one.
///
/// # Returns
/// A dataset error if there are fewer samples than shards.
pub fn partition(dataset: &Dataset, shards: usize) -> Result<Vec<Dataset>, OrchestratorError> {
    let n = dataset.len();
    if shards == 0 || shards > n {
        return Err(OrchestratorError::Dataset(format!(
            "can't split {n} samples among {shards} clients"
        )));
    }

    (0..shards)
        .map(|i| {
            let rows: Vec<usize> = (i * n / shards..(i + 1) * n / shards).collect();
            dataset
                .select(&rows)
                .map_err(|e| OrchestratorError::Dataset(e.to_string()))
        })
        .collect()
}
