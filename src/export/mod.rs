//! CSV export of run artifacts
//!
//! - `oof_<tag>.csv`: index, y, y_pred
//! - `roc_<tag>.csv`: fpr, tpr, threshold
//! - `importance_<tag>_<fold>.csv`: feature, importance (descending)

use crate::error::{Result, TrainerError};
use crate::metrics::RocCurve;
use crate::training::OofTable;
use ndarray::Array1;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)?;
    debug!(path = %path.display(), rows = df.height(), "CSV written");
    Ok(())
}

/// Write the completed out-of-fold table
pub fn write_oof(dir: &Path, tag: &str, table: &OofTable) -> Result<PathBuf> {
    let predictions = table.predictions()?;
    let index: Vec<u64> = (0..table.len() as u64).collect();

    let mut df = df!(
        "index" => index,
        "y" => table.labels().to_vec(),
        "y_pred" => predictions.to_vec()
    )?;

    let path = dir.join(format!("oof_{}.csv", tag));
    save_csv(&mut df, &path)?;
    Ok(path)
}

/// Write ROC curve points
pub fn write_roc(dir: &Path, tag: &str, curve: &RocCurve) -> Result<PathBuf> {
    let mut df = df!(
        "fpr" => curve.fpr.clone(),
        "tpr" => curve.tpr.clone(),
        "threshold" => curve.thresholds.clone()
    )?;

    let path = dir.join(format!("roc_{}.csv", tag));
    save_csv(&mut df, &path)?;
    Ok(path)
}

/// Write one fold's feature importances, most important first
pub fn write_importances(
    dir: &Path,
    tag: &str,
    fold: usize,
    feature_names: &[String],
    importances: &Array1<f64>,
) -> Result<PathBuf> {
    if feature_names.len() != importances.len() {
        return Err(TrainerError::ShapeError {
            expected: format!("{} importances", feature_names.len()),
            actual: format!("{} importances", importances.len()),
        });
    }

    let mut ranked: Vec<(&String, f64)> = feature_names.iter().zip(importances.iter().copied()).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut df = df!(
        "feature" => ranked.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
        "importance" => ranked.iter().map(|(_, v)| *v).collect::<Vec<f64>>()
    )?;

    let path = dir.join(format!("importance_{}_{}.csv", tag, fold));
    save_csv(&mut df, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::roc_curve;
    use ndarray::array;

    #[test]
    fn test_write_oof() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = OofTable::new(array![0.0, 1.0, 1.0]);
        table.write(&[0, 1, 2], &array![0.2, 0.7, 0.9]).unwrap();

        let path = write_oof(dir.path(), "knn", &table).unwrap();
        assert_eq!(path.file_name().unwrap(), "oof_knn.csv");

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("index,y,y_pred"));
        assert_eq!(content.lines().count(), 4);
    }

    #[test]
    fn test_incomplete_oof_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let table = OofTable::new(array![0.0, 1.0]);
        assert!(write_oof(dir.path(), "fnn", &table).is_err());
        assert!(!dir.path().join("oof_fnn.csv").exists());
    }

    #[test]
    fn test_write_importances_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let path = write_importances(dir.path(), "xgb", 2, &names, &array![0.1, 0.6, 0.3]).unwrap();
        assert_eq!(path.file_name().unwrap(), "importance_xgb_2.csv");

        let content = fs::read_to_string(&path).unwrap();
        let features: Vec<&str> = content
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap())
            .collect();
        assert_eq!(features, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_write_roc() {
        let dir = tempfile::tempdir().unwrap();
        let curve = roc_curve(&array![0.0, 1.0, 0.0, 1.0], &array![0.1, 0.8, 0.4, 0.6]).unwrap();
        let path = write_roc(dir.path(), "pnn", &curve).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("fpr,tpr,threshold"));
        assert_eq!(content.lines().count(), curve.fpr.len() + 1);
    }
}
