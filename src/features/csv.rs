//! CSV feature provider backed by polars

use super::{prepare, Dataset, FeatureOptions, FeatureProvider};
use crate::error::{Result, TrainerError};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

/// Loads engineered features from a CSV file with a header row.
///
/// String columns become sparse fields, label encoded in order of first
/// appearance; numeric and boolean columns become dense fields with nulls
/// read as 0.
#[derive(Debug, Clone)]
pub struct CsvFeatureProvider {
    path: PathBuf,
    target: String,
    group_column: Option<String>,
    drop_columns: Vec<String>,
}

impl CsvFeatureProvider {
    pub fn new(path: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            target: target.into(),
            group_column: None,
            drop_columns: Vec::new(),
        }
    }

    /// Column holding group ids for the grouped AUC; it is not used as a feature
    pub fn with_group_column(mut self, column: impl Into<String>) -> Self {
        self.group_column = Some(column.into());
        self
    }

    /// Columns excluded from the feature set (ids, timestamps, ...)
    pub fn with_drop_columns(mut self, columns: Vec<String>) -> Self {
        self.drop_columns = columns;
        self
    }

    fn read_frame(&self) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(1000))
            .try_into_reader_with_file_path(Some(self.path.clone()))?
            .finish()?;
        Ok(df)
    }
}

impl FeatureProvider for CsvFeatureProvider {
    fn load(&self, options: &FeatureOptions) -> Result<Dataset> {
        let df = self.read_frame()?;
        info!(
            path = %self.path.display(),
            rows = df.height(),
            columns = df.width(),
            "Loaded feature file"
        );

        let dataset = dataset_from_frame(
            &df,
            &self.target,
            self.group_column.as_deref(),
            &self.drop_columns,
        )?;
        prepare(dataset, options)
    }
}

/// Convert a frame into a dataset; every column other than the target, the
/// group column and `drop_columns` becomes a feature
pub fn dataset_from_frame(
    df: &DataFrame,
    target: &str,
    group_column: Option<&str>,
    drop_columns: &[String],
) -> Result<Dataset> {
    let y = target_values(df, target)?;

    let feature_cols: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .filter(|name| {
            name != target
                && Some(name.as_str()) != group_column
                && !drop_columns.contains(name)
        })
        .collect();

    if feature_cols.is_empty() {
        return Err(TrainerError::DataError("No feature columns".to_string()));
    }

    let mut sparse = Vec::new();
    let col_data: Vec<Vec<f64>> = feature_cols
        .iter()
        .map(|name| {
            let series = column(df, name)?;
            let (values, is_sparse) = encode_series(series)?;
            if is_sparse {
                sparse.push(name.clone());
            }
            Ok(values)
        })
        .collect::<Result<Vec<_>>>()?;

    let n_rows = df.height();
    let x = Array2::from_shape_fn((n_rows, feature_cols.len()), |(r, c)| col_data[c][r]);

    let mut dataset = Dataset::new(x, y, feature_cols)?.with_sparse_fields(sparse);

    if let Some(group) = group_column {
        let groups = group_values(df, group)?;
        dataset = dataset.with_groups(groups)?;
    }

    Ok(dataset)
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    Ok(df
        .column(name)
        .map_err(|_| TrainerError::FeatureNotFound(name.to_string()))?
        .as_materialized_series())
}

fn target_values(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    let series = column(df, target)?.cast(&DataType::Float64)?;
    let values = series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| TrainerError::DataError(format!("Missing label at row {}", row)))
        })
        .collect::<Result<Array1<f64>>>()?;
    Ok(values)
}

/// Numeric values, or label codes for string columns; the flag marks the latter
fn encode_series(series: &Series) -> Result<(Vec<f64>, bool)> {
    match series.dtype() {
        DataType::String => {
            let codes = label_encode(series.str()?.into_iter());
            Ok((codes.into_iter().map(|c| c as f64).collect(), true))
        }
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 |
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 |
        DataType::Float32 | DataType::Float64 | DataType::Boolean => {
            let values = series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect();
            Ok((values, false))
        }
        other => Err(TrainerError::DataError(format!(
            "Unsupported type {} for column {}",
            other,
            series.name()
        ))),
    }
}

/// Codes in order of first appearance; a missing value is its own category
fn label_encode<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<usize> {
    let mut codes: HashMap<Option<&'a str>, usize> = HashMap::new();
    values
        .map(|v| {
            let next = codes.len();
            *codes.entry(v).or_insert(next)
        })
        .collect()
}

fn group_values(df: &DataFrame, name: &str) -> Result<Array1<i64>> {
    let series = column(df, name)?;
    if series.dtype() == &DataType::String {
        let codes = label_encode(series.str()?.into_iter());
        return Ok(codes.into_iter().map(|c| c as i64).collect());
    }

    let ids = series.cast(&DataType::Int64)?;
    let values = ids
        .i64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| TrainerError::DataError(format!("Missing group id at row {}", row)))
        })
        .collect::<Result<Array1<i64>>>()?;
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn frame() -> DataFrame {
        df!(
            "id" => &[10i64, 11, 12, 13],
            "price" => &[Some(1.5), None, Some(3.0), Some(4.0)],
            "shop" => &["a", "b", "a", "c"],
            "coupon" => &[7i64, 7, 8, 8],
            "label" => &[0i64, 1, 0, 1]
        )
        .unwrap()
    }

    #[test]
    fn test_frame_conversion() {
        let ds = dataset_from_frame(&frame(), "label", Some("coupon"), &["id".to_string()]).unwrap();
        assert_eq!(ds.feature_names, vec!["price", "shop"]);
        assert_eq!(ds.sparse_fields, vec!["shop"]);
        assert_eq!(ds.dense_fields, vec!["price"]);
        assert_eq!(ds.x.column(0).to_vec(), vec![1.5, 0.0, 3.0, 4.0]);
        assert_eq!(ds.x.column(1).to_vec(), vec![0.0, 1.0, 0.0, 2.0]);
        assert_eq!(ds.y.to_vec(), vec![0.0, 1.0, 0.0, 1.0]);
        assert_eq!(ds.groups.unwrap().to_vec(), vec![7, 7, 8, 8]);
    }

    #[test]
    fn test_missing_target() {
        let err = dataset_from_frame(&frame(), "clicked", None, &[]).unwrap_err();
        assert!(matches!(err, TrainerError::FeatureNotFound(_)));
    }

    #[test]
    fn test_label_encode_first_seen() {
        let codes = label_encode(vec![Some("x"), None, Some("y"), Some("x"), None].into_iter());
        assert_eq!(codes, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_csv_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "a,b,flag,target").unwrap();
        writeln!(file, "1.0,2.0,x,0").unwrap();
        writeln!(file, "2.0,2.0,y,1").unwrap();
        writeln!(file, "3.0,2.0,x,0").unwrap();
        writeln!(file, "4.0,2.0,y,1").unwrap();
        drop(file);

        let provider = CsvFeatureProvider::new(&path, "target");
        let ds = provider
            .load(&FeatureOptions::new().with_variance(true))
            .unwrap();
        // b is constant
        assert_eq!(ds.feature_names, vec!["a", "flag"]);
        assert_eq!(ds.n_samples(), 4);
    }
}
