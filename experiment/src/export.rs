use std::{fs, path::Path};

use machine_learning::evaluation::Aggregate;
use ndarray::ArrayView2;
use serde::Serialize;

use crate::error::{ExperimentErr, Result};

/// Writes one spectrum per row, preceded by its identifier.
///
/// # Arguments
/// * `path` - The destination file, its directory is created if needed.
/// * `columns` - The header of every spectral column.
/// * `ids` - The identifier of every row of `values`.
/// * `values` - The spectra, one per row.
pub fn write_profiles(
    path: &Path,
    columns: &[String],
    ids: &[String],
    values: ArrayView2<f32>,
) -> Result<()> {
    if values.ncols() != columns.len() || values.nrows() != ids.len() {
        return Err(ExperimentErr::Config(format!(
            "can't write a {:?} table with {} columns and {} identifiers",
            values.dim(),
            columns.len(),
            ids.len()
        )));
    }

    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;

    let header = std::iter::once("id").chain(columns.iter().map(String::as_str));
    writer.write_record(header)?;

    for (id, row) in ids.iter().zip(values.rows()) {
        let record = std::iter::once(id.clone()).chain(row.iter().map(f32::to_string));
        writer.write_record(record)?;
    }

    writer.flush()?;
    Ok(())
}

/// One line of the summary table: the aggregated metrics of an `(arch, hyper)` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub arch: usize,
    pub hyper: usize,
    pub hidden: String,
    pub height: f32,
    pub bandwidth: String,
    pub runs: usize,
    pub rmse_mean: f32,
    pub rmse_std: f32,
    pub r2_mean: f32,
    pub r2_std: f32,
    pub mae_mean: f32,
    pub mae_std: f32,
    pub derivative_rmse_mean: f32,
    pub derivative_rmse_std: f32,
}

impl SummaryRow {
    pub fn new(
        (arch, hyper): (usize, usize),
        hidden: &[usize],
        height: f32,
        bandwidth: String,
        runs: usize,
        aggregate: &Aggregate,
    ) -> Self {
        let Aggregate { mean, std } = aggregate;
        let hidden = hidden
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join("-");

        Self {
            arch,
            hyper,
            hidden,
            height,
            bandwidth,
            runs,
            rmse_mean: mean.rmse,
            rmse_std: std.rmse,
            r2_mean: mean.r2,
            r2_std: std.r2,
            mae_mean: mean.mae,
            mae_std: std.mae,
            derivative_rmse_mean: mean.derivative_rmse,
            derivative_rmse_std: std.derivative_rmse,
        }
    }
}

pub fn write_summary(path: &Path, rows: &[SummaryRow]) -> Result<()> {
    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;

    for row in rows {
        writer.serialize(row)?;
    }

    writer.flush()?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use machine_learning::evaluation::SampleMetrics;
    use ndarray::array;

    use super::*;

    #[test]
    fn profiles_start_with_the_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("exp_profiles_toy.csv");

        let columns = vec!["400".to_string(), "410".to_string()];
        let ids = vec!["CCO".to_string(), "CCN".to_string()];
        write_profiles(&path, &columns, &ids, array![[0.5f32, 1.], [2., 0.25]].view()).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "id,400,410\nCCO,0.5,1\nCCN,2,0.25\n");
    }

    #[test]
    fn mismatched_profiles_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.csv");

        let err = write_profiles(&path, &["a".to_string()], &[], array![[1f32, 2.]].view());
        assert!(err.is_err());
    }

    #[test]
    fn summary_has_a_header_and_one_row_per_pair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics_toy.csv");

        let aggregate = Aggregate {
            mean: SampleMetrics {
                rmse: 0.5,
                ..Default::default()
            },
            std: SampleMetrics::default(),
        };
        let row = SummaryRow::new((1, 2), &[8, 4], 1., "0.01".into(), 3, &aggregate);
        write_summary(&path, &[row]).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("arch,hyper,hidden,height,bandwidth,runs,rmse_mean"));
        assert!(lines.next().unwrap().starts_with("1,2,8-4,1.0,0.01,3,0.5,"));
        assert!(lines.next().is_none());
    }
}
