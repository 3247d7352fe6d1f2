use std::path::Path;

use log::{info, warn};
use machine_learning::dataset::{Dataset, MinMax};
use ndarray::Array2;

use crate::{
    error::{ExperimentErr, Result},
    fingerprint::FingerprintEncoder,
};

/// The input table after encoding and normalization.
#[derive(Debug)]
pub struct LoadedData {
    /// Fingerprints and spectra, both scaled into `[0, 1]`, indexed by their source row.
    pub dataset: Dataset,
    /// The header of every spectral column, in table order.
    pub columns: Vec<String>,
    /// The scaler applied to the spectra, used to export predictions in the table's units.
    pub spectra_scaler: MinMax,
    /// The identifier of every kept row, in dataset order.
    ids: Vec<String>,
    /// The rows dropped because of an invalid structure or value.
    pub dropped: usize,
}

impl LoadedData {
    /// The identifier of the sample coming from `row` of the source table.
    pub fn identifier(&self, row: usize) -> Option<&str> {
        let pos = self.dataset.indices().binary_search(&row).ok()?;
        self.ids.get(pos).map(String::as_str)
    }
}

/// Reads the table at `path`: one identifier column holding the structure and one column per
/// spectral point.
///
/// Rows whose structure can't be encoded or whose values are missing or unparseable are
/// dropped and counted. Fingerprints and spectra are each scaled by their global minimum and
/// maximum.
///
/// # Errors
/// If the file can't be read, the identifier column is missing, there are no spectral columns
/// or every row is dropped.
pub fn load<E: FingerprintEncoder>(
    path: &Path,
    id_column: &str,
    encoder: &E,
) -> Result<LoadedData> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let id_idx = headers
        .iter()
        .position(|h| h == id_column)
        .ok_or_else(|| ExperimentErr::Config(format!("no {id_column:?} column in the input")))?;

    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != id_idx)
        .map(|(_, h)| h.to_string())
        .collect();

    if columns.is_empty() {
        return Err(ExperimentErr::Config("the input has no spectral columns".into()));
    }

    let mut ids = Vec::new();
    let mut rows = Vec::new();
    let mut fingerprints = Vec::new();
    let mut spectra = Vec::new();
    let mut dropped = 0;

    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("dropping row {row}: {e}");
                dropped += 1;
                continue;
            }
        };

        let structure = record.get(id_idx).unwrap_or_default();
        let values: Option<Vec<f32>> = record
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != id_idx)
            .map(|(_, v)| v.trim().parse::<f32>().ok().filter(|v| v.is_finite()))
            .collect();

        let Some(values) = values.filter(|v| v.len() == columns.len()) else {
            warn!("dropping row {row}: missing or invalid spectral values");
            dropped += 1;
            continue;
        };

        let fingerprint = match encoder.encode(structure) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                warn!("dropping row {row} ({structure}): {e}");
                dropped += 1;
                continue;
            }
        };

        ids.push(structure.to_string());
        rows.push(row);
        fingerprints.extend(fingerprint);
        spectra.extend(values);
    }

    if rows.is_empty() {
        return Err(ExperimentErr::EmptyDataset);
    }

    info!(kept = rows.len(), dropped = dropped; "loaded {}", path.display());

    let x = Array2::from_shape_vec((rows.len(), encoder.width()), fingerprints)
        .map_err(machine_learning::MlErr::from)?;
    let y = Array2::from_shape_vec((rows.len(), columns.len()), spectra)
        .map_err(machine_learning::MlErr::from)?;

    let x = MinMax::fit(x.view())?.transform(x.view());
    let spectra_scaler = MinMax::fit(y.view())?;
    let y = spectra_scaler.transform(y.view());

    Ok(LoadedData {
        dataset: Dataset::with_indices(x, y, rows)?,
        columns,
        spectra_scaler,
        ids,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::fingerprint::PathFingerprint;

    fn table(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn invalid_rows_are_dropped() {
        let file = table(
            "smiles,w0,w1,w2\n\
             CCO,1,2,3\n\
             C(C,1,2,3\n\
             CCN,1,,3\n\
             CCC,4,5,x\n\
             c1ccccc1,7,8,9\n",
        );

        let data = load(file.path(), "smiles", &PathFingerprint::new(64, 3)).unwrap();

        assert_eq!(data.dropped, 3);
        assert_eq!(data.dataset.indices(), &[0, 4]);
        assert_eq!(data.columns, ["w0", "w1", "w2"]);
        assert_eq!(data.identifier(4), Some("c1ccccc1"));
        assert_eq!(data.identifier(1), None);
    }

    #[test]
    fn spectra_are_scaled_globally() {
        let file = table("smiles,a,b\nCC,1,3\nCO,5,9\n");
        let data = load(file.path(), "smiles", &PathFingerprint::new(16, 2)).unwrap();

        let y = data.dataset.y();
        assert_eq!(y[[0, 0]], 0.);
        assert_eq!(y[[1, 1]], 1.);
        assert_eq!(y[[0, 1]], 0.25);
        assert_eq!(data.spectra_scaler.max(), 9.);
        assert!(data.dataset.x().iter().all(|&v| (0. ..=1.).contains(&v)));
    }

    #[test]
    fn missing_identifier_column_fails() {
        let file = table("name,a\nCC,1\n");
        let err = load(file.path(), "smiles", &PathFingerprint::new(16, 2));

        assert!(matches!(err, Err(ExperimentErr::Config(_))));
    }

    #[test]
    fn no_valid_rows_fails() {
        let file = table("smiles,a\nC(,1\n");
        let err = load(file.path(), "smiles", &PathFingerprint::new(16, 2));

        assert!(matches!(err, Err(ExperimentErr::EmptyDataset)));
    }
}
