use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::MdvError;

/// Name of the file written by the table screen's export action.
pub const EXPORT_FILE_NAME: &str = "medical_data_export.csv";

/// An ordered set of records. Headers come from the first parsed row and
/// keep that order; every row is index-aligned with the headers. Rows are
/// never mutated after parsing, the table screen only derives views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RecordSet {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        RecordSet { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell value for a row index and header name. A missing column or a
    /// short row reads as an empty string.
    pub fn value_at<'a>(&'a self, row: usize, header: &str) -> &'a str {
        let Some(cidx) = self.headers.iter().position(|h| h == header) else {
            return "";
        };
        self.rows
            .get(row)
            .and_then(|r| r.get(cidx))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    /// Load a record set from a CSV file. First row supplies the headers,
    /// blank lines are skipped, nulls read as empty strings.
    pub fn load_csv(path: &Path) -> Result<RecordSet, MdvError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => MdvError::ReadFailure(format!("{} not found", path.display())),
            ErrorKind::PermissionDenied => {
                MdvError::ReadFailure(format!("{} not readable", path.display()))
            }
            _ => MdvError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(MdvError::ReadFailure(format!(
                "{} is not a file",
                path.display()
            )));
        }

        let start_time = Instant::now();
        let frame = LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
            .map_err(|e| MdvError::ParseStructureError(e.to_string()))?;
        let df = frame
            .collect()
            .map_err(|e| MdvError::ParseStructureError(e.to_string()))?;

        let headers: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        // Materialize every column as strings, one rayon task per column,
        // the same way the dataframe is pre-processed for display.
        let columns: Vec<Vec<String>> = headers
            .par_iter()
            .map(|name| Self::column_as_strings(&df, name))
            .collect::<Result<_, PolarsError>>()
            .map_err(|e| MdvError::ParseStructureError(e.to_string()))?;

        let nrows = df.height();
        let mut rows = Vec::with_capacity(nrows);
        for ridx in 0..nrows {
            rows.push(columns.iter().map(|c| c[ridx].clone()).collect());
        }

        info!(
            "Loaded {} rows x {} columns from {} in {}ms",
            nrows,
            headers.len(),
            path.display(),
            start_time.elapsed().as_millis()
        );
        Ok(RecordSet { headers, rows })
    }

    fn column_as_strings(df: &DataFrame, name: &str) -> Result<Vec<String>, PolarsError> {
        let col = df.column(name)?.cast(&DataType::String)?;
        let series = col.str()?;
        let data = series
            .into_iter()
            .map(|v| v.map(str::to_string).unwrap_or_default())
            .collect();
        debug!("Materialized column \"{name}\"");
        Ok(data)
    }

    /// Serialize headers and rows back to CSV text. Values are joined
    /// verbatim; embedded commas are not escaped (known limitation,
    /// matches the preview nature of the tool).
    pub fn to_csv(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(self.headers.join(","));
        for row in &self.rows {
            lines.push(row.join(","));
        }
        lines.join("\n")
    }

    /// Write the CSV serialization into `dir` as `medical_data_export.csv`
    /// and return the full path.
    pub fn export(&self, dir: &Path) -> Result<PathBuf, MdvError> {
        let path = dir.join(EXPORT_FILE_NAME);
        fs::write(&path, self.to_csv())?;
        info!("Exported {} rows to {}", self.len(), path.display());
        Ok(path)
    }
}

/// Extension gate applied before the file is read at all.
pub fn has_csv_extension(name: &str) -> bool {
    name.to_lowercase().ends_with(".csv")
}

/// Built-in demonstration records, shown whenever no uploaded data is
/// active on the table screen.
pub fn sample_records() -> RecordSet {
    let headers = [
        "Patient_ID",
        "Name",
        "Age",
        "Gender",
        "Blood_Pressure",
        "Heart_Rate",
        "Temperature",
        "Glucose",
    ];
    let rows = [
        ["P001", "John Doe", "45", "M", "135", "72", "98.6", "95"],
        ["P002", "Jane Miller", "52", "F", "150", "88", "98.2", "110"],
        ["P003", "Sam Carter", "37", "M", "118", "64", "97.9", "89"],
        ["P004", "Rosa Alvarez", "61", "F", "142", "58", "98.4", "152"],
        ["P005", "Liu Wei", "29", "M", "121", "70", "99.1", "101"],
        ["P006", "Ann Becker", "48", "F", "128", "104", "100.2", "97"],
        ["P007", "Omar Haddad", "55", "M", "139", "77", "98.0", "133"],
        ["P008", "Mia Novak", "33", "F", "116", "62", "98.7", "92"],
        ["P009", "Tom Keller", "67", "M", "154", "91", "98.3", "147"],
        ["P010", "Eva Lindt", "41", "F", "124", "68", "96.8", "88"],
        ["P011", "Raj Patel", "58", "M", "137", "83", "98.9", "121"],
        ["P012", "Kim Soo-a", "36", "F", "119", "59", "98.5", "94"],
    ];
    RecordSet::new(
        headers.iter().map(|s| s.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_gate_is_case_insensitive() {
        assert!(has_csv_extension("records.csv"));
        assert!(has_csv_extension("RECORDS.CSV"));
        assert!(has_csv_extension("export.v2.Csv"));
        assert!(!has_csv_extension("records.tsv"));
        assert!(!has_csv_extension("records.csv.gz"));
        assert!(!has_csv_extension("csv"));
    }

    #[test]
    fn missing_values_read_as_empty() {
        let set = RecordSet::new(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into(), "2".into()], vec!["3".into()]],
        );
        assert_eq!(set.value_at(0, "b"), "2");
        assert_eq!(set.value_at(1, "b"), "");
        assert_eq!(set.value_at(0, "nope"), "");
        assert_eq!(set.value_at(99, "a"), "");
    }

    #[test]
    fn csv_serialization_shape() {
        let set = RecordSet::new(
            vec!["x".into(), "y".into()],
            vec![
                vec!["1".into(), "one".into()],
                vec!["2".into(), String::new()],
            ],
        );
        assert_eq!(set.to_csv(), "x,y\n1,one\n2,");
    }

    #[test]
    fn sample_records_span_two_pages() {
        let sample = sample_records();
        assert_eq!(sample.len(), 12);
        assert!(sample.rows().iter().all(|r| r.len() == sample.headers().len()));
    }

    #[test]
    fn loading_a_missing_file_is_a_read_failure() {
        let err = RecordSet::load_csv(Path::new("/no/such/file.csv")).unwrap_err();
        assert!(matches!(err, MdvError::ReadFailure(_)));
    }
}
