//! Columnar forecast table: one row per timestamp, optional named value columns.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use itertools::Itertools;

use crate::constants::{COLUMN_DS, COLUMN_ID, DATE_FORMAT, PREFIX_YHAT};
use crate::error::{PlotError, Result};

const TIME_FORMAT_SPACE: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIME_FORMAT_T: &str = "%Y-%m-%dT%H:%M:%S%.f";
const TIME_FORMAT_MINUTES: &str = "%Y-%m-%d %H:%M";
const MISSING_MARKERS: [&str; 5] = ["", "nan", "na", "null", "none"];

#[derive(Clone, Copy, Debug)]
enum TimeFormatHint {
    Space,
    T,
    Minutes,
    Rfc3339,
    DateOnly,
}

impl TimeFormatHint {
    const ALL: [Self; 5] = [
        Self::Space,
        Self::T,
        Self::Minutes,
        Self::Rfc3339,
        Self::DateOnly,
    ];

    fn parse(self, raw: &str) -> Option<NaiveDateTime> {
        match self {
            Self::Space => NaiveDateTime::parse_from_str(raw, TIME_FORMAT_SPACE).ok(),
            Self::T => NaiveDateTime::parse_from_str(raw, TIME_FORMAT_T).ok(),
            Self::Minutes => NaiveDateTime::parse_from_str(raw, TIME_FORMAT_MINUTES).ok(),
            Self::Rfc3339 => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc()),
            Self::DateOnly => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0)),
        }
    }
}

/// Parses a `ds` cell, remembering the format that worked for the next rows.
fn parse_timestamp_with_hint(
    raw: &str,
    hint: &mut Option<TimeFormatHint>,
) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Some(known) = *hint
        && let Some(parsed) = known.parse(trimmed)
    {
        return Ok(parsed);
    }
    for candidate in TimeFormatHint::ALL {
        if let Some(parsed) = candidate.parse(trimmed) {
            *hint = Some(candidate);
            return Ok(parsed);
        }
    }
    Err(PlotError::Time(trimmed.to_string()))
}

/// Missing markers are absent values; any other cell must be a number.
fn parse_value(raw: &str, column: &str) -> Result<Option<f64>> {
    let trimmed = raw.trim();
    if MISSING_MARKERS
        .iter()
        .any(|marker| trimmed.eq_ignore_ascii_case(marker))
    {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(|value| Some(value).filter(|value| !value.is_nan()))
        .map_err(|_| PlotError::InvalidValue {
            column: column.to_string(),
            value: trimmed.to_string(),
        })
}

#[derive(Clone, Debug)]
struct Column {
    name: String,
    values: Vec<Option<f64>>,
}

/// Forecast output aligned by row with `ds`. Missing cells are `None`, never zero.
#[derive(Clone, Debug, Default)]
pub struct ForecastTable {
    ds: Vec<NaiveDateTime>,
    columns: Vec<Column>,
}

impl ForecastTable {
    pub const fn new(ds: Vec<NaiveDateTime>) -> Self {
        Self {
            ds,
            columns: Vec::new(),
        }
    }

    /// Builder form of [`Self::insert_column`].
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<Self> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    /// Adds or replaces a column. The column must have exactly one value per `ds` row.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let name = name.into();
        if values.len() != self.ds.len() {
            return Err(PlotError::ColumnLength {
                name,
                expected: self.ds.len(),
                actual: values.len(),
            });
        }
        if let Some(existing) = self.columns.iter_mut().find(|column| column.name == name) {
            existing.values = values;
        } else {
            self.columns.push(Column { name, values });
        }
        Ok(())
    }

    pub const fn len(&self) -> usize {
        self.ds.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.ds.is_empty()
    }

    pub fn ds(&self) -> &[NaiveDateTime] {
        &self.ds
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.values.as_slice())
    }

    pub fn require(&self, name: &str) -> Result<&[Option<f64>]> {
        self.column(name)
            .ok_or_else(|| PlotError::MissingColumn(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in insertion (file) order, `ds` excluded.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    /// Number of non-missing values; zero for an absent column.
    pub fn count(&self, name: &str) -> usize {
        self.column(name)
            .map_or(0, |values| values.iter().flatten().count())
    }

    pub fn from_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Reads a CSV export with a `ds` column and any number of numeric columns. An `ID`
    /// column is skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();
        let ds_index = headers
            .iter()
            .position(|header| header.trim() == COLUMN_DS)
            .ok_or_else(|| PlotError::MissingColumn(COLUMN_DS.to_string()))?;
        let names = headers
            .iter()
            .enumerate()
            .filter(|(idx, header)| *idx != ds_index && header.trim() != COLUMN_ID)
            .map(|(idx, header)| (idx, header.trim().to_string()))
            .collect_vec();

        let mut hint = None;
        let mut ds = Vec::new();
        let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); names.len()];
        for record in reader.records() {
            let record = record?;
            let raw_ds = record.get(ds_index).unwrap_or_default();
            ds.push(parse_timestamp_with_hint(raw_ds, &mut hint)?);
            for (slot, (idx, name)) in values.iter_mut().zip(&names) {
                slot.push(parse_value(record.get(*idx).unwrap_or_default(), name)?);
            }
        }

        let mut table = Self::new(ds);
        for ((_, name), column) in names.into_iter().zip(values) {
            table.insert_column(name, column)?;
        }
        Ok(table)
    }
}

/// Label of a quantile level as it appears in column names, e.g. `0.1` → `10.0%`.
pub fn quantile_label(quantile: f64) -> String {
    let percent = (quantile * 1000.0).round() / 10.0;
    format!("{percent:.1}%")
}

/// Column holding the `horizon`-step value of a multi-horizon stem, e.g. `yhat3`.
pub fn horizon_column(stem: &str, horizon: usize) -> String {
    format!("{stem}{horizon}")
}

/// Column holding a quantile prediction, e.g. `yhat1 10.0%`.
pub fn quantile_column(stem: &str, horizon: usize, quantile: f64) -> String {
    format!("{stem}{horizon} {}", quantile_label(quantile))
}

/// Point-prediction column for a forecast horizon.
pub fn yhat_column(horizon: usize) -> String {
    horizon_column(PREFIX_YHAT, horizon)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 3, d)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("valid date")
    }

    #[test]
    fn reads_csv_with_missing_cells() {
        let csv = "ds,y,yhat1\n2022-03-01,1.5,\n2022-03-02,NaN,2.0\n2022-03-03 00:00:00,3,4\n";
        let table = ForecastTable::from_reader(csv.as_bytes()).expect("parsed");
        assert_eq!(table.len(), 3);
        assert_eq!(table.ds()[2], day(3));
        assert_eq!(table.column("y"), Some(&[Some(1.5), None, Some(3.0)][..]));
        assert_eq!(table.count("yhat1"), 2);
        assert_eq!(table.column_names().collect_vec(), vec!["y", "yhat1"]);
    }

    #[test]
    fn rejects_non_numeric_cells() {
        let csv = "ds,y\n2022-03-01,1.5\n2022-03-02,abc\n";
        let err = ForecastTable::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, PlotError::InvalidValue { column, value } if column == "y" && value == "abc"));

        let with_id = "ds,ID,y\n2022-03-01,store_a,1.0\n";
        let table = ForecastTable::from_reader(with_id.as_bytes()).expect("id skipped");
        assert!(!table.has_column("ID"));

        let markers = "ds,y\n2022-03-01, NA \n2022-03-02,null\n2022-03-03,None\n2022-03-04,-2.5e1\n";
        let table = ForecastTable::from_reader(markers.as_bytes()).expect("parsed");
        assert_eq!(table.column("y"), Some(&[None, None, None, Some(-25.0)][..]));
    }

    #[test]
    fn rejects_table_without_ds() {
        let err = ForecastTable::from_reader("y\n1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PlotError::MissingColumn(name) if name == "ds"));
    }

    #[test]
    fn rejects_misaligned_column() {
        let err = ForecastTable::new(vec![day(1), day(2)])
            .with_column("y", vec![Some(1.0)])
            .unwrap_err();
        assert!(matches!(err, PlotError::ColumnLength { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn quantile_columns_use_one_decimal() {
        assert_eq!(quantile_column("yhat", 1, 0.1), "yhat1 10.0%");
        assert_eq!(quantile_column("yhat", 2, 0.975), "yhat2 97.5%");
        assert_eq!(yhat_column(3), "yhat3");
    }
}
