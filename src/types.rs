use serde::Serialize;
use serde_json::{Map, Value};
use tabled::Tabled;

/// A single spreadsheet cell as the loader saw it.
///
/// The cleaner turns every metric cell into `Number` or `Missing`;
/// identifier columns keep whatever kind they were loaded as.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// String form used when the cell acts as a join key.
    pub fn as_key(&self) -> Option<String> {
        match self {
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Missing => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            // serde_json maps non-finite floats to null
            CellValue::Number(n) => Value::from(*n),
            CellValue::Text(s) => Value::String(s.clone()),
            CellValue::Missing => Value::Null,
        }
    }
}

/// Rows are countries, columns are indicators plus identifier columns.
#[derive(Debug, Clone, Default)]
pub struct IndicatorTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl IndicatorTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }
}

/// One boundary polygon; `name` is the join key when present.
#[derive(Debug, Clone)]
pub struct GeoFeature {
    pub name: Option<String>,
    pub properties: Map<String, Value>,
    pub geometry: Value,
}

#[derive(Debug, Clone, Default)]
pub struct GeoBoundarySet {
    pub features: Vec<GeoFeature>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ImputationRow {
    #[serde(rename = "Column")]
    #[tabled(rename = "Column")]
    pub column: String,
    #[serde(rename = "Present")]
    #[tabled(rename = "Present")]
    pub present: usize,
    #[serde(rename = "Imputed")]
    #[tabled(rename = "Imputed")]
    pub imputed: usize,
    #[serde(rename = "FillValue")]
    #[tabled(rename = "FillValue")]
    pub fill_value: String,
}
