use crate::params::ParamValue;
use std::path::PathBuf;

/// Where the report reads from and writes to.
///
/// `Default` holds the fixed relative paths the report has always used, so
/// `main` never needs flags or environment lookups.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub input_path: PathBuf,
    pub sheet_name: String,
    pub geo_path: PathBuf,
    pub output_path: PathBuf,
    /// Column holding the join key on the indicator side.
    pub country_column: String,
    /// Columns left untouched by the cleaner.
    pub id_columns: Vec<String>,
    /// GeoJSON property holding the join key on the polygon side.
    pub geo_name_property: String,
    /// When set, the per-column imputation summary is also written as CSV.
    pub imputation_report_path: Option<PathBuf>,
    /// Parameter values applied after the charts are wired, validated like
    /// any user change. The page opens with these instead of the defaults.
    pub param_overrides: Vec<(String, ParamValue)>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data/OECD_betterLifeIndex.xlsx"),
            // Sheet name as spelled in the source workbook.
            sheet_name: "PyhtonReadable".to_string(),
            geo_path: PathBuf::from("data/custom.geo.json"),
            output_path: PathBuf::from("output.html"),
            country_column: "Country".to_string(),
            id_columns: vec!["Country".to_string(), "OCED".to_string()],
            geo_name_property: "name_en".to_string(),
            imputation_report_path: None,
            param_overrides: Vec::new(),
        }
    }
}

impl ReportConfig {
    pub fn is_id_column(&self, name: &str) -> bool {
        self.id_columns.iter().any(|c| c == name)
    }
}
