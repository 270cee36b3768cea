use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::types::{CellValue, GeoBoundarySet, GeoFeature, IndicatorTable};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawFeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Value,
}

/// Load the indicator table named by the config and check its key column.
///
/// Workbooks go through calamine; a `.csv` path is read directly and the
/// sheet name is ignored.
pub fn load_indicators(config: &ReportConfig) -> Result<IndicatorTable> {
    let path = config.input_path.as_path();
    if !path.exists() {
        return Err(ReportError::DataSource(format!(
            "indicator file '{}' not found",
            path.display()
        )));
    }
    let table = if has_extension(path, "csv") {
        read_csv_table(path)?
    } else {
        read_workbook_table(path, &config.sheet_name)?
    };
    check_columns(&table)?;
    check_country_keys(&table, &config.country_column)?;
    Ok(table)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn read_workbook_table(path: &Path, sheet_name: &str) -> Result<IndicatorTable> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        ReportError::DataSource(format!("cannot open workbook '{}': {}", path.display(), e))
    })?;
    let sheets = workbook.sheet_names();
    if !sheets.iter().any(|s| s == sheet_name) {
        return Err(ReportError::DataSource(format!(
            "sheet '{}' not found in '{}' (available: {})",
            sheet_name,
            path.display(),
            sheets.join(", ")
        )));
    }
    let range = workbook.worksheet_range(sheet_name).map_err(|e| {
        ReportError::DataSource(format!("cannot read sheet '{}': {}", sheet_name, e))
    })?;

    let mut rows = range.rows();
    let header = rows.next().ok_or_else(|| {
        ReportError::DataSource(format!("sheet '{}' is empty", sheet_name))
    })?;
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| header_label(i, &cell.to_string()))
        .collect();

    let body = rows
        .map(|row| row.iter().map(cell_from_excel).collect::<Vec<_>>())
        .collect();
    Ok(IndicatorTable::new(columns.clone(), normalize_rows(body, columns.len())))
}

fn read_csv_table(path: &Path) -> Result<IndicatorTable> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| ReportError::DataSource(format!("cannot open '{}': {}", path.display(), e)))?;
    let columns: Vec<String> = rdr
        .headers()
        .map_err(|e| ReportError::DataSource(format!("bad header in '{}': {}", path.display(), e)))?
        .iter()
        .enumerate()
        .map(|(i, h)| header_label(i, h))
        .collect();

    let mut body = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| {
            ReportError::DataSource(format!("malformed row in '{}': {}", path.display(), e))
        })?;
        body.push(
            record
                .iter()
                .map(|raw| {
                    if raw.is_empty() {
                        CellValue::Missing
                    } else {
                        CellValue::Text(raw.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(IndicatorTable::new(columns.clone(), normalize_rows(body, columns.len())))
}

/// Trimmed column label; blank headers get a positional name.
fn header_label(index: usize, raw: &str) -> String {
    let label = raw.trim();
    if label.is_empty() {
        format!("Unnamed: {}", index)
    } else {
        label.to_string()
    }
}

fn cell_from_excel(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Number(if *b { 1.0 } else { 0.0 }),
        Data::Error(_) | Data::Empty => CellValue::Missing,
    }
}

/// Pad or cut every row to the header width and drop rows with no content.
fn normalize_rows(body: Vec<Vec<CellValue>>, width: usize) -> Vec<Vec<CellValue>> {
    body.into_iter()
        .filter(|row| row.iter().any(|c| !c.is_missing()))
        .map(|mut row| {
            row.resize(width, CellValue::Missing);
            row
        })
        .collect()
}

/// Labels must stay unique once trimmed, or a field lookup by name would
/// see a different cell than the serialized record.
fn check_columns(table: &IndicatorTable) -> Result<()> {
    let mut seen = HashSet::new();
    for column in &table.columns {
        if !seen.insert(column.as_str()) {
            return Err(ReportError::Schema(format!(
                "column '{}' appears more than once after trimming labels",
                column
            )));
        }
    }
    Ok(())
}

/// The join needs a key column with one row per country.
fn check_country_keys(table: &IndicatorTable, country_column: &str) -> Result<()> {
    let idx = table.column_index(country_column).ok_or_else(|| {
        ReportError::Schema(format!(
            "indicator table has no '{}' column (found: {})",
            country_column,
            table.columns.join(", ")
        ))
    })?;
    let mut seen = HashSet::new();
    for row in &table.rows {
        if let Some(key) = row[idx].as_key() {
            if !seen.insert(key.clone()) {
                return Err(ReportError::Schema(format!(
                    "country '{}' appears more than once in '{}'",
                    key, country_column
                )));
            }
        }
    }
    Ok(())
}

/// Load a GeoJSON `FeatureCollection`, taking each feature's join key
/// from `name_property`.
pub fn load_boundaries(path: &Path, name_property: &str) -> Result<GeoBoundarySet> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ReportError::DataSource(format!("cannot read geo file '{}': {}", path.display(), e))
    })?;
    let raw: RawFeatureCollection = serde_json::from_str(&text).map_err(|e| {
        ReportError::DataSource(format!("malformed geo file '{}': {}", path.display(), e))
    })?;
    if raw.kind != "FeatureCollection" {
        return Err(ReportError::DataSource(format!(
            "geo file '{}' is a '{}', expected a FeatureCollection",
            path.display(),
            raw.kind
        )));
    }

    let features: Vec<GeoFeature> = raw
        .features
        .into_iter()
        .map(|f| {
            let properties = f.properties.unwrap_or_default();
            let name = properties
                .get(name_property)
                .and_then(Value::as_str)
                .map(str::to_string);
            GeoFeature {
                name,
                properties,
                geometry: f.geometry,
            }
        })
        .collect();

    if !features.is_empty() && features.iter().all(|f| f.name.is_none()) {
        return Err(ReportError::Schema(format!(
            "no feature in '{}' carries a '{}' property",
            path.display(),
            name_property
        )));
    }
    Ok(GeoBoundarySet { features })
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;
    use rust_xlsxwriter::Workbook;
    use std::fs;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir, file: &str) -> ReportConfig {
        ReportConfig {
            input_path: dir.path().join(file),
            ..ReportConfig::default()
        }
    }

    #[test]
    fn loads_csv_and_trims_headers() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("data.csv"),
            " Country ,Homicide rate ,Housing expenditure\nA,1,..\nB,..,3\n",
        )
        .unwrap();
        let table = load_indicators(&config_for(&dir, "data.csv")).unwrap();
        assert_eq!(
            table.columns,
            vec!["Country", "Homicide rate", "Housing expenditure"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.cell(1, "Homicide rate"),
            Some(&CellValue::Text("..".to_string()))
        );
    }

    #[test]
    fn pads_short_rows_and_skips_blank_ones() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.csv"), "Country,X,\nA,1\n,,\nB,2,5\n").unwrap();
        let table = load_indicators(&config_for(&dir, "data.csv")).unwrap();
        assert_eq!(table.columns[2], "Unnamed: 2");
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][2], CellValue::Missing);
    }

    #[test]
    fn missing_input_is_a_data_source_error() {
        let dir = TempDir::new().unwrap();
        let err = load_indicators(&config_for(&dir, "absent.xlsx")).unwrap_err();
        assert!(matches!(err, ReportError::DataSource(_)));
    }

    #[test]
    fn unreadable_workbook_is_a_data_source_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.xlsx"), "not a zip archive").unwrap();
        let err = load_indicators(&config_for(&dir, "broken.xlsx")).unwrap_err();
        assert!(matches!(err, ReportError::DataSource(_)));
    }

    #[test]
    fn missing_country_column_is_a_schema_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.csv"), "Nation,X\nA,1\n").unwrap();
        let err = load_indicators(&config_for(&dir, "data.csv")).unwrap_err();
        assert!(matches!(err, ReportError::Schema(_)));
    }

    #[test]
    fn labels_duplicated_by_trimming_are_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.csv"), "Country, X,X \nA,1,9\n").unwrap();
        let err = load_indicators(&config_for(&dir, "data.csv")).unwrap_err();
        assert!(matches!(err, ReportError::Schema(_)));
        assert!(err.to_string().contains("'X'"));
    }

    fn write_workbook(path: &std::path::Path) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("PyhtonReadable").unwrap();
        sheet.write_string(0, 0, " Country ").unwrap();
        sheet.write_string(0, 1, "Homicide rate ").unwrap();
        sheet.write_string(0, 2, "Flag").unwrap();
        sheet.write_string(0, 3, "Housing expenditure").unwrap();
        sheet.write_string(1, 0, "A").unwrap();
        sheet.write_number(1, 1, 1).unwrap();
        sheet.write_boolean(1, 2, true).unwrap();
        sheet.write_string(1, 3, "..").unwrap();
        sheet.write_string(2, 0, "B").unwrap();
        sheet.write_number(2, 1, 2.5).unwrap();
        sheet.write_number(2, 3, 3).unwrap();
        workbook.add_worksheet().set_name("Notes").unwrap();
        workbook.save(path).unwrap();
    }

    #[test]
    fn loads_workbook_sheet() {
        let dir = TempDir::new().unwrap();
        write_workbook(&dir.path().join("index.xlsx"));
        let table = load_indicators(&config_for(&dir, "index.xlsx")).unwrap();
        assert_eq!(
            table.columns,
            vec!["Country", "Homicide rate", "Flag", "Housing expenditure"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, "Country"), Some(&CellValue::Text("A".into())));
        assert_eq!(table.cell(0, "Homicide rate"), Some(&CellValue::Number(1.0)));
        assert_eq!(table.cell(0, "Flag"), Some(&CellValue::Number(1.0)));
        assert_eq!(
            table.cell(0, "Housing expenditure"),
            Some(&CellValue::Text("..".into()))
        );
        assert_eq!(table.cell(1, "Homicide rate"), Some(&CellValue::Number(2.5)));
        assert_eq!(table.cell(1, "Flag"), Some(&CellValue::Missing));
        assert_eq!(
            table.cell(1, "Housing expenditure"),
            Some(&CellValue::Number(3.0))
        );
    }

    #[test]
    fn unknown_sheet_lists_available_sheets() {
        let dir = TempDir::new().unwrap();
        write_workbook(&dir.path().join("index.xlsx"));
        let config = ReportConfig {
            sheet_name: "Sheet1".to_string(),
            ..config_for(&dir, "index.xlsx")
        };
        let err = load_indicators(&config).unwrap_err();
        assert!(matches!(err, ReportError::DataSource(_)));
        let msg = err.to_string();
        assert!(msg.contains("Sheet1"));
        assert!(msg.contains("PyhtonReadable"));
        assert!(msg.contains("Notes"));
    }

    #[test]
    fn maps_excel_cell_kinds() {
        assert_eq!(cell_from_excel(&Data::Int(4)), CellValue::Number(4.0));
        assert_eq!(cell_from_excel(&Data::Float(0.5)), CellValue::Number(0.5));
        assert_eq!(cell_from_excel(&Data::Bool(false)), CellValue::Number(0.0));
        assert_eq!(
            cell_from_excel(&Data::String("..".into())),
            CellValue::Text("..".into())
        );
        assert_eq!(cell_from_excel(&Data::Empty), CellValue::Missing);
        assert_eq!(
            cell_from_excel(&Data::Error(CellErrorType::Div0)),
            CellValue::Missing
        );
    }

    #[test]
    fn duplicate_countries_are_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.csv"), "Country,X\nA,1\nA,2\n").unwrap();
        let err = load_indicators(&config_for(&dir, "data.csv")).unwrap_err();
        assert!(matches!(err, ReportError::Schema(_)));
    }

    #[test]
    fn loads_feature_collection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("world.geo.json");
        fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"name_en":"A","iso":"AA"},
                 "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}},
                {"type":"Feature","properties":{"iso":"ZZ"},"geometry":null}
            ]}"#,
        )
        .unwrap();
        let geo = load_boundaries(&path, "name_en").unwrap();
        assert_eq!(geo.features.len(), 2);
        assert_eq!(geo.features[0].name.as_deref(), Some("A"));
        assert_eq!(geo.features[0].geometry["type"], "Polygon");
        assert_eq!(geo.features[1].name, None);
    }

    #[test]
    fn malformed_geo_file_is_a_data_source_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.geo.json");
        fs::write(&path, "{ this is not json").unwrap();
        assert!(matches!(
            load_boundaries(&path, "name_en"),
            Err(ReportError::DataSource(_))
        ));

        fs::write(&path, r#"{"type":"Feature","features":[]}"#).unwrap();
        assert!(matches!(
            load_boundaries(&path, "name_en"),
            Err(ReportError::DataSource(_))
        ));
    }

    #[test]
    fn geo_without_name_property_is_a_schema_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anon.geo.json");
        fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"name":"A"},"geometry":null}]}"#,
        )
        .unwrap();
        assert!(matches!(
            load_boundaries(&path, "name_en"),
            Err(ReportError::Schema(_))
        ));
    }
}
