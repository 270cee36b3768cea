use crate::types::{CellValue, GeoBoundarySet, GeoFeature, IndicatorTable};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// One polygon and, when its name matched a country, that country's row.
#[derive(Debug, Clone)]
pub struct MergedRecord {
    pub feature: GeoFeature,
    pub indicators: Option<Vec<CellValue>>,
}

/// Result of the left join: one record per polygon, sharing the indicator
/// schema so fields can be looked up by column name.
#[derive(Debug, Clone)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub records: Vec<MergedRecord>,
    country_column: String,
}

impl MergedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn matched(&self) -> usize {
        self.records.iter().filter(|r| r.indicators.is_some()).count()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Indicator cell of `record` under column `name`, resolved against the
    /// schema on every call.
    pub fn field<'a>(&self, record: &'a MergedRecord, name: &str) -> Option<&'a CellValue> {
        let idx = self.column_index(name)?;
        record.indicators.as_ref()?.get(idx)
    }

    pub fn numeric(&self, record: &MergedRecord, name: &str) -> Option<f64> {
        self.field(record, name).and_then(CellValue::as_f64)
    }

    pub fn country(&self, record: &MergedRecord) -> Option<String> {
        self.field(record, &self.country_column)
            .and_then(CellValue::as_key)
    }

    /// Feature objects with properties lifted to the top level and every
    /// indicator column attached (`null` where there is no match).
    ///
    /// An indicator column that shares a name with a geo property wins.
    pub fn to_values(&self) -> Vec<Value> {
        let mut shadowed = BTreeSet::new();
        let values = self
            .records
            .iter()
            .map(|record| {
                let mut obj = Map::new();
                obj.insert("type".to_string(), Value::String("Feature".to_string()));
                obj.insert("geometry".to_string(), record.feature.geometry.clone());
                for (k, v) in &record.feature.properties {
                    obj.insert(k.clone(), v.clone());
                }
                for (idx, column) in self.columns.iter().enumerate() {
                    let value = record
                        .indicators
                        .as_ref()
                        .and_then(|cells| cells.get(idx))
                        .map(CellValue::to_json)
                        .unwrap_or(Value::Null);
                    if record.feature.properties.contains_key(column) {
                        shadowed.insert(column.clone());
                    }
                    obj.insert(column.clone(), value);
                }
                Value::Object(obj)
            })
            .collect();
        for column in shadowed {
            tracing::warn!(column = %column, "indicator column overrides a geo property of the same name");
        }
        values
    }
}

/// Left outer join of polygons to indicator rows on
/// `feature.name == row[country_column]`.
///
/// Exact, case-sensitive matching. Every polygon is kept, in input order.
pub fn merge(geo: &GeoBoundarySet, table: &IndicatorTable, country_column: &str) -> MergedTable {
    let by_country: HashMap<String, &Vec<CellValue>> = match table.column_index(country_column) {
        Some(idx) => table
            .rows
            .iter()
            .filter_map(|row| row[idx].as_key().map(|key| (key, row)))
            .collect(),
        None => HashMap::new(),
    };

    let records = geo
        .features
        .iter()
        .map(|feature| MergedRecord {
            feature: feature.clone(),
            indicators: feature
                .name
                .as_ref()
                .and_then(|name| by_country.get(name))
                .map(|row| (*row).clone()),
        })
        .collect();

    MergedTable {
        columns: table.columns.clone(),
        records,
        country_column: country_column.to_string(),
    }
}
