use crate::config::ReportConfig;
use crate::types::{CellValue, ImputationRow, IndicatorTable};
use crate::util::{mean, parse_f64_safe, round2};

#[derive(Debug, Clone)]
pub struct CleanReport {
    pub columns: Vec<ImputationRow>,
    /// Metric columns with no numeric value at all; their cells stay missing.
    pub empty_columns: Vec<String>,
}

impl CleanReport {
    pub fn imputed_cells(&self) -> usize {
        self.columns.iter().map(|c| c.imputed).sum()
    }
}

/// Coerce every metric column to numbers and fill the gaps with the
/// column mean, rounded to 2 places.
///
/// Each mean only sees the values present in its own column before
/// filling, so the order columns are processed in does not matter.
/// A column with no numeric value keeps its missing cells.
pub fn clean_indicators(table: &mut IndicatorTable, config: &ReportConfig) -> CleanReport {
    let mut columns = Vec::new();
    let mut empty_columns = Vec::new();

    for (idx, name) in table.columns.iter().enumerate() {
        if config.is_id_column(name) {
            continue;
        }

        let mut present = Vec::new();
        for row in table.rows.iter_mut() {
            let coerced = coerce(&row[idx]);
            if let CellValue::Number(n) = coerced {
                present.push(n);
            }
            row[idx] = coerced;
        }

        let missing = table.rows.len() - present.len();
        let fill = match mean(&present) {
            Some(m) => round2(m),
            None => {
                tracing::warn!(column = %name, "column has no numeric values, leaving cells missing");
                empty_columns.push(name.clone());
                columns.push(ImputationRow {
                    column: name.clone(),
                    present: 0,
                    imputed: 0,
                    fill_value: "-".to_string(),
                });
                continue;
            }
        };

        for row in table.rows.iter_mut() {
            if row[idx].is_missing() {
                row[idx] = CellValue::Number(fill);
            }
        }
        tracing::debug!(column = %name, imputed = missing, fill, "imputed column mean");
        columns.push(ImputationRow {
            column: name.clone(),
            present: present.len(),
            imputed: missing,
            fill_value: format!("{:.2}", fill),
        });
    }

    CleanReport {
        columns,
        empty_columns,
    }
}

fn coerce(cell: &CellValue) -> CellValue {
    match cell {
        CellValue::Number(n) if n.is_finite() => CellValue::Number(*n),
        CellValue::Text(s) => parse_f64_safe(Some(s))
            .map(CellValue::Number)
            .unwrap_or(CellValue::Missing),
        _ => CellValue::Missing,
    }
}
