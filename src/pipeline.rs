use crate::charts::{Bar, Dashboard, Projection};
use crate::cleaner::{clean_indicators, CleanReport};
use crate::config::ReportConfig;
use crate::error::Result;
use crate::loader::{load_boundaries, load_indicators};
use crate::merge::merge;
use crate::output;
use crate::params::ParameterSet;
use std::path::PathBuf;

const TITLE: &str = "Better Life Index";

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub rows: usize,
    pub polygons: usize,
    pub matched: usize,
    pub clean: CleanReport,
    /// Indicator the bar chart opens on, and its bars tallest first.
    pub ranked_by: String,
    pub ranking: Vec<Bar>,
    pub plotted_points: usize,
    pub filled_shapes: usize,
    pub projection: Projection,
    pub output_path: PathBuf,
}

/// Load, clean, merge, build the linked charts and write the HTML page.
///
/// Nothing is written until every earlier stage has succeeded.
pub fn run(config: &ReportConfig) -> Result<RunSummary> {
    tracing::info!(path = %config.input_path.display(), sheet = %config.sheet_name, "loading indicators");
    let mut table = load_indicators(config)?;
    tracing::info!(path = %config.geo_path.display(), "loading boundaries");
    let geo = load_boundaries(&config.geo_path, &config.geo_name_property)?;

    let clean = clean_indicators(&mut table, config);
    tracing::info!(
        columns = clean.columns.len(),
        imputed = clean.imputed_cells(),
        "cleaned indicator table"
    );

    let merged = merge(&geo, &table, &config.country_column);
    let matched = merged.matched();
    if matched == 0 && !merged.is_empty() {
        tracing::warn!(
            polygons = merged.len(),
            countries = table.len(),
            "no polygon matched a country; the map will carry no indicator values"
        );
    } else {
        tracing::info!(polygons = merged.len(), matched, "merged boundaries with indicators");
    }

    let params = ParameterSet::new(&table.columns)?;
    let dashboard = Dashboard::new(params, &config.country_column, &config.geo_name_property);
    for (name, value) in &config.param_overrides {
        dashboard.params().set(name, value.clone())?;
    }
    let spec = dashboard.to_vega_lite(&merged);

    output::write_html(&config.output_path, &spec, TITLE)?;
    tracing::info!(path = %config.output_path.display(), "wrote visualization");
    if let Some(path) = &config.imputation_report_path {
        output::write_csv(path, &clean.columns)?;
    }

    Ok(RunSummary {
        rows: table.len(),
        polygons: merged.len(),
        matched,
        clean,
        ranked_by: dashboard.bar.value_field(),
        ranking: dashboard.bar.bars(&merged),
        plotted_points: dashboard.compare.points(&merged).len(),
        filled_shapes: dashboard
            .map
            .shapes(&merged)
            .iter()
            .filter(|s| s.fill.is_some())
            .count(),
        projection: dashboard.map.projection(),
        output_path: config.output_path.clone(),
    })
}
