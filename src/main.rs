// Entry point for the well-being report.
//
// One batch run: read the indicator workbook and world boundaries from
// their fixed paths, impute missing indicator cells, join them onto the
// polygons and write a linked map / bar / scatter page to `output.html`.
mod charts;
mod cleaner;
mod config;
mod error;
mod loader;
mod merge;
mod output;
mod params;
mod pipeline;
mod types;
mod util;

use config::ReportConfig;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ReportConfig::default();
    match pipeline::run(&config) {
        Ok(summary) => {
            println!(
                "Processing dataset... ({} countries loaded, {} cells imputed)",
                util::format_int(summary.rows),
                util::format_int(summary.clean.imputed_cells())
            );
            println!(
                "Merged with boundaries: {} of {} polygons matched a country.",
                util::format_int(summary.matched),
                util::format_int(summary.polygons)
            );
            if summary.matched == 0 {
                println!("Warning: no country names matched; the map has no indicator values.");
            }
            if !summary.clean.empty_columns.is_empty() {
                println!(
                    "Note: left empty (no numeric values): {}",
                    summary.clean.empty_columns.join(", ")
                );
            }
            println!(
                "Charts: {} countries plotted, {} polygons filled.",
                util::format_int(summary.plotted_points),
                util::format_int(summary.filled_shapes)
            );
            println!(
                "Globe: rotated to [{}, {}], zoom {}.",
                summary.projection.rotate[0],
                summary.projection.rotate[1],
                summary.projection.scale
            );
            println!("\nImputation summary\n");
            output::preview_table_rows(&summary.clean.columns, 10);
            println!("Top countries by {}\n", summary.ranked_by);
            output::preview_table_rows(&summary.ranking, 5);
            println!("(Visualization exported to {})", summary.output_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Report failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
