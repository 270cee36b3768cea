use crate::error::{ReportError, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

const SPEC_SCRIPT_OPEN: &str = r#"<script type="application/json" id="vega-spec">"#;

fn io_error(path: &Path, source: std::io::Error) -> ReportError {
    ReportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Standalone page that loads Vega from the CDN and embeds `spec`.
pub fn render_html(spec: &Value, title: &str) -> String {
    // keep a "</script>" inside a string value from closing the tag
    let spec_json = spec.to_string().replace("</", "<\\/");
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <style>
    form.vega-bindings {{ position: absolute; left: 0px; top: 0px; }}
  </style>
  <script src="https://cdn.jsdelivr.net/npm/vega@5"></script>
  <script src="https://cdn.jsdelivr.net/npm/vega-lite@5"></script>
  <script src="https://cdn.jsdelivr.net/npm/vega-embed@6"></script>
</head>
<body>
  <div id="vis"></div>
  {open}{spec}</script>
  <script type="text/javascript">
    const spec = JSON.parse(document.getElementById('vega-spec').textContent);
    vegaEmbed('#vis', spec, {{"mode": "vega-lite"}}).catch(console.error);
  </script>
</body>
</html>
"#,
        title = escape_html(title),
        open = SPEC_SCRIPT_OPEN,
        spec = spec_json,
    )
}

/// Render the page fully in memory, then write it in one go.
/// A failed write leaves no partial file behind.
pub fn write_html(path: &Path, spec: &Value, title: &str) -> Result<()> {
    let html = render_html(spec, title);
    if let Err(e) = fs::write(path, html) {
        let _ = fs::remove_file(path);
        return Err(io_error(path, e));
    }
    Ok(())
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| io_error(path, e.into()))?;
    for r in rows {
        wtr.serialize(r).map_err(|e| io_error(path, e.into()))?;
    }
    wtr.flush().map_err(|e| io_error(path, e))?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Pull the embedded spec back out of a page written by [`render_html`].
#[cfg(test)]
pub(crate) fn extract_spec(html: &str) -> Option<Value> {
    let start = html.find(SPEC_SCRIPT_OPEN)? + SPEC_SCRIPT_OPEN.len();
    let end = start + html[start..].find("</script>")?;
    serde_json::from_str(&html[start..end]).ok()
}
