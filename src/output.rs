//! Rendering of discovered workloads

use crate::dataset::Dataset;
use crate::domain::ports::Workload;
use crate::error::{Error, Result};
use std::fmt::Write;
use std::str::FromStr;

/// Output format for `list`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(Error::Configuration(format!(
                "unknown output format {other:?} (expected table, json or yaml)"
            ))),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

/// Render workloads in the requested format
///
/// JSON output is byte-for-byte the state file format. Every format ends
/// with a newline.
pub fn render(workloads: &[Workload], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(workloads)),
        OutputFormat::Json => {
            let mut json = Dataset::new(workloads.to_vec()).to_json()?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Yaml => Ok(serde_yaml::to_string(workloads)?),
    }
}

const HEADERS: [&str; 4] = ["NAMESPACE", "KIND", "NAME", "REPLICAS"];

fn render_table(workloads: &[Workload]) -> String {
    let rows: Vec<[String; 4]> = workloads
        .iter()
        .map(|w| {
            [
                w.namespace.clone(),
                w.kind.to_string(),
                w.name.clone(),
                w.replicas.to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let mut line = |cells: [&str; 4]| {
        let _ = writeln!(
            out,
            "{:<w0$}   {:<w1$}   {:<w2$}   {}",
            cells[0],
            cells[1],
            cells[2],
            cells[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
        );
    };

    line(HEADERS);
    for row in &rows {
        line([row[0].as_str(), row[1].as_str(), row[2].as_str(), row[3].as_str()]);
    }
    out
}
