// manet-pcap-stats/src/report.rs
use std::f64::consts::PI;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::info;
use serde::Serialize;

use crate::collector::{CaptureRow, Dataset, FileFailure, Totals};
use crate::error::ReportError;
use crate::message::{MessageType, Protocol};

const SLICE_COLORS: [&str; 3] = ["#ff9999", "#66b3ff", "#99ff99"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// HTML page plus an SVG pie chart next to it.
    #[default]
    Html,
    Json,
    Csv,
    /// Console only; nothing is written.
    Summary,
}

impl ReportFormat {
    fn extension(self) -> Option<&'static str> {
        match self {
            ReportFormat::Html => Some("html"),
            ReportFormat::Json => Some("json"),
            ReportFormat::Csv => Some("csv"),
            ReportFormat::Summary => None,
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(ReportFormat::Html),
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            "summary" => Ok(ReportFormat::Summary),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

/// Where and how a dataset is written.
///
/// Defaults, for protocol `p`: output directory `.`, report
/// `<p>_analysis_report.<ext>`, chart `<p>_packet_types_distribution.svg`.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub report_file: String,
    pub chart_file: String,
    pub format: ReportFormat,
}

impl ReportConfig {
    pub fn new(protocol: Protocol, format: ReportFormat) -> Self {
        let extension = format.extension().unwrap_or("txt");
        ReportConfig {
            output_dir: PathBuf::from("."),
            report_file: format!("{}_analysis_report.{}", protocol.name(), extension),
            chart_file: format!("{}_packet_types_distribution.svg", protocol.name()),
            format,
        }
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_file)
    }

    pub fn chart_path(&self) -> PathBuf {
        self.output_dir.join(&self.chart_file)
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    protocol: Protocol,
    generated_at: String,
    rows: &'a [CaptureRow],
    totals: Totals,
    failures: &'a [FileFailure],
}

/// Write the dataset according to `config`. Returns the files written.
pub fn write_report(dataset: &Dataset, config: &ReportConfig) -> Result<Vec<PathBuf>, ReportError> {
    let mut written = Vec::new();
    if config.format == ReportFormat::Summary {
        return Ok(written);
    }
    fs::create_dir_all(&config.output_dir)?;

    match config.format {
        ReportFormat::Html => {
            let chart_path = config.chart_path();
            write_file(&chart_path, &render_pie_chart(dataset))?;
            written.push(chart_path);

            let report_path = config.report_path();
            write_file(&report_path, &render_html(dataset, &config.chart_file))?;
            written.push(report_path);
        }
        ReportFormat::Json => {
            let report_path = config.report_path();
            write_file(&report_path, &render_json(dataset)?)?;
            written.push(report_path);
        }
        ReportFormat::Csv => {
            let report_path = config.report_path();
            write_file(&report_path, &render_csv(dataset))?;
            written.push(report_path);
        }
        ReportFormat::Summary => {}
    }

    Ok(written)
}

fn write_file(path: &Path, content: &str) -> Result<(), ReportError> {
    fs::write(path, content)?;
    info!("Wrote {}", path.display());
    Ok(())
}

pub fn render_json(dataset: &Dataset) -> Result<String, ReportError> {
    let report = JsonReport {
        protocol: dataset.protocol,
        generated_at: chrono::Utc::now().to_rfc3339(),
        rows: &dataset.rows,
        totals: dataset.totals(),
        failures: &dataset.failures,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub fn render_csv(dataset: &Dataset) -> String {
    let types = dataset.protocol.message_types();
    let mut csv = String::from("filename,node,total_packets,total_bytes");
    for message_type in types {
        csv.push(',');
        csv.push_str(&message_type.column());
    }
    csv.push_str(",unreadable_packets\n");

    for row in &dataset.rows {
        let _ = write!(
            csv,
            "{},{},{},{}",
            csv_field(&row.filename),
            csv_field(&row.node_id),
            row.tally.total_packets,
            row.tally.total_bytes
        );
        for message_type in types {
            let _ = write!(csv, ",{}", row.tally.count(*message_type));
        }
        let _ = writeln!(csv, ",{}", row.tally.unreadable_packets);
    }
    csv
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Console summary: totals and the per-type distribution.
pub fn render_summary(dataset: &Dataset) -> String {
    let protocol = dataset.protocol;
    let totals = dataset.totals();
    let mut out = String::new();

    let _ = writeln!(out, "=== {} ANALYSIS SUMMARY ===", protocol);
    let _ = writeln!(out, "Files analyzed: {}", dataset.rows.len());
    let _ = writeln!(out, "Total {} packets: {}", protocol, totals.total_packets);
    let _ = writeln!(out, "Total {} bytes: {} bytes", protocol, totals.total_bytes);
    let _ = writeln!(out);
    let _ = writeln!(out, "Packet type distribution:");
    for message_type in protocol.message_types() {
        let _ = writeln!(
            out,
            "- {:<6} {} packets",
            format!("{}:", message_type),
            totals.count(*message_type)
        );
    }
    if totals.unreadable_packets > 0 {
        let _ = writeln!(out, "  ({} unreadable, counted as {})", totals.unreadable_packets, MessageType::Other);
    }
    if !dataset.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Unreadable files:");
        for failure in &dataset.failures {
            let _ = writeln!(out, "- {}", failure.reason);
        }
    }
    out
}

pub fn render_html(dataset: &Dataset, chart_href: &str) -> String {
    let protocol = dataset.protocol;
    let totals = dataset.totals();
    let types = protocol.message_types();

    let mut table = String::from("<table>\n<thead><tr><th>filename</th><th>node</th><th>total_packets</th><th>total_bytes</th>");
    for message_type in types {
        let _ = write!(table, "<th>{}</th>", message_type.column());
    }
    table.push_str("<th>unreadable_packets</th></tr></thead>\n<tbody>\n");
    for row in &dataset.rows {
        let _ = write!(
            table,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td>",
            escape_html(&row.filename),
            escape_html(&row.node_id),
            row.tally.total_packets,
            row.tally.total_bytes
        );
        for message_type in types {
            let _ = write!(table, "<td>{}</td>", row.tally.count(*message_type));
        }
        let _ = writeln!(table, "<td>{}</td></tr>", row.tally.unreadable_packets);
    }
    table.push_str("</tbody>\n</table>");

    let mut failures = String::new();
    if !dataset.failures.is_empty() {
        failures.push_str("<h2>Unreadable Files</h2>\n<ul>\n");
        for failure in &dataset.failures {
            let _ = writeln!(failures, "<li>{}</li>", escape_html(&failure.reason));
        }
        failures.push_str("</ul>\n");
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{protocol} Analysis Report</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        h1, h2 {{ color: #333; }}
        table {{ border-collapse: collapse; width: 100%; margin-bottom: 20px; }}
        th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
        th {{ background-color: #f2f2f2; }}
        tr:nth-child(even) {{ background-color: #f9f9f9; }}
        img {{ max-width: 100%; height: auto; margin-bottom: 20px; }}
    </style>
</head>
<body>
    <h1>{protocol} Packet Analysis Report</h1>

    <h2>General Summary</h2>
    <p>Total {protocol} packets: {total_packets}</p>
    <p>Total {protocol} bytes: {total_bytes} bytes</p>

    <h2>Statistics per Node</h2>
{table}

{failures}
    <h2>Packet Type Distribution</h2>
    <img src="{chart}" alt="{protocol} packet type distribution">
</body>
</html>
"#,
        protocol = protocol,
        total_packets = totals.total_packets,
        total_bytes = totals.total_bytes,
        table = table,
        failures = failures,
        chart = escape_html(chart_href),
    )
}

/// Pie chart of the protocol's named control types (OTHER left out).
pub fn render_pie_chart(dataset: &Dataset) -> String {
    const CX: f64 = 200.0;
    const CY: f64 = 200.0;
    const R: f64 = 150.0;

    let protocol = dataset.protocol;
    let totals = dataset.totals();
    let slices: Vec<(MessageType, u64)> = protocol
        .control_types()
        .iter()
        .map(|t| (*t, totals.count(*t)))
        .collect();
    let sum: u64 = slices.iter().map(|(_, c)| c).sum();

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="560" height="420" viewBox="0 0 560 420" font-family="Arial, sans-serif">"#
    );
    let _ = writeln!(
        svg,
        r#"<text x="280" y="28" text-anchor="middle" font-size="18">{} Packet Type Distribution</text>"#,
        protocol
    );

    if sum == 0 {
        let _ = writeln!(svg, r##"<circle cx="{CX}" cy="{CY}" r="{R}" fill="#eeeeee" stroke="#cccccc"/>"##);
        let _ = writeln!(svg, r#"<text x="{CX}" y="{CY}" text-anchor="middle" font-size="16">No data</text>"#);
    } else {
        let mut start = 0.0f64;
        for (i, (message_type, count)) in slices.iter().enumerate() {
            if *count == 0 {
                continue;
            }
            let percent = totals.control_share(protocol, *message_type);
            let fraction = percent / 100.0;
            let color = SLICE_COLORS[i % SLICE_COLORS.len()];
            let end = start + fraction * 2.0 * PI;

            if *count == sum {
                let _ = writeln!(svg, r#"<circle cx="{CX}" cy="{CY}" r="{R}" fill="{color}"/>"#);
            } else {
                let (x0, y0) = point(CX, CY, R, start);
                let (x1, y1) = point(CX, CY, R, end);
                let large_arc = u8::from(fraction > 0.5);
                let _ = writeln!(
                    svg,
                    r#"<path d="M {CX} {CY} L {x0:.2} {y0:.2} A {R} {R} 0 {large_arc} 1 {x1:.2} {y1:.2} Z" fill="{color}"/>"#
                );
            }

            let (lx, ly) = point(CX, CY, R * 0.6, (start + end) / 2.0);
            let _ = writeln!(
                svg,
                r#"<text x="{lx:.2}" y="{ly:.2}" text-anchor="middle" font-size="14">{:.1}%</text>"#,
                percent
            );
            start = end;
        }
    }

    for (i, (message_type, count)) in slices.iter().enumerate() {
        let y = 150 + i * 30;
        let color = SLICE_COLORS[i % SLICE_COLORS.len()];
        let _ = writeln!(svg, r#"<rect x="400" y="{}" width="18" height="18" fill="{color}"/>"#, y);
        let _ = writeln!(
            svg,
            r#"<text x="426" y="{}" font-size="14">{} ({})</text>"#,
            y + 14,
            message_type,
            count
        );
    }
    svg.push_str("</svg>\n");
    svg
}

// Clockwise from twelve o'clock.
fn point(cx: f64, cy: f64, r: f64, angle: f64) -> (f64, f64) {
    (cx + r * angle.sin(), cy - r * angle.cos())
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
