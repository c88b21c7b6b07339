//! Output Formatting
//!
//! Human-readable output for result bundles.
//!
//! Generates terminal-friendly output with:
//! - One block per assay channel, methods as columns
//! - Method metadata (callable, post-processing, provenance)
//! - Failed methods with stage and cause
//! - Ground truth and feature side tables when present

use benchdesign_logic::Scalar;
use benchdesign_report::{ResultBundle, Table};

/// Rows shown per table before eliding
const MAX_ROWS: usize = 20;

/// Format a bundle for human-readable terminal display
pub fn format_human_output(bundle: &ResultBundle) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("BenchDesign Results\n");
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    for assay in &bundle.assays {
        output.push_str(&format!("Assay: {}\n", assay.channel));
        output.push_str(&"-".repeat(60));
        output.push('\n');
        output.push_str(&format_table(&assay.table));
        output.push('\n');
    }

    // Metadata
    output.push_str("Methods\n");
    output.push_str(&"-".repeat(60));
    output.push('\n');
    let max_label_len = bundle
        .metadata
        .labels()
        .iter()
        .map(|l| l.len())
        .max()
        .unwrap_or(8);
    for label in bundle.metadata.labels() {
        let icon = if bundle.failed(&label) { "✗" } else { "✓" };
        let cell = |column: &str| {
            bundle
                .metadata
                .get(&label, column)
                .map(render_cell)
                .unwrap_or_default()
        };
        let post = cell("post");
        let pkg = match (cell("pkg_name"), cell("pkg_vers")) {
            (name, _) if name.is_empty() => "-".to_string(),
            (name, vers) if vers.is_empty() => name,
            (name, vers) => format!("{name} {vers}"),
        };
        output.push_str(&format!(
            "  {} {:<width$}  func: {}",
            icon,
            label,
            cell("func"),
            width = max_label_len
        ));
        if !post.is_empty() {
            output.push_str(&format!("  post: {post}"));
        }
        output.push_str(&format!("  pkg: {pkg} ({})\n", cell("provenance")));
    }

    // Failures
    if !bundle.meta.failures.is_empty() {
        output.push_str("\nFailures\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        for failure in &bundle.meta.failures {
            output.push_str(&format!(
                "  ✗ {} [{}]: {}\n",
                failure.method, failure.kind, failure.message
            ));
        }
    }

    if let Some(gt) = &bundle.ground_truth {
        output.push_str("\nGround Truth\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        for (channel, column) in &gt.sources {
            output.push_str(&format!("  {channel} <- {column}\n"));
        }
        output.push_str(&format_table(&gt.table));
    }

    if let Some(features) = &bundle.features {
        output.push_str("\nFeatures\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        output.push_str(&format_table(features));
    }

    // Summary
    output.push_str("\nSummary\n");
    output.push_str(&"-".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "  Methods: {}  Failed: {}  Channels: {}\n",
        bundle.meta.methods.len(),
        bundle.meta.failures.len(),
        bundle.meta.channels.len()
    ));
    output.push_str(&format!(
        "  Mode: {} ({} workers)  Alignment: {}\n",
        if bundle.meta.config.concurrent {
            "concurrent"
        } else {
            "sequential"
        },
        bundle.meta.config.workers,
        bundle.meta.config.alignment
    ));
    output.push_str(&format!("  Duration: {:.2} ms\n", bundle.meta.duration_ms));

    output
}

fn render_cell(cell: &Scalar) -> String {
    match cell {
        Scalar::Missing => String::new(),
        Scalar::Number(v) if v.abs() >= 1_000_000.0 || (v.abs() < 0.001 && *v != 0.0) => {
            format!("{v:.2e}")
        }
        other => other.to_string(),
    }
}

/// Render a table as aligned columns, ids first when keyed
fn format_table(table: &Table) -> String {
    let mut headers: Vec<String> = Vec::with_capacity(table.n_cols() + 1);
    if table.row_ids.is_some() {
        headers.push("id".to_string());
    }
    headers.extend(table.columns.iter().cloned());

    let shown = table.n_rows().min(MAX_ROWS);
    let rows: Vec<Vec<String>> = (0..shown)
        .map(|i| {
            let mut row = Vec::with_capacity(headers.len());
            if let Some(ids) = &table.row_ids {
                row.push(ids.get(i).cloned().unwrap_or_default());
            }
            row.extend(table.row(i).unwrap_or_default().into_iter().map(|c| match c {
                Scalar::Missing => "NA".to_string(),
                other => render_cell(other),
            }));
            row
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(j, h)| {
            rows.iter()
                .map(|r| r.get(j).map_or(0, |c| c.len()))
                .max()
                .unwrap_or(0)
                .max(h.len())
        })
        .collect();

    let mut output = String::new();
    output.push_str("  ");
    output.push_str(
        &headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| format!("{:>w$}", h, w = w))
            .collect::<Vec<_>>()
            .join(" | "),
    );
    output.push('\n');
    output.push_str(&format!(
        "  {}\n",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-")
    ));
    for row in &rows {
        output.push_str("  ");
        output.push_str(
            &row.iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:>w$}", c, w = w))
                .collect::<Vec<_>>()
                .join(" | "),
        );
        output.push('\n');
    }
    if table.n_rows() > shown {
        output.push_str(&format!("  ... {} more rows\n", table.n_rows() - shown));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table_keyed() {
        let table = Table::new(
            vec!["m1".to_string(), "m2".to_string()],
            vec![
                vec![Scalar::from(1.0), Scalar::from(2.0)],
                vec![Scalar::Missing, Scalar::from(4.0)],
            ],
            Some(vec!["a".to_string(), "b".to_string()]),
        );
        let text = format_table(&table);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("id") && lines[0].contains("m2"));
        assert!(lines[3].contains("NA"));
        assert!(lines[3].trim_start().starts_with('b'));
    }

    #[test]
    fn test_elides_long_tables() {
        let cells = vec![(0..30).map(|i| Scalar::from(i as f64)).collect()];
        let table = Table::new(vec!["m".to_string()], cells, None);
        let text = format_table(&table);
        assert!(text.contains("... 10 more rows"));
    }
}
