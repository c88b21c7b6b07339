//! CSV Output

use crate::report::{ResultBundle, Table};
use benchdesign_logic::Scalar;

/// Generate CSV: one block per channel, `id` first when rows are keyed.
///
/// Blocks are separated by a blank line and introduced by a `# channel` line.
pub fn generate_csv_report(bundle: &ResultBundle) -> String {
    let mut blocks = Vec::with_capacity(bundle.assays.len());
    for assay in &bundle.assays {
        blocks.push(format!("# {}\n{}", assay.channel, table_to_csv(&assay.table)));
    }
    blocks.join("\n")
}

/// Render one table as CSV
pub fn table_to_csv(table: &Table) -> String {
    let mut csv = String::new();

    let mut header: Vec<String> = Vec::with_capacity(table.n_cols() + 1);
    if table.row_ids.is_some() {
        header.push("id".to_string());
    }
    header.extend(table.columns.iter().map(|c| escape_csv(c)));
    csv.push_str(&header.join(","));
    csv.push('\n');

    for row in 0..table.n_rows() {
        let mut fields = Vec::with_capacity(header.len());
        if let Some(ids) = &table.row_ids {
            fields.push(escape_csv(&ids[row]));
        }
        for col in &table.cells {
            fields.push(match col.get(row) {
                Some(Scalar::Missing) | None => String::new(),
                Some(cell) => escape_csv(&cell.to_string()),
            });
        }
        csv.push_str(&fields.join(","));
        csv.push('\n');
    }

    csv
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_table() {
        let t = Table::new(
            vec!["m1".to_string(), "a,b".to_string()],
            vec![
                vec![Scalar::Number(1.5), Scalar::Missing],
                vec![Scalar::from("x"), Scalar::Bool(true)],
            ],
            Some(vec!["g1".to_string(), "g2".to_string()]),
        );
        assert_eq!(table_to_csv(&t), "id,m1,\"a,b\"\ng1,1.5,x\ng2,,true\n");
    }

    #[test]
    fn test_positional_table() {
        let t = Table::new(vec!["m1".to_string()], vec![vec![Scalar::Number(2.0)]], None);
        assert_eq!(table_to_csv(&t), "m1\n2\n");
    }
}
