use crate::entity::EntitySpec;
use crate::value::{Row, Value};
use tabled::{builder::Builder, settings::Style, Table, Tabled};

/// Longest cell text before it gets cut with an ellipsis
const MAX_CELL: usize = 40;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Two-column metric/value table
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

fn cell(value: &Value) -> String {
    let text = match value {
        Value::Null => "-".to_string(),
        Value::Bool(true) => "yes".to_string(),
        Value::Bool(false) => "no".to_string(),
        other => other.to_string(),
    };
    if text.chars().count() > MAX_CELL {
        let cut: String = text.chars().take(MAX_CELL - 1).collect();
        format!("{}…", cut)
    } else {
        text
    }
}

/// One line per row, one column per entity column (`hidden` left out)
pub fn rows_table(spec: &EntitySpec, rows: &[Row], hidden: &[&str]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let columns: Vec<&str> = spec
        .columns
        .iter()
        .map(|c| c.name)
        .filter(|name| !hidden.contains(name))
        .collect();

    let mut builder = Builder::default();
    builder.push_record(columns.iter().copied());
    for row in rows {
        builder.push_record(
            columns
                .iter()
                .map(|name| row.get(name).map(cell).unwrap_or_default()),
        );
    }
    builder.build().with(Style::rounded()).to_string()
}

/// Free-form table from pre-rendered cells
pub fn grid(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut builder = Builder::default();
    builder.push_record(headers.iter().copied());
    for row in rows {
        builder.push_record(row);
    }
    builder.build().with(Style::rounded()).to_string()
}

/// Field/value listing of a single row
pub fn record_table(row: &Row, hidden: &[&str]) -> String {
    let mut builder = TableBuilder::new();
    for (column, value) in row.iter() {
        if !hidden.contains(&column) {
            builder.add_row(column, &cell(value));
        }
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    #[test]
    fn test_rows_table_hides_columns() {
        let rows = vec![Row::new()
            .with("user_id", 1i64)
            .with("username", "admin")
            .with("password_hash", "secret")
            .with("role", "Admin")
            .with("email", Value::Null)
            .with("created_at", Value::Null)
            .with("last_login", Value::Null)];

        let table = rows_table(Entity::Account.spec(), &rows, &["password_hash"]);
        assert!(table.contains("username"));
        assert!(table.contains("admin"));
        assert!(!table.contains("secret"));
        assert!(rows_table(Entity::Account.spec(), &[], &[]).is_empty());
    }

    #[test]
    fn test_long_cells_are_cut() {
        let long = "x".repeat(100);
        let text = cell(&Value::Text(long));
        assert_eq!(text.chars().count(), MAX_CELL);
        assert!(text.ends_with('…'));
        assert_eq!(cell(&Value::Bool(true)), "yes");
    }
}
