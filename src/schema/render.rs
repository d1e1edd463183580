//! Compact schema text for inclusion in a language-model prompt.
//!
//! Output is a pure function of the snapshot: tables sorted by name,
//! columns in catalog order, foreign keys in snapshot order, then a
//! metadata footer.

use chrono::SecondsFormat;

use crate::db::{SchemaSnapshot, TableInfo};

pub const SCHEMA_HEADER: &str = "=== DATABASE SCHEMA ===";
pub const FOREIGN_KEY_HEADER: &str = "=== FOREIGN KEY RELATIONSHIPS ===";
pub const METADATA_HEADER: &str = "=== METADATA ===";

pub fn render_schema(snapshot: &SchemaSnapshot) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("{}\n", SCHEMA_HEADER));

    // BTreeMap iteration is already alphabetical
    for (name, table) in &snapshot.tables {
        render_table(&mut lines, name, table);
    }

    if !snapshot.foreign_keys.is_empty() {
        lines.push(format!("\n{}", FOREIGN_KEY_HEADER));
        for fk in &snapshot.foreign_keys {
            lines.push(format!(
                "{}.{} -> {}.{}",
                fk.source_table, fk.source_column, fk.target_table, fk.target_column
            ));
        }
    }

    lines.push(format!("\n{}", METADATA_HEADER));
    lines.push(format!("Total Tables: {}", snapshot.tables.len()));
    lines.push(format!(
        "Extracted At: {}",
        snapshot
            .extracted_at
            .to_rfc3339_opts(SecondsFormat::Micros, true)
    ));

    lines.join("\n")
}

fn render_table(lines: &mut Vec<String>, name: &str, table: &TableInfo) {
    if table.primary_keys.is_empty() {
        lines.push(format!("\n{}:", name));
    } else {
        lines.push(format!("\n{} [PK: {}]:", name, table.primary_keys.join(", ")));
    }

    for col in &table.columns {
        let mut line = format!("  - {}: {}", col.name, col.data_type);
        if !col.nullable {
            line.push_str(" NOT NULL");
        }
        if let Some(default) = col.default.as_deref().filter(|d| !d.is_empty()) {
            line.push_str(" DEFAULT ");
            line.push_str(default);
        }
        if table.is_primary_key(&col.name) {
            line.push_str(" (PK)");
        }
        lines.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ColumnInfo, ForeignKeyEdge};
    use chrono::{TimeZone, Utc};

    fn column(name: &str, data_type: &str, nullable: bool, default: Option<&str>) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable,
            default: default.map(str::to_string),
        }
    }

    fn orders_and_customers() -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot::new(Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap());
        snapshot.tables.insert(
            "orders".to_string(),
            TableInfo {
                columns: vec![
                    column("id", "integer", false, Some("nextval('orders_id_seq'::regclass)")),
                    column("customer_id", "integer", true, None),
                    column("total", "numeric(10,2)", false, None),
                ],
                primary_keys: vec!["id".to_string()],
                indexes: vec![],
            },
        );
        snapshot.tables.insert(
            "customers".to_string(),
            TableInfo {
                columns: vec![
                    column("id", "integer", false, None),
                    column("name", "text", true, None),
                ],
                primary_keys: vec!["id".to_string()],
                indexes: vec![],
            },
        );
        snapshot.foreign_keys.push(ForeignKeyEdge {
            source_table: "orders".to_string(),
            source_column: "customer_id".to_string(),
            target_table: "customers".to_string(),
            target_column: "id".to_string(),
            constraint_name: "orders_customer_id_fkey".to_string(),
        });
        snapshot
    }

    #[test]
    fn test_render_full_layout() {
        let text = render_schema(&orders_and_customers());
        let expected = [
            "=== DATABASE SCHEMA ===",
            "",
            "",
            "customers [PK: id]:",
            "  - id: integer NOT NULL (PK)",
            "  - name: text",
            "",
            "orders [PK: id]:",
            "  - id: integer NOT NULL DEFAULT nextval('orders_id_seq'::regclass) (PK)",
            "  - customer_id: integer",
            "  - total: numeric(10,2) NOT NULL",
            "",
            "=== FOREIGN KEY RELATIONSHIPS ===",
            "orders.customer_id -> customers.id",
            "",
            "=== METADATA ===",
            "Total Tables: 2",
            "Extracted At: 2024-03-15T08:00:00.000000Z",
        ]
        .join("\n");
        assert_eq!(text, expected);
    }

    #[test]
    fn test_customers_rendered_before_orders() {
        let text = render_schema(&orders_and_customers());
        let customers = text.find("customers [PK: id]:").unwrap();
        let orders = text.find("orders [PK: id]:").unwrap();
        assert!(customers < orders);
    }

    #[test]
    fn test_render_is_deterministic() {
        let snapshot = orders_and_customers();
        assert_eq!(render_schema(&snapshot), render_schema(&snapshot));
    }

    #[test]
    fn test_table_without_pk_has_no_bracket() {
        let mut snapshot = SchemaSnapshot::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        snapshot.tables.insert(
            "events".to_string(),
            TableInfo {
                columns: vec![column("payload", "jsonb", true, None)],
                ..TableInfo::default()
            },
        );

        let text = render_schema(&snapshot);
        assert!(text.contains("\nevents:\n  - payload: jsonb\n"));
        assert!(!text.contains("[PK"));
        assert!(!text.contains(FOREIGN_KEY_HEADER));
    }

    #[test]
    fn test_composite_primary_key() {
        let mut snapshot = SchemaSnapshot::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        snapshot.tables.insert(
            "order_items".to_string(),
            TableInfo {
                columns: vec![
                    column("order_id", "integer", false, None),
                    column("product_id", "integer", false, None),
                    column("qty", "integer", false, Some("")),
                ],
                primary_keys: vec!["order_id".to_string(), "product_id".to_string()],
                indexes: vec![],
            },
        );

        let text = render_schema(&snapshot);
        assert!(text.contains("order_items [PK: order_id, product_id]:"));
        assert!(text.contains("  - product_id: integer NOT NULL (PK)"));
        // empty default is treated as absent
        assert!(text.contains("  - qty: integer NOT NULL\n"));
    }

    #[test]
    fn test_empty_snapshot_still_has_footer() {
        let snapshot = SchemaSnapshot::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let text = render_schema(&snapshot);
        assert!(text.starts_with(SCHEMA_HEADER));
        assert!(text.contains("Total Tables: 0"));
    }
}
