use crate::db::SchemaSnapshot;

/// Tables whose name, or one of whose column names, occurs in `query`
/// (case-insensitive substring). Falls back to every table when nothing
/// matches, so the result is never an empty restriction.
pub fn relevant_tables(snapshot: &SchemaSnapshot, query: &str) -> Vec<String> {
    let query = query.to_lowercase();

    let matched: Vec<String> = snapshot
        .tables
        .iter()
        .filter(|(name, table)| {
            query.contains(&name.to_lowercase())
                || table
                    .columns
                    .iter()
                    .any(|col| query.contains(&col.name.to_lowercase()))
        })
        .map(|(name, _)| name.clone())
        .collect();

    if matched.is_empty() {
        snapshot.table_names()
    } else {
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ColumnInfo, TableInfo};
    use chrono::Utc;

    fn table(columns: &[&str]) -> TableInfo {
        TableInfo {
            columns: columns
                .iter()
                .map(|name| ColumnInfo {
                    name: name.to_string(),
                    data_type: "text".to_string(),
                    nullable: true,
                    default: None,
                })
                .collect(),
            ..TableInfo::default()
        }
    }

    fn snapshot() -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot::new(Utc::now());
        snapshot.tables.insert("customers".to_string(), table(&["customer_ref", "email"]));
        snapshot.tables.insert("orders".to_string(), table(&["order_ref", "total"]));
        snapshot.tables.insert("products".to_string(), table(&["sku", "price"]));
        snapshot
    }

    #[test]
    fn test_table_name_match_is_case_insensitive() {
        let result = relevant_tables(&snapshot(), "How many ORDERS were placed yesterday?");
        assert_eq!(result, vec!["orders".to_string()]);
    }

    #[test]
    fn test_column_name_match() {
        let result = relevant_tables(&snapshot(), "list every Email address");
        assert_eq!(result, vec!["customers".to_string()]);
    }

    #[test]
    fn test_multiple_matches_keep_name_order() {
        let result = relevant_tables(&snapshot(), "price of each sku per order_ref");
        assert_eq!(result, vec!["orders".to_string(), "products".to_string()]);
    }

    #[test]
    fn test_no_match_falls_back_to_all_tables() {
        let result = relevant_tables(&snapshot(), "hello there");
        assert_eq!(result, snapshot().table_names());
    }

    #[test]
    fn test_empty_snapshot_yields_empty_list() {
        let empty = SchemaSnapshot::new(Utc::now());
        assert!(relevant_tables(&empty, "orders").is_empty());
    }
}
