//! SQL text used by the PostgreSQL store.
//!
//! Identifiers are spliced in through [`quote_pg`]; every value is a bound
//! parameter. Key values travel as text and are cast back to the key
//! column's own type, so one statement shape covers every key type.

use crate::core::identifier::{qualify_pg, quote_pg, validate_type_name};
use crate::core::schema::ColumnDescriptor;
use crate::error::Result;

/// Text-like columns of updatable base tables in a schema.
pub const TEXT_COLUMNS_SQL: &str = r#"
    SELECT
        c.table_name::text,
        c.column_name::text,
        c.data_type::text,
        c.character_maximum_length::int4
    FROM information_schema.columns c
    JOIN information_schema.tables t
      ON t.table_schema = c.table_schema
     AND t.table_name = c.table_name
    WHERE c.table_schema = $1
      AND t.table_type = 'BASE TABLE'
      AND c.is_updatable = 'YES'
      AND c.is_generated = 'NEVER'
      AND (c.data_type LIKE 'char%' OR c.data_type LIKE 'text%')
    ORDER BY c.table_name, c.column_name
"#;

/// Triggers that freeze a column, named `<table>_<column>_readonly`.
pub const READONLY_TRIGGERS_SQL: &str = r#"
    SELECT DISTINCT trigger_name::text
    FROM information_schema.triggers
    WHERE trigger_schema = $1
      AND trigger_name LIKE '%\_readonly'
"#;

/// Primary key columns of every table in a schema, in key order.
pub const PRIMARY_KEYS_SQL: &str = r#"
    SELECT
        t.relname::text,
        a.attname::text,
        format_type(a.atttypid, a.atttypmod)
    FROM pg_catalog.pg_constraint c
    JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
    JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(c.conkey)
    WHERE n.nspname = $1
      AND c.contype = 'p'
    ORDER BY t.relname, array_position(c.conkey, a.attnum)
"#;

/// Name reported for rows addressed by physical row id.
pub const ROW_ID_COLUMN: &str = "ctid";

/// Key expressions selected ahead of the value, each cast to text.
fn key_select_list(column: &ColumnDescriptor) -> Result<String> {
    if column.uses_row_id() {
        return Ok(format!("{}::text", ROW_ID_COLUMN));
    }
    let parts = column
        .key_columns
        .iter()
        .map(|k| Ok(format!("{}::text", quote_pg(&k.name)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(", "))
}

/// Number of key values a row of `column` carries.
pub fn key_width(column: &ColumnDescriptor) -> usize {
    column.key_columns.len().max(1)
}

/// Select key values and the current value of every non-null row.
///
/// With `prefilter`, `$1` is a literal the value must contain.
pub fn build_scan_query(column: &ColumnDescriptor, prefilter: bool) -> Result<String> {
    let table = qualify_pg(&column.schema, &column.table)?;
    let col = quote_pg(&column.name)?;
    let keys = key_select_list(column)?;

    let mut sql = format!(
        "SELECT {}, {}::text FROM {} WHERE {} IS NOT NULL",
        keys, col, table, col
    );
    if prefilter {
        sql.push_str(&format!(" AND strpos({}::text, $1) > 0", col));
    }
    if !column.uses_row_id() {
        let order = (1..=column.key_columns.len())
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" ORDER BY {}", order));
    }
    Ok(sql)
}

/// Single-column update of one row. `$1` is the new value, `$2..` the key
/// values as text, in key order.
pub fn build_update_query(column: &ColumnDescriptor) -> Result<String> {
    let table = qualify_pg(&column.schema, &column.table)?;
    let col = quote_pg(&column.name)?;

    let conditions = if column.uses_row_id() {
        format!("{} = CAST($2::text AS tid)", ROW_ID_COLUMN)
    } else {
        column
            .key_columns
            .iter()
            .enumerate()
            .map(|(i, k)| {
                validate_type_name(&k.sql_type)?;
                Ok(format!(
                    "{} = CAST(${}::text AS {})",
                    quote_pg(&k.name)?,
                    i + 2,
                    k.sql_type
                ))
            })
            .collect::<Result<Vec<_>>>()?
            .join(" AND ")
    };

    Ok(format!(
        "UPDATE {} SET {} = $1::text WHERE {}",
        table, col, conditions
    ))
}
