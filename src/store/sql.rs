// src/store/sql.rs

//! Statement text. Table and column names come from the catalog, so they are
//! validated and quoted here and nowhere else; row values are always bound.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ColumnType, TableSchema};
use crate::error::{LoadError, Result};

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("identifier regex"));

/// Double-quote an identifier after checking it is a plain lower-case name.
pub fn quote_ident(name: &str) -> Result<String> {
    if !IDENT_RE.is_match(name) {
        return Err(LoadError::drift(
            name,
            "not usable as a SQL identifier (expected [a-z_][a-z0-9_]*)",
        ));
    }
    Ok(format!("\"{}\"", name))
}

pub fn column_type_sql(ty: ColumnType) -> String {
    match ty {
        ColumnType::Varchar(width) => format!("varchar({})", width),
        ColumnType::Integer => "integer".to_string(),
        ColumnType::BigInt => "bigint".to_string(),
    }
}

pub fn drop_table(schema: &TableSchema) -> Result<String> {
    Ok(format!("DROP TABLE IF EXISTS {}", quote_ident(&schema.name)?))
}

/// `CREATE TABLE` with a serial `id` key ahead of the schema's columns.
pub fn create_table(schema: &TableSchema) -> Result<String> {
    let mut sql = format!(
        "CREATE TABLE {} (id SERIAL PRIMARY KEY",
        quote_ident(&schema.name)?
    );
    for col in &schema.columns {
        sql.push_str(", ");
        sql.push_str(&quote_ident(&col.name)?);
        sql.push(' ');
        sql.push_str(&column_type_sql(col.ty));
    }
    sql.push(')');
    Ok(sql)
}

/// `INSERT` with one `$n` placeholder per column, in schema order.
pub fn insert_row(schema: &TableSchema) -> Result<String> {
    let names = schema
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Result<Vec<_>>>()?;
    let params: Vec<String> = (1..=names.len()).map(|i| format!("${}", i)).collect();
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(&schema.name)?,
        names.join(", "),
        params.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ColumnDef;

    fn schema() -> TableSchema {
        TableSchema {
            name: "p11".into(),
            columns: vec![
                ColumnDef::new("logrecno", ColumnType::Varchar(7)),
                ColumnDef::new("p0110001", ColumnType::Integer),
                ColumnDef::new("arealand", ColumnType::BigInt),
            ],
        }
    }

    #[test]
    fn test_identifiers_are_validated_and_quoted() {
        assert_eq!(quote_ident("p0110001").unwrap(), "\"p0110001\"");
        assert_eq!(quote_ident("geo_locations").unwrap(), "\"geo_locations\"");
        for bad in ["", "P11", "p11; drop table x", "1abc", "a\"b", "a b"] {
            assert!(quote_ident(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_ddl_text() {
        let s = schema();
        assert_eq!(drop_table(&s).unwrap(), "DROP TABLE IF EXISTS \"p11\"");
        assert_eq!(
            create_table(&s).unwrap(),
            "CREATE TABLE \"p11\" (id SERIAL PRIMARY KEY, \"logrecno\" varchar(7), \
             \"p0110001\" integer, \"arealand\" bigint)"
        );
    }

    #[test]
    fn test_insert_uses_placeholders() {
        assert_eq!(
            insert_row(&schema()).unwrap(),
            "INSERT INTO \"p11\" (\"logrecno\", \"p0110001\", \"arealand\") VALUES ($1, $2, $3)"
        );
    }
}
