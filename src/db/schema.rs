//! Schema introspection module.
//!
//! Reflects every base table of the connected database into a
//! [`SchemaDescription`]: columns with their first foreign key, table
//! constraints, and secondary indexes.
//!
//! # Architecture
//!
//! SQL queries are organized in the `queries` submodule with constants for each
//! database type. Database-specific implementations are in their respective
//! submodules (postgres, mysql, sqlite), each providing the same interface.

use crate::db::pool::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    ColumnInfo, ConstraintInfo, ConstraintKind, ForeignKeyRef, IndexInfo, SchemaDescription,
    TableSchema,
};
use std::time::Instant;
use tracing::debug;

/// Schema inspector for database introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Reflect all base tables of the connected database, ordered by name.
    pub async fn reflect(pool: &DbPool) -> AppResult<SchemaDescription> {
        let start = Instant::now();
        let description = match pool {
            DbPool::Postgres(p) => postgres::reflect(p).await?,
            DbPool::MySql(p) => mysql::reflect(p).await?,
            DbPool::Sqlite(p) => sqlite::reflect(p).await?,
        };

        debug!(
            db_type = %pool.db_type(),
            tables = description.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Reflected database schema"
        );
        Ok(description)
    }
}

/// Map a driver failure while reading `object` to a reflection error.
fn reflect_err(object: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |e| AppError::schema(e.to_string(), object)
}

/// One column of a foreign key, as read from the catalog.
#[derive(Debug, Clone)]
struct ForeignKeyColumn {
    column: String,
    references_table: String,
    references_column: String,
}

/// Attach the first foreign key found for each column.
fn apply_foreign_keys(columns: &mut [ColumnInfo], foreign_keys: &[ForeignKeyColumn]) {
    for fk in foreign_keys {
        if let Some(column) = columns.iter_mut().find(|c| c.name == fk.column) {
            if column.foreign_key.is_none() {
                column.foreign_key = Some(ForeignKeyRef::new(
                    &fk.references_table,
                    &fk.references_column,
                ));
            }
        }
    }
}

/// Split a comma-joined column list, dropping empty entries.
fn split_columns(joined: Option<String>) -> Vec<String> {
    joined
        .map(|s| {
            s.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Build a constraint from a catalog row.
///
/// Rows that name no columns are skipped: MySQL reports CHECK constraints
/// without KEY_COLUMN_USAGE entries, and expression-only checks have none.
fn catalog_constraint(
    constraint_type: &str,
    columns: Vec<String>,
    name: Option<String>,
) -> Option<ConstraintInfo> {
    let kind = ConstraintKind::parse(constraint_type)?;
    if columns.is_empty() {
        return None;
    }
    let constraint = ConstraintInfo::new(kind, columns);
    Some(match name {
        Some(name) => constraint.with_name(name),
        None => constraint,
    })
}

// =============================================================================
// SQL Query Templates
// =============================================================================
//
// Centralized SQL queries for schema introspection. Each database has its own
// submodule with queries adapted to its specific system catalogs.

mod queries {
    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            c.column_name::text AS column_name,
            format_type(a.atttypid, a.atttypmod) AS column_type,
            c.is_nullable::text AS is_nullable,
            c.column_default::text AS column_default,
            c.is_identity::text AS is_identity,
            EXISTS (
                SELECT 1 FROM pg_index ix
                WHERE ix.indrelid = t.oid
                AND ix.indisprimary
                AND a.attnum = ANY(ix.indkey)
            ) AS is_primary_key
        FROM information_schema.columns c
        JOIN pg_namespace n ON n.nspname = c.table_schema
        JOIN pg_class t ON t.relname = c.table_name AND t.relnamespace = n.oid
        JOIN pg_attribute a ON a.attrelid = t.oid AND a.attname = c.column_name
        WHERE c.table_name = $1 AND c.table_schema = current_schema()
        ORDER BY c.ordinal_position
        "#;

        pub const DESCRIBE_FOREIGN_KEYS: &str = r#"
        SELECT
            att.attname::text AS column_name,
            ref.relname::text AS foreign_table_name,
            ratt.attname::text AS foreign_column_name
        FROM pg_constraint con
        JOIN pg_class t ON t.oid = con.conrelid
        JOIN pg_namespace n ON n.oid = t.relnamespace
        JOIN pg_class ref ON ref.oid = con.confrelid
        CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, refnum, ord)
        JOIN pg_attribute att ON att.attrelid = con.conrelid AND att.attnum = k.attnum
        JOIN pg_attribute ratt ON ratt.attrelid = con.confrelid AND ratt.attnum = k.refnum
        WHERE con.contype = 'f'
        AND t.relname = $1
        AND n.nspname = current_schema()
        ORDER BY con.conname, k.ord
        "#;

        pub const DESCRIBE_CONSTRAINTS: &str = r#"
        SELECT
            con.conname::text AS constraint_name,
            CASE con.contype
                WHEN 'p' THEN 'PRIMARY KEY'
                WHEN 'f' THEN 'FOREIGN KEY'
                WHEN 'u' THEN 'UNIQUE'
                ELSE 'CHECK'
            END AS constraint_type,
            ARRAY(
                SELECT a.attname::text
                FROM unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
                JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
                ORDER BY k.ord
            ) AS column_names
        FROM pg_constraint con
        JOIN pg_class t ON t.oid = con.conrelid
        JOIN pg_namespace n ON n.oid = t.relnamespace
        WHERE t.relname = $1
        AND n.nspname = current_schema()
        AND con.contype IN ('p', 'f', 'u', 'c')
        ORDER BY
            CASE con.contype WHEN 'p' THEN 0 WHEN 'f' THEN 1 WHEN 'u' THEN 2 ELSE 3 END,
            con.conname
        "#;

        pub const DESCRIBE_INDEXES: &str = r#"
        SELECT
            i.relname::text AS index_name,
            array_agg(a.attname::text ORDER BY array_position(ix.indkey, a.attnum)) AS column_names,
            ix.indisunique AS is_unique
        FROM pg_index ix
        JOIN pg_class i ON i.oid = ix.indexrelid
        JOIN pg_class t ON t.oid = ix.indrelid
        JOIN pg_namespace n ON n.oid = t.relnamespace
        JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
        WHERE t.relname = $1
        AND n.nspname = current_schema()
        AND NOT ix.indisprimary
        AND NOT EXISTS (
            SELECT 1 FROM pg_constraint c
            WHERE c.conindid = ix.indexrelid
            AND c.conrelid = ix.indrelid
            AND c.contype IN ('p', 'u', 'x')
        )
        GROUP BY i.relname, ix.indisunique
        ORDER BY i.relname
        "#;
    }

    pub mod mysql {
        pub const LIST_TABLES: &str = r#"
            SELECT CONVERT(TABLE_NAME USING utf8) AS TABLE_NAME
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE()
            AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            CONVERT(COLUMN_NAME USING utf8) AS COLUMN_NAME,
            CONVERT(COLUMN_TYPE USING utf8) AS COLUMN_TYPE,
            CONVERT(IS_NULLABLE USING utf8) AS IS_NULLABLE,
            CONVERT(COLUMN_DEFAULT USING utf8) AS COLUMN_DEFAULT,
            CONVERT(COLUMN_KEY USING utf8) AS COLUMN_KEY,
            CONVERT(EXTRA USING utf8) AS EXTRA
        FROM information_schema.COLUMNS
        WHERE TABLE_NAME = ? AND TABLE_SCHEMA = DATABASE()
        ORDER BY ORDINAL_POSITION
        "#;

        pub const DESCRIBE_FOREIGN_KEYS: &str = r#"
        SELECT
            CONVERT(COLUMN_NAME USING utf8) AS COLUMN_NAME,
            CONVERT(REFERENCED_TABLE_NAME USING utf8) AS REFERENCED_TABLE_NAME,
            CONVERT(REFERENCED_COLUMN_NAME USING utf8) AS REFERENCED_COLUMN_NAME
        FROM information_schema.KEY_COLUMN_USAGE
        WHERE TABLE_NAME = ?
        AND TABLE_SCHEMA = DATABASE()
        AND REFERENCED_TABLE_NAME IS NOT NULL
        ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
        "#;

        pub const DESCRIBE_CONSTRAINTS: &str = r#"
        SELECT
            CONVERT(tc.CONSTRAINT_NAME USING utf8) AS CONSTRAINT_NAME,
            CONVERT(tc.CONSTRAINT_TYPE USING utf8) AS CONSTRAINT_TYPE,
            CONVERT(GROUP_CONCAT(kcu.COLUMN_NAME ORDER BY kcu.ORDINAL_POSITION) USING utf8) AS COLUMN_NAMES
        FROM information_schema.TABLE_CONSTRAINTS tc
        LEFT JOIN information_schema.KEY_COLUMN_USAGE kcu
            ON kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
            AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
            AND kcu.TABLE_NAME = tc.TABLE_NAME
        WHERE tc.TABLE_NAME = ? AND tc.TABLE_SCHEMA = DATABASE()
        GROUP BY tc.CONSTRAINT_NAME, tc.CONSTRAINT_TYPE
        ORDER BY
            FIELD(tc.CONSTRAINT_TYPE, 'PRIMARY KEY', 'FOREIGN KEY', 'UNIQUE', 'CHECK'),
            tc.CONSTRAINT_NAME
        "#;

        pub const DESCRIBE_INDEXES: &str = r#"
        SELECT
            CONVERT(s.INDEX_NAME USING utf8) AS INDEX_NAME,
            CONVERT(GROUP_CONCAT(s.COLUMN_NAME ORDER BY s.SEQ_IN_INDEX) USING utf8) AS COLUMN_NAMES,
            CAST(MIN(s.NON_UNIQUE) AS SIGNED) AS NON_UNIQUE
        FROM information_schema.STATISTICS s
        WHERE s.TABLE_NAME = ?
        AND s.TABLE_SCHEMA = DATABASE()
        AND s.INDEX_NAME <> 'PRIMARY'
        AND s.INDEX_NAME NOT IN (
            SELECT tc.CONSTRAINT_NAME
            FROM information_schema.TABLE_CONSTRAINTS tc
            WHERE tc.TABLE_SCHEMA = s.TABLE_SCHEMA
            AND tc.TABLE_NAME = s.TABLE_NAME
        )
        GROUP BY s.INDEX_NAME
        ORDER BY s.INDEX_NAME
        "#;
    }

    pub mod sqlite {
        pub const LIST_TABLES: &str = r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
            ORDER BY name
            "#;
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod postgres {
    use super::*;
    use sqlx::{PgPool, Row};

    pub async fn reflect(pool: &PgPool) -> AppResult<SchemaDescription> {
        let rows = sqlx::query(queries::postgres::LIST_TABLES)
            .fetch_all(pool)
            .await
            .map_err(reflect_err("information_schema.tables"))?;

        let mut description = SchemaDescription::new();
        for row in &rows {
            let name: String = row
                .try_get("table_name")
                .map_err(reflect_err("information_schema.tables"))?;
            description.insert(describe_table(pool, &name).await?);
        }
        Ok(description)
    }

    async fn describe_table(pool: &PgPool, table_name: &str) -> AppResult<TableSchema> {
        let mut columns = fetch_columns(pool, table_name).await?;
        let foreign_keys = fetch_foreign_keys(pool, table_name).await?;
        apply_foreign_keys(&mut columns, &foreign_keys);

        Ok(TableSchema {
            table_name: table_name.to_string(),
            columns,
            constraints: fetch_constraints(pool, table_name).await?,
            indexes: fetch_indexes(pool, table_name).await?,
        })
    }

    async fn fetch_columns(pool: &PgPool, table_name: &str) -> AppResult<Vec<ColumnInfo>> {
        let rows = sqlx::query(queries::postgres::DESCRIBE_COLUMNS)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(reflect_err(table_name))?;

        rows.iter()
            .map(|row| -> AppResult<ColumnInfo> {
                let name: String = row.try_get("column_name").map_err(reflect_err(table_name))?;
                let column_type: String =
                    row.try_get("column_type").map_err(reflect_err(table_name))?;
                let nullable: String =
                    row.try_get("is_nullable").map_err(reflect_err(table_name))?;
                let default_value: Option<String> = row.try_get("column_default").ok().flatten();
                let is_identity: Option<String> = row.try_get("is_identity").ok().flatten();
                let is_pk: bool = row
                    .try_get("is_primary_key")
                    .map_err(reflect_err(table_name))?;

                let autoincrement = is_identity.as_deref() == Some("YES")
                    || default_value
                        .as_deref()
                        .is_some_and(|d| d.starts_with("nextval("));

                let mut col = ColumnInfo::new(&name, &column_type, nullable == "YES")
                    .with_primary_key(is_pk)
                    .with_autoincrement(autoincrement);
                if let Some(def) = default_value {
                    col = col.with_default(def);
                }
                Ok(col)
            })
            .collect()
    }

    async fn fetch_foreign_keys(
        pool: &PgPool,
        table_name: &str,
    ) -> AppResult<Vec<ForeignKeyColumn>> {
        let rows = sqlx::query(queries::postgres::DESCRIBE_FOREIGN_KEYS)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(reflect_err(table_name))?;

        rows.iter()
            .map(|row| -> AppResult<ForeignKeyColumn> {
                Ok(ForeignKeyColumn {
                    column: row.try_get("column_name").map_err(reflect_err(table_name))?,
                    references_table: row
                        .try_get("foreign_table_name")
                        .map_err(reflect_err(table_name))?,
                    references_column: row
                        .try_get("foreign_column_name")
                        .map_err(reflect_err(table_name))?,
                })
            })
            .collect()
    }

    async fn fetch_constraints(pool: &PgPool, table_name: &str) -> AppResult<Vec<ConstraintInfo>> {
        let rows = sqlx::query(queries::postgres::DESCRIBE_CONSTRAINTS)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(reflect_err(table_name))?;

        let mut constraints = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row
                .try_get("constraint_name")
                .map_err(reflect_err(table_name))?;
            let type_str: String = row
                .try_get("constraint_type")
                .map_err(reflect_err(table_name))?;
            let columns: Vec<String> = row
                .try_get("column_names")
                .map_err(reflect_err(table_name))?;

            constraints.extend(catalog_constraint(&type_str, columns, Some(name)));
        }
        Ok(constraints)
    }

    async fn fetch_indexes(pool: &PgPool, table_name: &str) -> AppResult<Vec<IndexInfo>> {
        let rows = sqlx::query(queries::postgres::DESCRIBE_INDEXES)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(reflect_err(table_name))?;

        let mut indexes = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("index_name").map_err(reflect_err(table_name))?;
            let columns: Vec<String> = row
                .try_get("column_names")
                .map_err(reflect_err(table_name))?;
            let is_unique: bool = row.try_get("is_unique").map_err(reflect_err(table_name))?;

            if !columns.is_empty() {
                indexes.push(IndexInfo::new(name, columns).with_unique(is_unique));
            }
        }
        Ok(indexes)
    }
}

mod mysql {
    use super::*;
    use sqlx::{MySqlPool, Row};

    /// Safely get a string from a MySQL row.
    /// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
    fn get_string(row: &sqlx::mysql::MySqlRow, column: &str) -> String {
        get_optional_string(row, column).unwrap_or_default()
    }

    /// Safely get an optional string from a MySQL row.
    fn get_optional_string(row: &sqlx::mysql::MySqlRow, column: &str) -> Option<String> {
        row.try_get::<Option<String>, _>(column)
            .ok()
            .flatten()
            .or_else(|| {
                row.try_get::<Option<Vec<u8>>, _>(column)
                    .ok()
                    .flatten()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
    }

    /// Integer columns come back as INT or BIGINT depending on the server version.
    fn get_i64(row: &sqlx::mysql::MySqlRow, column: &str) -> Option<i64> {
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(column) {
            return Some(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(column) {
            return Some(v as i64);
        }
        row.try_get::<Option<u64>, _>(column)
            .ok()
            .flatten()
            .map(|v| v as i64)
    }

    pub async fn reflect(pool: &MySqlPool) -> AppResult<SchemaDescription> {
        let rows = sqlx::query(queries::mysql::LIST_TABLES)
            .fetch_all(pool)
            .await
            .map_err(reflect_err("information_schema.TABLES"))?;

        let mut description = SchemaDescription::new();
        for row in &rows {
            let name = get_string(row, "TABLE_NAME");
            if name.is_empty() {
                continue;
            }
            description.insert(describe_table(pool, &name).await?);
        }
        Ok(description)
    }

    async fn describe_table(pool: &MySqlPool, table_name: &str) -> AppResult<TableSchema> {
        let mut columns = fetch_columns(pool, table_name).await?;
        let foreign_keys = fetch_foreign_keys(pool, table_name).await?;
        apply_foreign_keys(&mut columns, &foreign_keys);

        Ok(TableSchema {
            table_name: table_name.to_string(),
            columns,
            constraints: fetch_constraints(pool, table_name).await?,
            indexes: fetch_indexes(pool, table_name).await?,
        })
    }

    async fn fetch_columns(pool: &MySqlPool, table_name: &str) -> AppResult<Vec<ColumnInfo>> {
        let rows = sqlx::query(queries::mysql::DESCRIBE_COLUMNS)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(reflect_err(table_name))?;

        Ok(rows
            .iter()
            .map(|row| {
                let name = get_string(row, "COLUMN_NAME");
                let column_type = get_string(row, "COLUMN_TYPE");
                let nullable = get_string(row, "IS_NULLABLE");
                let default_value = get_optional_string(row, "COLUMN_DEFAULT");
                let column_key = get_string(row, "COLUMN_KEY");
                let extra = get_string(row, "EXTRA");

                let mut col = ColumnInfo::new(&name, &column_type, nullable == "YES")
                    .with_primary_key(column_key == "PRI")
                    .with_autoincrement(extra.to_lowercase().contains("auto_increment"));
                if let Some(def) = default_value {
                    col = col.with_default(def);
                }
                col
            })
            .collect())
    }

    async fn fetch_foreign_keys(
        pool: &MySqlPool,
        table_name: &str,
    ) -> AppResult<Vec<ForeignKeyColumn>> {
        let rows = sqlx::query(queries::mysql::DESCRIBE_FOREIGN_KEYS)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(reflect_err(table_name))?;

        Ok(rows
            .iter()
            .map(|row| ForeignKeyColumn {
                column: get_string(row, "COLUMN_NAME"),
                references_table: get_string(row, "REFERENCED_TABLE_NAME"),
                references_column: get_string(row, "REFERENCED_COLUMN_NAME"),
            })
            .collect())
    }

    async fn fetch_constraints(
        pool: &MySqlPool,
        table_name: &str,
    ) -> AppResult<Vec<ConstraintInfo>> {
        let rows = sqlx::query(queries::mysql::DESCRIBE_CONSTRAINTS)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(reflect_err(table_name))?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                catalog_constraint(
                    &get_string(row, "CONSTRAINT_TYPE"),
                    split_columns(get_optional_string(row, "COLUMN_NAMES")),
                    get_optional_string(row, "CONSTRAINT_NAME"),
                )
            })
            .collect())
    }

    async fn fetch_indexes(pool: &MySqlPool, table_name: &str) -> AppResult<Vec<IndexInfo>> {
        let rows = sqlx::query(queries::mysql::DESCRIBE_INDEXES)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(reflect_err(table_name))?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let name = get_string(row, "INDEX_NAME");
                let columns = split_columns(get_optional_string(row, "COLUMN_NAMES"));
                let non_unique = get_i64(row, "NON_UNIQUE").unwrap_or(1);
                if columns.is_empty() {
                    None
                } else {
                    Some(IndexInfo::new(name, columns).with_unique(non_unique == 0))
                }
            })
            .collect())
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Row, SqlitePool};

    /// Quote a name for use inside a PRAGMA argument.
    fn quote(name: &str) -> String {
        format!("'{}'", name.replace('\'', "''"))
    }

    pub async fn reflect(pool: &SqlitePool) -> AppResult<SchemaDescription> {
        let rows = sqlx::query(queries::sqlite::LIST_TABLES)
            .fetch_all(pool)
            .await
            .map_err(reflect_err("sqlite_master"))?;

        let mut description = SchemaDescription::new();
        for row in &rows {
            let name: String = row.try_get("name").map_err(reflect_err("sqlite_master"))?;
            description.insert(describe_table(pool, &name).await?);
        }
        Ok(description)
    }

    async fn describe_table(pool: &SqlitePool, table_name: &str) -> AppResult<TableSchema> {
        let (mut columns, pk_columns) = fetch_columns(pool, table_name).await?;
        let foreign_keys = fetch_foreign_keys(pool, table_name).await?;
        apply_foreign_keys(
            &mut columns,
            &foreign_keys
                .iter()
                .flat_map(|(_, cols)| cols.iter().cloned())
                .collect::<Vec<_>>(),
        );

        let mut constraints = Vec::new();
        if !pk_columns.is_empty() {
            constraints.push(ConstraintInfo::new(
                ConstraintKind::PrimaryKeyConstraint,
                pk_columns,
            ));
        }
        for (_, cols) in &foreign_keys {
            constraints.push(ConstraintInfo::new(
                ConstraintKind::ForeignKeyConstraint,
                cols.iter().map(|c| c.column.clone()).collect(),
            ));
        }

        let (unique_constraints, indexes) = fetch_indexes(pool, table_name).await?;
        constraints.extend(unique_constraints);

        Ok(TableSchema {
            table_name: table_name.to_string(),
            columns,
            constraints,
            indexes,
        })
    }

    /// Read `PRAGMA table_info`; also returns primary key columns in key order.
    async fn fetch_columns(
        pool: &SqlitePool,
        table_name: &str,
    ) -> AppResult<(Vec<ColumnInfo>, Vec<String>)> {
        let pragma_query = format!("PRAGMA table_info({})", quote(table_name));
        let rows = sqlx::query(&pragma_query)
            .fetch_all(pool)
            .await
            .map_err(reflect_err(table_name))?;

        let mut columns = Vec::with_capacity(rows.len());
        let mut pk_positions: Vec<(i64, String)> = Vec::new();
        for row in &rows {
            let name: String = row.try_get("name").map_err(reflect_err(table_name))?;
            let data_type: String = row.try_get("type").unwrap_or_default();
            let notnull: i64 = row.try_get("notnull").map_err(reflect_err(table_name))?;
            let default_value: Option<String> = row.try_get("dflt_value").ok().flatten();
            let pk: i64 = row.try_get("pk").map_err(reflect_err(table_name))?;

            if pk > 0 {
                pk_positions.push((pk, name.clone()));
            }

            let mut col = ColumnInfo::new(&name, &data_type, notnull == 0).with_primary_key(pk > 0);
            if let Some(def) = default_value {
                col = col.with_default(def);
            }
            columns.push(col);
        }

        // INTEGER PRIMARY KEY aliases the rowid and autoincrements.
        let rowid_alias = pk_positions.len() == 1;
        for col in &mut columns {
            let is_rowid = rowid_alias && col.primary_key && col.data_type.eq_ignore_ascii_case("INTEGER");
            col.autoincrement = Some(is_rowid);
        }

        pk_positions.sort_by_key(|(pos, _)| *pos);
        let pk_columns = pk_positions.into_iter().map(|(_, name)| name).collect();
        Ok((columns, pk_columns))
    }

    /// Foreign keys grouped by constraint id, columns in key order.
    async fn fetch_foreign_keys(
        pool: &SqlitePool,
        table_name: &str,
    ) -> AppResult<Vec<(i64, Vec<ForeignKeyColumn>)>> {
        let fk_query = format!("PRAGMA foreign_key_list({})", quote(table_name));
        let rows = sqlx::query(&fk_query)
            .fetch_all(pool)
            .await
            .map_err(reflect_err(table_name))?;

        let mut groups: Vec<(i64, Vec<ForeignKeyColumn>)> = Vec::new();
        for row in &rows {
            let id: i64 = row.try_get("id").map_err(reflect_err(table_name))?;
            let column: String = row.try_get("from").map_err(reflect_err(table_name))?;
            let ref_table: String = row.try_get("table").map_err(reflect_err(table_name))?;
            let ref_column: Option<String> = row.try_get("to").ok().flatten();

            // `REFERENCES t` without a column list targets t's primary key
            let ref_column = match ref_column {
                Some(c) => c,
                None => primary_key_column(pool, &ref_table)
                    .await?
                    .unwrap_or_default(),
            };

            let fk = ForeignKeyColumn {
                column,
                references_table: ref_table,
                references_column: ref_column,
            };
            match groups.iter_mut().find(|(gid, _)| *gid == id) {
                Some((_, cols)) => cols.push(fk),
                None => groups.push((id, vec![fk])),
            }
        }

        // PRAGMA lists constraints newest-first
        groups.sort_by_key(|(id, _)| std::cmp::Reverse(*id));
        Ok(groups)
    }

    async fn primary_key_column(pool: &SqlitePool, table_name: &str) -> AppResult<Option<String>> {
        let pragma_query = format!("PRAGMA table_info({})", quote(table_name));
        let rows = sqlx::query(&pragma_query)
            .fetch_all(pool)
            .await
            .map_err(reflect_err(table_name))?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let pk: i64 = row.try_get("pk").ok()?;
                let name: String = row.try_get("name").ok()?;
                (pk == 1).then_some(name)
            })
            .next())
    }

    /// Split `PRAGMA index_list` into UNIQUE constraints and explicit indexes.
    ///
    /// Primary-key indexes (origin `pk`) are skipped.
    async fn fetch_indexes(
        pool: &SqlitePool,
        table_name: &str,
    ) -> AppResult<(Vec<ConstraintInfo>, Vec<IndexInfo>)> {
        let idx_query = format!("PRAGMA index_list({})", quote(table_name));
        let idx_list = sqlx::query(&idx_query)
            .fetch_all(pool)
            .await
            .map_err(reflect_err(table_name))?;

        let mut unique_constraints = Vec::new();
        let mut indexes = Vec::new();
        for idx_row in &idx_list {
            let name: String = idx_row.try_get("name").map_err(reflect_err(table_name))?;
            let is_unique: i64 = idx_row.try_get("unique").unwrap_or(0);
            let origin: String = idx_row.try_get("origin").unwrap_or_default();

            let columns = fetch_index_columns(pool, &name).await?;
            if columns.is_empty() {
                continue;
            }

            match origin.as_str() {
                "pk" => {}
                "u" => unique_constraints.push(ConstraintInfo::new(
                    ConstraintKind::UniqueConstraint,
                    columns,
                )),
                _ => indexes.push(IndexInfo::new(name, columns).with_unique(is_unique != 0)),
            }
        }

        // index_list is newest-first; report in creation order
        unique_constraints.reverse();
        indexes.reverse();
        Ok((unique_constraints, indexes))
    }

    async fn fetch_index_columns(pool: &SqlitePool, index_name: &str) -> AppResult<Vec<String>> {
        let query = format!("PRAGMA index_info({})", quote(index_name));
        let rows = sqlx::query(&query)
            .fetch_all(pool)
            .await
            .map_err(reflect_err(index_name))?;

        // Expression index entries have no column name
        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<Option<String>, _>("name").ok().flatten())
            .collect())
    }
}
