//! Read-only guard for model-generated SQL.
//!
//! The language model is untrusted input: before a generated statement runs,
//! it is parsed with [sqlparser](https://docs.rs/sqlparser/) in the dialect of
//! the connected database and classified. Only queries (SELECT, SHOW, EXPLAIN
//! of a query) pass; everything that could change data, schema, session or
//! server state is rejected with a permission error.

use crate::error::{AppError, AppResult};
use crate::models::DatabaseType;
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::{
    Dialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect,
};
use sqlparser::parser::Parser;

/// Type of SQL statement detected by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlStatementType {
    /// SELECT and other read-only queries (SELECT, SHOW, EXPLAIN, VALUES)
    Select,
    /// INSERT, UPDATE, DELETE, MERGE, COPY
    DmlWrite,
    /// CREATE, DROP, ALTER, TRUNCATE, COMMENT
    Ddl,
    /// BEGIN, COMMIT, ROLLBACK, SAVEPOINT
    Transaction,
    /// CALL, EXECUTE, PREPARE
    ProcedureCall,
    /// GRANT, REVOKE, SET, USE, LOCK, VACUUM, PRAGMA, ATTACH
    Administrative,
    Unknown,
}

impl SqlStatementType {
    fn reason(&self) -> &'static str {
        match self {
            Self::Select => "",
            Self::DmlWrite => "Generated SQL would modify data; only read-only queries are run.",
            Self::Ddl => "Generated SQL would modify the schema; only read-only queries are run.",
            Self::Transaction => "Transaction control is not allowed.",
            Self::ProcedureCall => "Procedure calls are not allowed since their effects are unknown.",
            Self::Administrative => "Administrative statements are not allowed.",
            Self::Unknown => "Unrecognized statement; only SELECT queries are allowed.",
        }
    }
}

/// Get the sqlparser dialect for the given database type.
fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::Postgres => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySql => Box::new(MySqlDialect {}),
        DatabaseType::Sqlite => Box::new(SQLiteDialect {}),
        DatabaseType::MsSql => Box::new(MsSqlDialect {}),
        DatabaseType::Oracle => Box::new(GenericDialect {}),
    }
}

/// Validate that `sql` is a single read-only statement.
///
/// # Errors
///
/// - `Validation` if the text does not parse or holds zero or several statements
/// - `Permission` if the statement is anything other than a query
///
/// # Examples
///
/// ```
/// use askdb::sql_guard::validate_readonly;
/// use askdb::models::DatabaseType;
///
/// assert!(validate_readonly("SELECT * FROM users", DatabaseType::Postgres).is_ok());
/// assert!(validate_readonly("DROP TABLE users", DatabaseType::Postgres).is_err());
/// ```
pub fn validate_readonly(sql: &str, db_type: DatabaseType) -> AppResult<()> {
    let dialect = get_dialect(db_type);

    let statements = Parser::parse_sql(dialect.as_ref(), sql).map_err(|e| {
        AppError::validation(format!("Generated SQL could not be parsed: {}", e))
    })?;

    match statements.as_slice() {
        [] => Err(AppError::validation("Generated SQL is empty")),
        [stmt] => validate_statement(stmt),
        _ => {
            // Report a write hidden behind a leading SELECT as a permission problem
            for stmt in &statements {
                validate_statement(stmt)?;
            }
            Err(AppError::validation(format!(
                "Expected a single SQL statement, got {}",
                statements.len()
            )))
        }
    }
}

/// Validate a single parsed statement.
fn validate_statement(stmt: &Statement) -> AppResult<()> {
    match classify_statement(stmt) {
        (SqlStatementType::Select, _) => Ok(()),
        (kind, operation) => Err(AppError::permission(operation, kind.reason())),
    }
}

/// Classify a parsed statement into a statement type.
pub fn classify_statement(stmt: &Statement) -> (SqlStatementType, &'static str) {
    match stmt {
        Statement::Query(query) => classify_query(query),
        Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowSchemas { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. } => (SqlStatementType::Select, "SHOW"),
        Statement::ExplainTable { .. } => (SqlStatementType::Select, "EXPLAIN TABLE"),

        // EXPLAIN ANALYZE of a write still runs the write
        Statement::Explain { statement, .. } => match classify_statement(statement) {
            (SqlStatementType::Select, _) => (SqlStatementType::Select, "EXPLAIN"),
            inner => inner,
        },

        Statement::Insert(_) => (SqlStatementType::DmlWrite, "INSERT"),
        Statement::Update { .. } => (SqlStatementType::DmlWrite, "UPDATE"),
        Statement::Delete(_) => (SqlStatementType::DmlWrite, "DELETE"),
        Statement::Merge { .. } => (SqlStatementType::DmlWrite, "MERGE"),
        Statement::Copy { .. } => (SqlStatementType::DmlWrite, "COPY"),

        Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex(_)
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateSequence { .. }
        | Statement::CreateType { .. }
        | Statement::CreateFunction { .. }
        | Statement::CreateProcedure { .. }
        | Statement::CreateTrigger { .. }
        | Statement::CreateRole { .. }
        | Statement::CreateVirtualTable { .. }
        | Statement::CreateExtension { .. }
        | Statement::CreatePolicy { .. } => (SqlStatementType::Ddl, "CREATE"),
        Statement::AlterTable { .. }
        | Statement::AlterView { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterSchema { .. }
        | Statement::AlterRole { .. }
        | Statement::AlterPolicy { .. }
        | Statement::AlterType { .. } => (SqlStatementType::Ddl, "ALTER"),
        Statement::Drop { .. }
        | Statement::DropFunction { .. }
        | Statement::DropProcedure { .. }
        | Statement::DropTrigger { .. }
        | Statement::DropPolicy { .. } => (SqlStatementType::Ddl, "DROP"),
        Statement::Truncate { .. } => (SqlStatementType::Ddl, "TRUNCATE"),
        Statement::Comment { .. } => (SqlStatementType::Ddl, "COMMENT"),

        Statement::StartTransaction { .. } => (SqlStatementType::Transaction, "BEGIN"),
        Statement::Commit { .. } => (SqlStatementType::Transaction, "COMMIT"),
        Statement::Rollback { .. } => (SqlStatementType::Transaction, "ROLLBACK"),
        Statement::Savepoint { .. } | Statement::ReleaseSavepoint { .. } => {
            (SqlStatementType::Transaction, "SAVEPOINT")
        }

        Statement::Call { .. } => (SqlStatementType::ProcedureCall, "CALL"),
        Statement::Execute { .. } => (SqlStatementType::ProcedureCall, "EXECUTE"),
        Statement::Prepare { .. } | Statement::Deallocate { .. } => {
            (SqlStatementType::ProcedureCall, "PREPARE")
        }

        Statement::Grant { .. } => (SqlStatementType::Administrative, "GRANT"),
        Statement::Revoke { .. } => (SqlStatementType::Administrative, "REVOKE"),
        Statement::Set(_) => (SqlStatementType::Administrative, "SET"),
        Statement::Use(_) => (SqlStatementType::Administrative, "USE"),
        Statement::Kill { .. } => (SqlStatementType::Administrative, "KILL"),
        Statement::Vacuum { .. } => (SqlStatementType::Administrative, "VACUUM"),
        Statement::Analyze { .. } => (SqlStatementType::Administrative, "ANALYZE"),
        Statement::LockTables { .. } | Statement::UnlockTables => {
            (SqlStatementType::Administrative, "LOCK")
        }
        Statement::Flush { .. } => (SqlStatementType::Administrative, "FLUSH"),
        Statement::Pragma { .. } => (SqlStatementType::Administrative, "PRAGMA"),
        Statement::AttachDatabase { .. } => (SqlStatementType::Administrative, "ATTACH"),

        _ => (SqlStatementType::Unknown, "Unknown"),
    }
}

/// Classify a query by looking through its CTEs and body.
///
/// sqlparser parses `WITH .. DELETE`, data-modifying CTEs and `SELECT .. INTO`
/// as queries, so the outer `Statement::Query` alone says nothing.
fn classify_query(query: &Query) -> (SqlStatementType, &'static str) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            let inner = classify_query(&cte.query);
            if inner.0 != SqlStatementType::Select {
                return inner;
            }
        }
    }
    classify_set_expr(&query.body)
}

fn classify_set_expr(body: &SetExpr) -> (SqlStatementType, &'static str) {
    match body {
        // creates a table from the result
        SetExpr::Select(select) if select.into.is_some() => (SqlStatementType::Ddl, "SELECT INTO"),
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => {
            (SqlStatementType::Select, "SELECT")
        }
        SetExpr::Query(query) => classify_query(query),
        SetExpr::SetOperation { left, right, .. } => match classify_set_expr(left) {
            (SqlStatementType::Select, _) => classify_set_expr(right),
            inner => inner,
        },
        SetExpr::Insert(stmt)
        | SetExpr::Update(stmt)
        | SetExpr::Delete(stmt)
        | SetExpr::Merge(stmt) => classify_statement(stmt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PG: DatabaseType = DatabaseType::Postgres;

    fn is_permission(sql: &str, db_type: DatabaseType) -> bool {
        matches!(
            validate_readonly(sql, db_type),
            Err(AppError::Permission { .. })
        )
    }

    #[test]
    fn test_select_allowed_in_every_dialect() {
        for db_type in [
            DatabaseType::Postgres,
            DatabaseType::MySql,
            DatabaseType::Sqlite,
            DatabaseType::MsSql,
            DatabaseType::Oracle,
        ] {
            assert!(
                validate_readonly("SELECT id, name FROM users WHERE id = 1", db_type).is_ok(),
                "{:?}",
                db_type
            );
        }
    }

    #[test]
    fn test_drop_table_blocked() {
        let err = validate_readonly("DROP TABLE users", PG).unwrap_err();
        assert!(matches!(err, AppError::Permission { .. }));
        assert!(err.to_string().contains("DROP"));
    }

    #[test]
    fn test_dml_blocked() {
        assert!(is_permission("INSERT INTO users VALUES (1)", PG));
        assert!(is_permission("UPDATE users SET name = 'x'", PG));
        assert!(is_permission("DELETE FROM users", DatabaseType::Sqlite));
        assert!(is_permission(
            "INSERT INTO archive SELECT * FROM users",
            DatabaseType::MySql
        ));
    }

    #[test]
    fn test_transaction_and_admin_blocked() {
        assert!(is_permission("COMMIT", PG));
        assert!(is_permission("GRANT SELECT ON users TO bob", PG));
        assert!(is_permission("PRAGMA foreign_keys = OFF", DatabaseType::Sqlite));
    }

    #[test]
    fn test_complex_select_allowed() {
        let sql = r#"
            WITH recent AS (SELECT user_id FROM orders WHERE total > 10)
            SELECT u.name, COUNT(*) AS n
            FROM users u JOIN recent r ON r.user_id = u.id
            GROUP BY u.name
            ORDER BY n DESC
        "#;
        assert!(validate_readonly(sql, PG).is_ok());
        assert!(validate_readonly("SELECT a FROM t1 UNION ALL SELECT b FROM t2", PG).is_ok());
    }

    #[test]
    fn test_write_behind_with_clause_blocked() {
        let sql = "WITH x AS (SELECT 1) DELETE FROM users";
        let err = validate_readonly(sql, DatabaseType::Sqlite).unwrap_err();
        assert!(matches!(err, AppError::Permission { .. }));
        assert!(err.to_string().contains("DELETE"));

        assert!(is_permission(
            "WITH x AS (SELECT 1) UPDATE users SET name = 'x'",
            DatabaseType::Sqlite
        ));
        assert!(is_permission(
            "WITH x AS (SELECT 1) INSERT INTO users SELECT * FROM x",
            PG
        ));
    }

    #[test]
    fn test_data_modifying_cte_blocked() {
        assert!(is_permission(
            "WITH d AS (DELETE FROM users RETURNING *) SELECT * FROM d",
            PG
        ));
        assert!(is_permission(
            "WITH a AS (SELECT 1), b AS (UPDATE users SET name = 'x' RETURNING id) SELECT * FROM b",
            PG
        ));
    }

    #[test]
    fn test_select_into_blocked() {
        let err = validate_readonly("SELECT * INTO backup FROM users", PG).unwrap_err();
        assert!(matches!(err, AppError::Permission { .. }));
        assert!(err.to_string().contains("SELECT INTO"));
    }

    #[test]
    fn test_set_operation_branches_checked() {
        assert!(is_permission(
            "SELECT id FROM users UNION SELECT id INTO backup FROM admins",
            PG
        ));
        assert!(validate_readonly("(SELECT 1) UNION (SELECT 2)", PG).is_ok());
    }

    #[test]
    fn test_explain_select_allowed() {
        assert!(validate_readonly("EXPLAIN SELECT * FROM users", PG).is_ok());
        assert!(is_permission("EXPLAIN ANALYZE DELETE FROM users", PG));
    }

    #[test]
    fn test_multiple_statements() {
        assert!(is_permission("SELECT 1; DROP TABLE users", PG));
        assert!(matches!(
            validate_readonly("SELECT 1; SELECT 2", PG),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn test_unparseable_is_validation_error() {
        assert!(matches!(
            validate_readonly("SELEC * FORM users", PG),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            validate_readonly("   ", PG),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn test_mssql_top_allowed() {
        assert!(validate_readonly("SELECT TOP 5 name FROM users", DatabaseType::MsSql).is_ok());
    }
}
