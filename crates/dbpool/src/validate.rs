use postgres::types::Type;
use postgres::Row;

use crate::error::{DbError, DbResult};
use plat_log::logging::Logger;

/// Post-execution checks mirroring the original's `PQresultStatus`/`PQntuples`/`PQnfields`
/// guards, run after a query already succeeded at the protocol level, to catch shapes a handler
/// didn't expect (an empty result where one row was assumed, a procedure returning the wrong
/// column count after a migration drifted out of sync with the Rust call site, and so on). Each
/// logs the caller's module path and the offending SQL before returning an error, so a bad
/// deploy shows up in the logs instead of a confusing downstream type-cast failure.

pub fn tuples_ok(logger: &Logger, caller: &'static str, sql: &str, rows: &[Row]) -> DbResult<()> {
    if rows.is_empty() {
        plat_log::logging::error!(
            *logger,
            "expected a non-empty result set";
            "caller" => caller,
            "sql" => sql,
        );
        return Err(DbError::Validation("expected at least one row"));
    }
    Ok(())
}

pub fn command_ok(logger: &Logger, caller: &'static str, sql: &str, rows_affected: u64) -> DbResult<()> {
    if rows_affected == 0 {
        plat_log::logging::warn!(
            *logger,
            "command affected zero rows";
            "caller" => caller,
            "sql" => sql,
        );
    }
    Ok(())
}

pub fn correct_number_of_columns(
    logger: &Logger,
    caller: &'static str,
    sql: &str,
    row: &Row,
    expected: usize,
) -> DbResult<()> {
    if row.len() != expected {
        plat_log::logging::error!(
            *logger,
            "unexpected column count";
            "caller" => caller,
            "sql" => sql,
            "expected" => expected,
            "actual" => row.len(),
        );
        return Err(DbError::Validation("unexpected column count"));
    }
    Ok(())
}

pub fn correct_number_of_rows(
    logger: &Logger,
    caller: &'static str,
    sql: &str,
    rows: &[Row],
    expected: usize,
) -> DbResult<()> {
    if rows.len() != expected {
        plat_log::logging::error!(
            *logger,
            "unexpected row count";
            "caller" => caller,
            "sql" => sql,
            "expected" => expected,
            "actual" => rows.len(),
        );
        return Err(DbError::Validation("unexpected row count"));
    }
    Ok(())
}

pub fn correct_column_type(
    logger: &Logger,
    caller: &'static str,
    sql: &str,
    row: &Row,
    column: usize,
    expected: &Type,
) -> DbResult<()> {
    let actual = row.columns()[column].type_();
    if actual != expected {
        plat_log::logging::error!(
            *logger,
            "unexpected column type";
            "caller" => caller,
            "sql" => sql,
            "column" => column,
            "expected" => %expected,
            "actual" => %actual,
        );
        return Err(DbError::Validation("unexpected column type"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_ok_accepts_zero_rows_affected() {
        let logger = plat_log::logging::discard();
        assert!(command_ok(&logger, "test", "update x", 0).is_ok());
    }

    #[test]
    fn tuples_ok_rejects_empty_result() {
        let logger = plat_log::logging::discard();
        assert!(tuples_ok(&logger, "test", "select 1", &[]).is_err());
    }
}
