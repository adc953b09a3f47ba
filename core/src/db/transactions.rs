//! Transaction helper

use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Execute `operation` inside a transaction.
///
/// Commits when the closure returns `Ok`; on `Err` the transaction is
/// dropped, which rolls it back. The error type is the caller's, so service
/// code can return its own errors from inside the closure.
///
/// Use `Immediate` for read-modify-write sequences (occupancy counters) so
/// the write lock is taken before the first read.
pub fn execute_in_transaction<F, T, E>(
    conn: &mut Connection,
    behavior: TransactionBehavior,
    operation: F,
) -> std::result::Result<T, E>
where
    F: FnOnce(&Transaction) -> std::result::Result<T, E>,
    E: From<rusqlite::Error>,
{
    let tx = conn.transaction_with_behavior(behavior)?;
    let result = operation(&tx)?;
    tx.commit()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbError;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE test_data (
                id INTEGER PRIMARY KEY,
                value INTEGER NOT NULL
            )",
            [],
        )
        .unwrap();
        conn
    }

    fn count(conn: &Connection, value: i64) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM test_data WHERE value = ?1",
            [value],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_transaction_commit() {
        let mut conn = setup_test_db();

        let result: Result<(), DbError> =
            execute_in_transaction(&mut conn, TransactionBehavior::Immediate, |tx| {
                tx.execute("INSERT INTO test_data (value) VALUES (?1)", [42])?;
                Ok(())
            });

        assert!(result.is_ok(), "Transaction should commit successfully");
        assert_eq!(count(&conn, 42), 1, "Committed data should persist");
    }

    #[test]
    fn test_transaction_rollback() {
        let mut conn = setup_test_db();

        let result: Result<(), DbError> =
            execute_in_transaction(&mut conn, TransactionBehavior::Immediate, |tx| {
                tx.execute("INSERT INTO test_data (value) VALUES (?1)", [99])?;
                Err(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
            });

        assert!(result.is_err(), "Transaction should fail");
        assert_eq!(count(&conn, 99), 0, "Rolled back data should not persist");
    }

    #[test]
    fn test_caller_error_type_passes_through() {
        let mut conn = setup_test_db();

        let result: crate::Result<i64> =
            execute_in_transaction(&mut conn, TransactionBehavior::Deferred, |tx| {
                tx.execute("INSERT INTO test_data (value) VALUES (?1)", [7])?;
                Err(crate::HostelError::precondition("Room is full"))
            });

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Room is full");
        assert_eq!(count(&conn, 7), 0);
    }

    #[test]
    fn test_sql_error_rolls_back_earlier_writes() {
        let mut conn = setup_test_db();

        let result: Result<(), DbError> =
            execute_in_transaction(&mut conn, TransactionBehavior::Immediate, |tx| {
                tx.execute("INSERT INTO test_data (value) VALUES (?1)", [5])?;
                tx.execute("INSERT INTO missing_table (value) VALUES (1)", [])?;
                Ok(())
            });

        assert!(matches!(result, Err(DbError::Sqlite(_))));
        assert_eq!(count(&conn, 5), 0);
    }
}
