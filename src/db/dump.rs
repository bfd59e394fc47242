//! Table-level SQL dump and replay.
//!
//! A dump is a self-contained script: `BEGIN TRANSACTION;`, the table's exact `CREATE TABLE`
//! statement, one `INSERT` per row with values rendered by SQLite's `quote()`, `COMMIT;`.

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Executor, Sqlite, Transaction};
use std::path::Path;
use tracing::{debug, warn};

use super::schema::{quote_ident, quote_literal};
use crate::error::GwInitError;

const LIVE_ALIAS: &str = "live";

/// Copies `table` out of the database at `database_path` into a transient in-memory handle
/// and returns the dump of that handle.
pub(crate) async fn dump_table(database_path: &Path, table: &str) -> Result<String, GwInitError> {
    // A plain `:memory:` filename: the in-memory open flag would also apply to ATTACH.
    let mut mem = SqliteConnectOptions::new()
        .filename(":memory:")
        .connect()
        .await?;

    let result = copy_and_dump(&mut mem, database_path, table).await;
    mem.close().await?;
    result
}

async fn copy_and_dump(
    mem: &mut SqliteConnection,
    database_path: &Path,
    table: &str,
) -> Result<String, GwInitError> {
    sqlx::query(&format!("ATTACH DATABASE ? AS {LIVE_ALIAS}"))
        .bind(database_path.to_string_lossy().into_owned())
        .execute(&mut *mem)
        .await?;

    let ddl: Option<String> = sqlx::query_scalar(&format!(
        "SELECT sql FROM {LIVE_ALIAS}.sqlite_master WHERE type = 'table' AND name = ?"
    ))
    .bind(table)
    .fetch_optional(&mut *mem)
    .await?;
    let Some(ddl) = ddl else {
        sqlx::query(&format!("DETACH DATABASE {LIVE_ALIAS}"))
            .execute(&mut *mem)
            .await?;
        return Err(GwInitError::MissingTable(table.to_string()));
    };

    Executor::execute(&mut *mem, ddl.as_str()).await?;
    let copied = sqlx::query(&format!(
        "INSERT INTO main.{t} SELECT * FROM {LIVE_ALIAS}.{t}",
        t = quote_ident(table)
    ))
    .execute(&mut *mem)
    .await?;
    sqlx::query(&format!("DETACH DATABASE {LIVE_ALIAS}"))
        .execute(&mut *mem)
        .await?;
    debug!(table, rows = copied.rows_affected(), "table copied to transient handle");

    dump_connection(mem).await
}

/// Dumps every user table of `conn` as DDL plus INSERT statements.
pub(crate) async fn dump_connection(conn: &mut SqliteConnection) -> Result<String, GwInitError> {
    let tables: Vec<(String, String)> = sqlx::query_as(
        "SELECT name, sql FROM sqlite_master \
         WHERE type = 'table' AND sql NOT NULL AND name NOT LIKE 'sqlite_%' \
         ORDER BY name",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut script = String::from("BEGIN TRANSACTION;\n");
    for (name, ddl) in tables {
        script.push_str(&ddl);
        script.push_str(";\n");

        let columns: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT name FROM pragma_table_info({})",
            quote_literal(&name)
        ))
        .fetch_all(&mut *conn)
        .await?;
        if columns.is_empty() {
            continue;
        }

        let values = columns
            .iter()
            .map(|c| format!("quote({})", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(" || ',' || ");
        let select = format!(
            "SELECT {prefix} || {values} || ')' FROM {table}",
            prefix = quote_literal(&format!("INSERT INTO {} VALUES(", quote_ident(&name))),
            table = quote_ident(&name),
        );
        let inserts: Vec<String> = sqlx::query_scalar(&select).fetch_all(&mut *conn).await?;
        for insert in inserts {
            script.push_str(&insert);
            script.push_str(";\n");
        }
    }
    script.push_str("COMMIT;\n");
    Ok(script)
}

const SCRIPT_BEGIN: &str = "BEGIN TRANSACTION;";
const SCRIPT_COMMIT: &str = "COMMIT;";

/// Statements of a dump script without its own transaction wrapper.
fn script_body(script: &str) -> &str {
    let body = script.trim();
    let body = body.strip_prefix(SCRIPT_BEGIN).unwrap_or(body);
    body.strip_suffix(SCRIPT_COMMIT).unwrap_or(body)
}

/// Replaces `table` with the contents of `script`.
///
/// The drop and the replay share one transaction, so a script that fails part way leaves
/// the table as it was.
pub(crate) async fn restore_table(
    conn: &mut SqliteConnection,
    table: &str,
    script: &str,
) -> Result<(), GwInitError> {
    let mut tx = conn.begin().await?;
    if let Err(e) = replay(&mut tx, table, script_body(script)).await {
        warn!(table, error = %e, "restore failed, rolling back");
        tx.rollback().await?;
        return Err(e);
    }
    tx.commit().await?;
    Ok(())
}

async fn replay(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    body: &str,
) -> Result<(), GwInitError> {
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
        .execute(&mut **tx)
        .await?;
    Executor::execute(&mut **tx, body).await?;
    Ok(())
}
