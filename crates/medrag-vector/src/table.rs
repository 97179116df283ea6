//! LanceDB connection and table helpers.
use anyhow::{bail, Result};
use arrow_array::RecordBatchIterator;
use arrow_schema::SchemaRef;
use lancedb::{connect, Connection, Table};

use crate::schema::same_layout;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Create `name` empty with `schema`, or check that the existing table has the same layout.
pub async fn ensure_table(conn: &Connection, name: &str, schema: SchemaRef) -> Result<()> {
    if table_exists(conn, name).await? {
        let existing = conn.open_table(name).execute().await?.schema().await?;
        if !same_layout(&existing, &schema) {
            bail!("collection '{name}' exists with a different layout");
        }
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    tracing::info!(table = name, "created table");
    Ok(())
}

/// Empty `name`, creating it when missing. Rows are deleted in place; a
/// table with another layout is refused rather than silently replaced.
pub async fn reset_table(conn: &Connection, name: &str, schema: SchemaRef) -> Result<()> {
    if !table_exists(conn, name).await? {
        return ensure_table(conn, name, schema).await;
    }
    let table = conn.open_table(name).execute().await?;
    if !same_layout(&*table.schema().await?, &schema) {
        bail!("collection '{name}' exists with a different layout; remove it before re-ingesting");
    }
    let before = table.count_rows(None).await?;
    table.delete("true").await?;
    tracing::info!(table = name, removed = before, "cleared table");
    Ok(())
}

pub async fn open_existing(conn: &Connection, name: &str) -> Result<Table> {
    if !table_exists(conn, name).await? {
        bail!("collection '{name}' does not exist");
    }
    Ok(conn.open_table(name).execute().await?)
}
