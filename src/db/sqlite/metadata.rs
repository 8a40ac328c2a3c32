use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::{Map, Value};

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS metadata (
    user TEXT NOT NULL,
    identifier TEXT NOT NULL,
    data TEXT NOT NULL,
    PRIMARY KEY (user, identifier)
);
"#;

pub fn create_metadata_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn get_metadata(
    tx: &Transaction,
    user: &str,
    identifier: &str,
) -> Result<Option<Map<String, Value>>> {
    let mut stmt = tx.prepare("SELECT data FROM metadata WHERE user = ? AND identifier = ?")?;
    let data: Option<String> = stmt
        .query_row(params![user, identifier], |row| row.get(0))
        .optional()?;
    match data {
        Some(data) => {
            let metadata = serde_json::from_str(&data)
                .with_context(|| format!("decode metadata of image '{identifier}'"))?;
            Ok(Some(metadata))
        }
        None => Ok(None),
    }
}

pub fn set_metadata(
    tx: &Transaction,
    user: &str,
    identifier: &str,
    metadata: &Map<String, Value>,
) -> Result<()> {
    let data = serde_json::to_string(metadata)?;
    tx.execute(
        "INSERT INTO metadata (user, identifier, data) VALUES (?, ?, ?) ON CONFLICT(user, identifier) DO UPDATE SET data = excluded.data",
        params![user, identifier, data],
    )?;
    Ok(())
}

pub fn delete_metadata(tx: &Transaction, user: &str, identifier: &str) -> Result<()> {
    tx.execute(
        "DELETE FROM metadata WHERE user = ? AND identifier = ?",
        params![user, identifier],
    )?;
    Ok(())
}
