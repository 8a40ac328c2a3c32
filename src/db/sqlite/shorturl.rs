use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::db::ShortUrlRecord;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS shorturl (
    id TEXT PRIMARY KEY,
    user TEXT NOT NULL,
    image TEXT NOT NULL,
    query TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_shorturl_image ON shorturl(user, image);
"#;

pub fn create_short_url_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn create_short_url(tx: &Transaction, record: &ShortUrlRecord) -> Result<()> {
    tx.execute(
        "INSERT INTO shorturl (id, user, image, query) VALUES (?, ?, ?, ?)",
        params![record.id, record.user, record.image, record.query],
    )?;
    Ok(())
}

pub fn get_short_url(tx: &Transaction, id: &str) -> Result<Option<ShortUrlRecord>> {
    let mut stmt = tx.prepare("SELECT id, user, image, query FROM shorturl WHERE id = ?")?;
    let record = stmt.query_row(params![id], read_record).optional()?;
    Ok(record)
}

pub fn find_short_url(
    tx: &Transaction,
    user: &str,
    image: &str,
    query: &str,
) -> Result<Option<ShortUrlRecord>> {
    let mut stmt = tx.prepare(
        "SELECT id, user, image, query FROM shorturl WHERE user = ? AND image = ? AND query = ? LIMIT 1",
    )?;
    let record = stmt
        .query_row(params![user, image, query], read_record)
        .optional()?;
    Ok(record)
}

pub fn delete_short_url(tx: &Transaction, id: &str) -> Result<()> {
    tx.execute("DELETE FROM shorturl WHERE id = ?", params![id])?;
    Ok(())
}

pub fn delete_image_short_urls(tx: &Transaction, user: &str, image: &str) -> Result<usize> {
    let count = tx.execute(
        "DELETE FROM shorturl WHERE user = ? AND image = ?",
        params![user, image],
    )?;
    Ok(count)
}

fn read_record(row: &Row) -> rusqlite::Result<ShortUrlRecord> {
    Ok(ShortUrlRecord {
        id: row.get(0)?,
        user: row.get(1)?,
        image: row.get(2)?,
        query: row.get(3)?,
    })
}
