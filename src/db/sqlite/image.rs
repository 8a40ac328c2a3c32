use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};

use crate::db::ImageRecord;
use crate::time::current_timestamp;
use crate::types::query::ImageQuery;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS image (
    user TEXT NOT NULL,
    identifier TEXT NOT NULL,
    mime TEXT NOT NULL,
    extension TEXT NOT NULL,
    size INTEGER NOT NULL,
    data BLOB NOT NULL,
    added INTEGER NOT NULL,
    updated INTEGER NOT NULL,
    PRIMARY KEY (user, identifier)
);

CREATE INDEX IF NOT EXISTS idx_image_added ON image(added);
"#;

const SIMPLE_COLUMNS: &str = "user, identifier, mime, extension, size, added, updated";

pub fn create_image_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn create_image(tx: &Transaction, image: &ImageRecord) -> Result<()> {
    tx.execute(
        "INSERT INTO image (user, identifier, mime, extension, size, data, added, updated) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            image.user,
            image.identifier,
            image.mime,
            image.extension,
            image.size,
            image.data,
            image.added,
            image.updated
        ],
    )?;
    Ok(())
}

pub fn is_image_exists(tx: &Transaction, user: &str, identifier: &str) -> Result<bool> {
    let mut stmt = tx.prepare("SELECT COUNT(*) FROM image WHERE user = ? AND identifier = ?")?;
    let count: i64 = stmt.query_row(params![user, identifier], |row| row.get(0))?;
    Ok(count > 0)
}

pub fn get_image(
    tx: &Transaction,
    user: &str,
    identifier: &str,
    with_data: bool,
) -> Result<Option<ImageRecord>> {
    let sql = if with_data {
        format!("SELECT {SIMPLE_COLUMNS}, data FROM image WHERE user = ? AND identifier = ?")
    } else {
        format!("SELECT {SIMPLE_COLUMNS} FROM image WHERE user = ? AND identifier = ?")
    };

    let mut stmt = tx.prepare(&sql)?;
    let image = stmt
        .query_row(params![user, identifier], |row| {
            let mut record = read_simple_record(row)?;
            if with_data {
                record.data = row.get(7)?;
            }
            Ok(record)
        })
        .optional()?;
    Ok(image)
}

pub fn list_images(tx: &Transaction, query: &ImageQuery) -> Result<Vec<ImageRecord>> {
    let where_clause = query.generate_where();
    let mut params = query.params();
    params.push(Value::Integer(query.limit as i64));
    params.push(Value::Integer(query.offset() as i64));

    let sql = format!(
        "SELECT {SIMPLE_COLUMNS} FROM image {where_clause}ORDER BY added DESC, identifier ASC LIMIT ? OFFSET ?"
    );

    let mut stmt = tx.prepare(&sql)?;
    let images = stmt
        .query_map(params_from_iter(params.iter()), read_simple_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(images)
}

pub fn count_images(tx: &Transaction, query: &ImageQuery) -> Result<usize> {
    let where_clause = query.generate_where();
    let sql = format!("SELECT COUNT(*) FROM image {where_clause}");

    let mut stmt = tx.prepare(&sql)?;
    let count: i64 = stmt.query_row(params_from_iter(query.params().iter()), |row| row.get(0))?;
    Ok(count as usize)
}

pub fn update_image_time(tx: &Transaction, user: &str, identifier: &str) -> Result<()> {
    tx.execute(
        "UPDATE image SET updated = ? WHERE user = ? AND identifier = ?",
        params![current_timestamp(), user, identifier],
    )?;
    Ok(())
}

pub fn delete_image(tx: &Transaction, user: &str, identifier: &str) -> Result<()> {
    tx.execute(
        "DELETE FROM image WHERE user = ? AND identifier = ?",
        params![user, identifier],
    )?;
    Ok(())
}

pub fn list_image_users(tx: &Transaction) -> Result<Vec<String>> {
    let mut stmt = tx.prepare("SELECT DISTINCT user FROM image ORDER BY user ASC")?;
    let users = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(users)
}

fn read_simple_record(row: &Row) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        user: row.get(0)?,
        identifier: row.get(1)?,
        mime: row.get(2)?,
        extension: row.get(3)?,
        size: row.get(4)?,
        data: Vec::new(),
        added: row.get(5)?,
        updated: row.get(6)?,
    })
}
