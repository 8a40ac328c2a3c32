use std::collections::BTreeSet;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::acl::{AccessRule, Group, NewAccessRule, Resource};
use crate::time::current_timestamp;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS acl_key (
    public_key TEXT PRIMARY KEY,
    private_key TEXT NOT NULL,
    create_time INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS acl_rule (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    public_key TEXT NOT NULL,
    group_name TEXT,
    rule TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_acl_rule_public_key ON acl_rule(public_key);
CREATE INDEX IF NOT EXISTS idx_acl_rule_group_name ON acl_rule(group_name);

CREATE TABLE IF NOT EXISTS acl_group (
    name TEXT PRIMARY KEY,
    resources TEXT NOT NULL
);
"#;

pub fn create_acl_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn create_key_pair(tx: &Transaction, public_key: &str, private_key: &str) -> Result<()> {
    tx.execute(
        "INSERT INTO acl_key (public_key, private_key, create_time) VALUES (?, ?, ?)",
        params![public_key, private_key, current_timestamp()],
    )?;
    Ok(())
}

pub fn get_private_key(tx: &Transaction, public_key: &str) -> Result<Option<String>> {
    let mut stmt = tx.prepare("SELECT private_key FROM acl_key WHERE public_key = ?")?;
    let key = stmt
        .query_row(params![public_key], |row| row.get(0))
        .optional()?;
    Ok(key)
}

pub fn is_public_key_exists(tx: &Transaction, public_key: &str) -> Result<bool> {
    let mut stmt = tx.prepare("SELECT COUNT(*) FROM acl_key WHERE public_key = ?")?;
    let count: i64 = stmt.query_row(params![public_key], |row| row.get(0))?;
    Ok(count > 0)
}

pub fn delete_key_pair(tx: &Transaction, public_key: &str) -> Result<()> {
    tx.execute(
        "DELETE FROM acl_key WHERE public_key = ?",
        params![public_key],
    )?;
    Ok(())
}

pub fn create_access_rule(tx: &Transaction, public_key: &str, rule: &NewAccessRule) -> Result<u64> {
    let data = serde_json::to_string(rule)?;
    tx.execute(
        "INSERT INTO acl_rule (public_key, group_name, rule) VALUES (?, ?, ?)",
        params![public_key, rule.group(), data],
    )?;
    Ok(tx.last_insert_rowid() as u64)
}

pub fn list_access_rules(tx: &Transaction, public_key: &str) -> Result<Vec<AccessRule>> {
    let mut stmt =
        tx.prepare("SELECT id, rule FROM acl_rule WHERE public_key = ? ORDER BY id ASC")?;
    let rows = stmt
        .query_map(params![public_key], |row| {
            Ok((row.get::<_, u64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut rules = Vec::with_capacity(rows.len());
    for (id, data) in rows {
        rules.push(decode_rule(id, &data)?);
    }
    Ok(rules)
}

pub fn get_access_rule(tx: &Transaction, public_key: &str, id: u64) -> Result<Option<AccessRule>> {
    let mut stmt = tx.prepare("SELECT rule FROM acl_rule WHERE public_key = ? AND id = ?")?;
    let data: Option<String> = stmt
        .query_row(params![public_key, id], |row| row.get(0))
        .optional()?;
    match data {
        Some(data) => Ok(Some(decode_rule(id, &data)?)),
        None => Ok(None),
    }
}

pub fn delete_access_rule(tx: &Transaction, public_key: &str, id: u64) -> Result<()> {
    tx.execute(
        "DELETE FROM acl_rule WHERE public_key = ? AND id = ?",
        params![public_key, id],
    )?;
    Ok(())
}

pub fn delete_access_rules(tx: &Transaction, public_key: &str) -> Result<usize> {
    let count = tx.execute(
        "DELETE FROM acl_rule WHERE public_key = ?",
        params![public_key],
    )?;
    Ok(count)
}

pub fn delete_group_access_rules(tx: &Transaction, group: &str) -> Result<Vec<String>> {
    let mut stmt =
        tx.prepare("SELECT DISTINCT public_key FROM acl_rule WHERE group_name = ? ORDER BY public_key")?;
    let keys = stmt
        .query_map(params![group], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    tx.execute("DELETE FROM acl_rule WHERE group_name = ?", params![group])?;
    Ok(keys)
}

pub fn create_group(tx: &Transaction, name: &str, resources: &BTreeSet<Resource>) -> Result<()> {
    let data = serde_json::to_string(resources)?;
    tx.execute(
        "INSERT INTO acl_group (name, resources) VALUES (?, ?)",
        params![name, data],
    )?;
    Ok(())
}

pub fn get_group(tx: &Transaction, name: &str) -> Result<Option<BTreeSet<Resource>>> {
    let mut stmt = tx.prepare("SELECT resources FROM acl_group WHERE name = ?")?;
    let data: Option<String> = stmt
        .query_row(params![name], |row| row.get(0))
        .optional()?;
    match data {
        Some(data) => Ok(Some(decode_resources(name, &data)?)),
        None => Ok(None),
    }
}

pub fn list_groups(tx: &Transaction, offset: u64, limit: u64) -> Result<Vec<Group>> {
    let mut stmt =
        tx.prepare("SELECT name, resources FROM acl_group ORDER BY name ASC LIMIT ? OFFSET ?")?;
    let rows = stmt
        .query_map(params![limit, offset], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut groups = Vec::with_capacity(rows.len());
    for (name, data) in rows {
        let resources = decode_resources(&name, &data)?;
        groups.push(Group { name, resources });
    }
    Ok(groups)
}

pub fn count_groups(tx: &Transaction) -> Result<usize> {
    let mut stmt = tx.prepare("SELECT COUNT(*) FROM acl_group")?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    Ok(count as usize)
}

pub fn update_group(tx: &Transaction, name: &str, resources: &BTreeSet<Resource>) -> Result<()> {
    let data = serde_json::to_string(resources)?;
    tx.execute(
        "UPDATE acl_group SET resources = ? WHERE name = ?",
        params![data, name],
    )?;
    Ok(())
}

pub fn delete_group(tx: &Transaction, name: &str) -> Result<()> {
    tx.execute("DELETE FROM acl_group WHERE name = ?", params![name])?;
    Ok(())
}

fn decode_rule(id: u64, data: &str) -> Result<AccessRule> {
    let rule: NewAccessRule =
        serde_json::from_str(data).with_context(|| format!("decode access rule {id}"))?;
    Ok(AccessRule { id, rule })
}

fn decode_resources(name: &str, data: &str) -> Result<BTreeSet<Resource>> {
    serde_json::from_str(data).with_context(|| format!("decode resources of group '{name}'"))
}
