use anyhow::{bail, Result};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u64 = 20;
pub const MAX_LIMIT: u64 = 1000;

/// Image listing query. `users` empty means every user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageQuery {
    #[serde(default)]
    pub users: Vec<String>,

    #[serde(default)]
    pub ids: Vec<String>,

    /// Only images added at or after this unix timestamp
    pub from: Option<u64>,
    /// Only images added at or before this unix timestamp
    pub to: Option<u64>,

    pub page: u64,
    pub limit: u64,
}

impl ImageQuery {
    pub fn for_user(user: &str) -> Self {
        Self {
            users: vec![user.to_string()],
            page: 1,
            limit: DEFAULT_LIMIT,
            ..Default::default()
        }
    }

    /// Builds a query from url query pairs: `page`, `limit`, `from`, `to`,
    /// repeated `ids[]` and (for global listings) `users[]`.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut query = Self {
            page: 1,
            limit: DEFAULT_LIMIT,
            ..Default::default()
        };
        for (key, value) in pairs {
            match key {
                "page" => query.page = parse_number("page", value)?,
                "limit" => query.limit = parse_number("limit", value)?,
                "from" => query.from = Some(parse_number("from", value)?),
                "to" => query.to = Some(parse_number("to", value)?),
                "ids[]" | "ids" => query.ids.push(value.to_string()),
                "users[]" | "users" => query.users.push(value.to_string()),
                _ => {}
            }
        }
        if query.page == 0 {
            bail!("page must be at least 1");
        }
        if query.limit == 0 || query.limit > MAX_LIMIT {
            bail!("limit must be between 1 and {MAX_LIMIT}");
        }
        Ok(query)
    }

    pub fn offset(&self) -> u64 {
        (self.page.max(1) - 1) * self.limit
    }

    pub fn generate_where(&self) -> String {
        let mut where_clause = vec![];
        if !self.users.is_empty() {
            let placeholders = vec!["?"; self.users.len()].join(",");
            where_clause.push(format!("user IN ({placeholders})"));
        }
        if !self.ids.is_empty() {
            let placeholders = vec!["?"; self.ids.len()].join(",");
            where_clause.push(format!("identifier IN ({placeholders})"));
        }
        if self.from.is_some() {
            where_clause.push(String::from("added >= ?"));
        }
        if self.to.is_some() {
            where_clause.push(String::from("added <= ?"));
        }
        if where_clause.is_empty() {
            String::new()
        } else {
            format!("WHERE {} ", where_clause.join(" AND "))
        }
    }

    /// Parameters matching [`ImageQuery::generate_where`], in order.
    pub fn params(&self) -> Vec<Value> {
        let mut params = vec![];
        for user in self.users.iter() {
            params.push(Value::Text(user.clone()));
        }
        for id in self.ids.iter() {
            params.push(Value::Text(id.clone()));
        }
        if let Some(from) = self.from {
            params.push(Value::Integer(from as i64));
        }
        if let Some(to) = self.to {
            params.push(Value::Integer(to as i64));
        }
        params
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64> {
    match value.parse::<u64>() {
        Ok(n) => Ok(n),
        Err(_) => bail!("query parameter '{name}' must be a non-negative integer"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs() {
        let query = ImageQuery::from_pairs([("page", "2"), ("limit", "5"), ("ids[]", "a")]).unwrap();
        assert_eq!(query.page, 2);
        assert_eq!(query.limit, 5);
        assert_eq!(query.offset(), 5);
        assert_eq!(query.ids, vec![String::from("a")]);

        let query = ImageQuery::from_pairs([]).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, DEFAULT_LIMIT);

        assert!(ImageQuery::from_pairs([("page", "0")]).is_err());
        assert!(ImageQuery::from_pairs([("limit", "1001")]).is_err());
        assert!(ImageQuery::from_pairs([("from", "yesterday")]).is_err());
    }

    #[test]
    fn test_generate_where() {
        let mut query = ImageQuery::for_user("alice");
        assert_eq!(query.generate_where(), "WHERE user IN (?) ");
        assert_eq!(query.params().len(), 1);

        query.users.clear();
        assert_eq!(query.generate_where(), "");

        query.from = Some(10);
        query.ids = vec![String::from("a"), String::from("b")];
        assert_eq!(
            query.generate_where(),
            "WHERE identifier IN (?,?) AND added >= ? "
        );
        assert_eq!(query.params().len(), 3);
    }
}
