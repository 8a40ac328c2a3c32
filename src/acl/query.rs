use serde::Serialize;

use super::{AclError, Group};

pub const DEFAULT_GROUPS_LIMIT: u64 = 20;
pub const MAX_GROUPS_LIMIT: u64 = 1000;

/// Pagination for group listings. Pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupQuery {
    page: u64,
    limit: u64,
}

/// One page of groups, ordered by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupsPage {
    pub groups: Vec<Group>,
    /// Total number of groups, regardless of pagination
    pub hits: usize,
    pub page: u64,
    pub limit: u64,
}

impl Default for GroupQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_GROUPS_LIMIT,
        }
    }
}

impl GroupQuery {
    pub fn new(page: u64, limit: u64) -> Result<Self, AclError> {
        let query = Self::default().with_page(page)?.with_limit(limit)?;
        Ok(query)
    }

    pub fn with_page(mut self, page: u64) -> Result<Self, AclError> {
        if page == 0 {
            return Err(AclError::InvalidQuery(String::from("page must be at least 1")));
        }
        self.page = page;
        Ok(self)
    }

    pub fn with_limit(mut self, limit: u64) -> Result<Self, AclError> {
        if limit == 0 || limit > MAX_GROUPS_LIMIT {
            return Err(AclError::InvalidQuery(format!(
                "limit must be between 1 and {MAX_GROUPS_LIMIT}"
            )));
        }
        self.limit = limit;
        Ok(self)
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }

    /// Cuts the requested page out of a full, name-ordered group list.
    pub fn paginate(&self, groups: Vec<Group>) -> GroupsPage {
        let hits = groups.len();
        let groups = groups
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .collect();
        GroupsPage {
            groups,
            hits,
            page: self.page,
            limit: self.limit,
        }
    }
}
