use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDir {
    #[default]
    Asc,
    Desc,
}

impl OrderDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDir::Asc => "asc",
            OrderDir::Desc => "desc",
        }
    }
}

/// Query against the generic table endpoint.
///
/// `search` filters are substring matches on the server side; callers that
/// need equality must re-check the returned rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub table_name: String,
    pub page: u32,
    pub limit: u32,
    pub order_by: Option<String>,
    pub order_dir: OrderDir,
    pub search: BTreeMap<String, String>,
}

impl TableQuery {
    pub fn new(table_name: impl Into<String>, limit: u32) -> Self {
        TableQuery { table_name: table_name.into(), page: 1, limit: limit.max(1), order_by: None, order_dir: OrderDir::Asc, search: BTreeMap::new() }
    }

    pub fn search(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.search.insert(field.into(), value.into());
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, dir: OrderDir) -> Self {
        self.order_by = Some(field.into());
        self.order_dir = dir;
        self
    }

    pub fn with_page(&self, page: u32) -> Self {
        let mut next = self.clone();
        next.page = page;
        next
    }

    /// Query string pairs in the order the endpoint documents them.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("tableName".to_string(), self.table_name.clone()),
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];

        if let Some(order_by) = &self.order_by {
            pairs.push(("orderBy".to_string(), order_by.clone()));
            pairs.push(("orderDir".to_string(), self.order_dir.as_str().to_string()));
        }

        for (field, value) in &self.search {
            pairs.push((format!("search_{}", field), value.clone()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs() {
        let query = TableQuery::new("calendar", 50).search("semester", "2025S").search("weekday", "3").order_by("week", OrderDir::Asc);

        let pairs = query.to_query_pairs();

        assert_eq!(pairs[0], ("tableName".to_string(), "calendar".to_string()));
        assert_eq!(pairs[1], ("page".to_string(), "1".to_string()));
        assert_eq!(pairs[2], ("limit".to_string(), "50".to_string()));
        assert!(pairs.contains(&("orderBy".to_string(), "week".to_string())));
        assert!(pairs.contains(&("orderDir".to_string(), "asc".to_string())));
        assert!(pairs.contains(&("search_semester".to_string(), "2025S".to_string())));
        assert!(pairs.contains(&("search_weekday".to_string(), "3".to_string())));
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        assert_eq!(TableQuery::new("lessons", 0).limit, 1);
    }
}
