//! Shared pagination, ordering and filtering for every list operation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum length, in characters, of entity names and name filters.
pub const MAX_NAME_SIZE: usize = 1024;

/// Default upper bound for `limit`.
pub const DEFAULT_MAX_LIMIT: i64 = 100;

/// `limit` value meaning "return every matching row".
pub const UNLIMITED: i64 = -1;

/// Query shape accepted by every list operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub offset: i64,
    pub limit: i64,
    /// `"name"`, `"id"` or empty.
    #[serde(default)]
    pub order: String,
    /// `"asc"`, `"desc"` or empty.
    #[serde(default)]
    pub dir: String,
    /// Case-sensitive substring filter on the entity name.
    #[serde(default)]
    pub name: Option<String>,
    /// Entities match when their metadata contains every key of this
    /// object with an equal value.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl Default for PageMetadata {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 10,
            order: String::new(),
            dir: String::new(),
            name: None,
            metadata: None,
        }
    }
}

/// A page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of matches before pagination.
    pub total: u64,
    pub offset: u64,
    pub limit: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    Id,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// A validated [`PageMetadata`], executed by the store.
#[derive(Debug, Clone)]
pub struct Query {
    offset: usize,
    limit: Option<usize>,
    raw_limit: i64,
    order: OrderBy,
    dir: Direction,
    name: Option<String>,
    metadata: serde_json::Map<String, serde_json::Value>,
}

/// Rows a paged listing is restricted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    /// Every row of the table.
    All,
    /// Rows with one of these IDs.
    Ids(Vec<Uuid>),
    /// Rows owned by one of these parents: orgs for groups, groups for
    /// things and profiles.
    Within(Vec<Uuid>),
}

impl PageMetadata {
    /// Validate against the endpoint's `max_limit`.
    pub fn validate(&self, max_limit: i64) -> Result<Query, ValidationError> {
        let limit = match self.limit {
            UNLIMITED => None,
            l if (1..=max_limit).contains(&l) => Some(l as usize),
            _ => return Err(ValidationError::LimitSize),
        };
        if self.offset < 0 {
            return Err(ValidationError::OffsetSize);
        }
        let order = match self.order.as_str() {
            "" | "id" => OrderBy::Id,
            "name" => OrderBy::Name,
            _ => return Err(ValidationError::InvalidOrder),
        };
        let dir = match self.dir.as_str() {
            "" | "asc" => Direction::Asc,
            "desc" => Direction::Desc,
            _ => return Err(ValidationError::InvalidDirection),
        };
        if let Some(name) = &self.name {
            if name.chars().count() > MAX_NAME_SIZE {
                return Err(ValidationError::NameSize);
            }
        }
        let metadata = match &self.metadata {
            None | Some(serde_json::Value::Null) => serde_json::Map::new(),
            Some(serde_json::Value::Object(map)) => map.clone(),
            Some(_) => return Err(ValidationError::InvalidMetadata),
        };

        Ok(Query {
            offset: self.offset as usize,
            limit,
            raw_limit: self.limit,
            order,
            dir,
            name: self.name.clone().filter(|n| !n.is_empty()),
            metadata,
        })
    }
}

impl Query {
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// `None` when every match is requested.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn order(&self) -> OrderBy {
        self.order
    }

    pub fn dir(&self) -> Direction {
        self.dir
    }

    /// Non-empty name substring, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Key/value pairs an entity's metadata must contain. Empty when
    /// unfiltered.
    pub fn metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata
    }

    /// Wrap one window of results, echoing the requested offset and limit.
    pub fn page<T>(&self, items: Vec<T>, total: u64) -> Page<T> {
        Page {
            items,
            total,
            offset: self.offset as u64,
            limit: self.raw_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn pm(offset: i64, limit: i64) -> PageMetadata {
        PageMetadata {
            offset,
            limit,
            ..Default::default()
        }
    }

    #[test]
    fn limit_bounds() {
        assert_eq!(pm(0, 0).validate(100).err(), Some(ValidationError::LimitSize));
        assert_eq!(pm(0, 101).validate(100).err(), Some(ValidationError::LimitSize));
        assert_eq!(pm(0, -2).validate(100).err(), Some(ValidationError::LimitSize));
        assert!(pm(0, 100).validate(100).is_ok());
        assert!(pm(0, UNLIMITED).validate(100).is_ok());
    }

    #[test]
    fn negative_offset_is_rejected() {
        assert_eq!(pm(-1, 10).validate(100).err(), Some(ValidationError::OffsetSize));
    }

    #[test]
    fn order_and_direction_are_checked() {
        let bad_order = PageMetadata {
            order: "created".into(),
            ..Default::default()
        };
        assert_eq!(bad_order.validate(100).err(), Some(ValidationError::InvalidOrder));

        let bad_dir = PageMetadata {
            dir: "up".into(),
            ..Default::default()
        };
        assert_eq!(bad_dir.validate(100).err(), Some(ValidationError::InvalidDirection));
    }

    #[test]
    fn oversized_name_filter_is_rejected() {
        let q = PageMetadata {
            name: Some("x".repeat(MAX_NAME_SIZE + 1)),
            ..Default::default()
        };
        assert_eq!(q.validate(100).err(), Some(ValidationError::NameSize));
    }

    #[test]
    fn defaults_to_id_ascending() {
        let query = PageMetadata::default().validate(100).unwrap();
        assert_eq!(query.order(), OrderBy::Id);
        assert_eq!(query.dir(), Direction::Asc);
        assert_eq!(query.limit(), Some(10));
        assert!(query.name().is_none());
        assert!(query.metadata().is_empty());
    }

    #[test]
    fn unlimited_has_no_window() {
        let query = pm(3, UNLIMITED).validate(100).unwrap();
        assert_eq!(query.limit(), None);
        assert_eq!(query.offset(), 3);

        let page = query.page(vec!["a"], 4);
        assert_eq!(page.limit, UNLIMITED);
        assert_eq!(page.offset, 3);
        assert_eq!(page.total, 4);
    }

    #[test]
    fn empty_name_filter_is_ignored() {
        let query = PageMetadata {
            name: Some(String::new()),
            ..Default::default()
        }
        .validate(100)
        .unwrap();
        assert!(query.name().is_none());
    }

    #[test]
    fn metadata_filter_must_be_an_object() {
        let query = PageMetadata {
            metadata: Some(json!({"site": "north"})),
            ..Default::default()
        }
        .validate(100)
        .unwrap();
        assert_eq!(query.metadata().get("site"), Some(&json!("north")));

        let not_object = PageMetadata {
            metadata: Some(json!(["site"])),
            ..Default::default()
        };
        assert_eq!(
            not_object.validate(100).err(),
            Some(ValidationError::InvalidMetadata)
        );
    }
}
