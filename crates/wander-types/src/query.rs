//! Query-string parameters for the list endpoints.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Resolved page window. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationSort {
    #[default]
    Name,
    Country,
    City,
    Rating,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSort {
    #[default]
    CreatedAt,
    Rating,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl UserQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DestinationQuery {
    pub country: Option<String>,
    pub city: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort: DestinationSort,
    #[serde(default)]
    pub order: SortOrder,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl DestinationQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewQuery {
    pub destination_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub min_rating: Option<u8>,
    #[serde(default)]
    pub sort: ReviewSort,
    /// Defaults to newest / highest first.
    pub order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ReviewQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItineraryQuery {
    /// Only honoured for admins; everybody else is pinned to their own id.
    pub user_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ItineraryQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

/// Plain page/limit pair for endpoints without filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}
