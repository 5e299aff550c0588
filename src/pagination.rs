use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;
/// Highest page whose offset still fits in an `i64` at `MAX_LIMIT`.
pub const MAX_PAGE: i64 = i64::MAX / MAX_LIMIT;

/// SortOrder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// PostSortField
///
/// Whitelist of sortable post columns. Client input never reaches the SQL text directly;
/// it is mapped onto one of these variants and unknown values fall back to `createdAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Views,
}

impl PostSortField {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "updatedAt" | "updated_at" => PostSortField::UpdatedAt,
            "title" => PostSortField::Title,
            "views" => PostSortField::Views,
            _ => PostSortField::CreatedAt,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            PostSortField::CreatedAt => "p.created_at",
            PostSortField::UpdatedAt => "p.updated_at",
            PostSortField::Title => "p.title",
            PostSortField::Views => "p.views",
        }
    }
}

/// PageOptions
///
/// Resolved paging and sorting window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    pub page: i64,
    pub limit: i64,
    pub skip: i64,
    pub sort_by: PostSortField,
    pub sort_order: SortOrder,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            skip: 0,
            sort_by: PostSortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl PageOptions {
    /// from_raw
    ///
    /// Builds the window from untrusted query-string values. Anything missing, non-numeric
    /// or non-positive falls back to the defaults; `limit` is capped at `MAX_LIMIT` and
    /// `page` at `MAX_PAGE` so the offset never overflows.
    pub fn from_raw(
        page: Option<&str>,
        limit: Option<&str>,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
    ) -> Self {
        let page = parse_positive(page).unwrap_or(DEFAULT_PAGE).min(MAX_PAGE);
        let limit = parse_positive(limit).unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

        let sort_by = sort_by.map(PostSortField::parse).unwrap_or_default();
        let sort_order = match sort_order.map(|s| s.trim().to_ascii_lowercase()) {
            Some(order) if order == "asc" => SortOrder::Asc,
            _ => SortOrder::Desc,
        };

        Self {
            page,
            limit,
            skip: (page - 1) * limit,
            sort_by,
            sort_order,
        }
    }
}

fn parse_positive(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
}

/// Pagination
///
/// Metadata returned alongside every paged listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_page: i64,
}

impl Pagination {
    pub fn new(total: i64, options: &PageOptions) -> Self {
        let limit = options.limit.max(1);
        Self {
            total,
            page: options.page,
            limit,
            total_page: (total + limit - 1) / limit,
        }
    }
}
