//! Parameter shaping for upstream calls.
//!
//! Pure helpers that turn tool arguments into upstream query maps and
//! request bodies. Absent values are dropped; field names are translated to
//! the upstream's camelCase convention (`per_page` becomes `perPage`).

use serde::Serialize;
use serde_json::{Map, Value, json};

/// Page size used when the caller gives none or an invalid one.
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Largest page size forwarded upstream.
pub const MAX_PER_PAGE: u32 = 100;

/// Page-size bounds applied at a paginated tool boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationLimits {
    pub default_per_page: u32,
    pub max_per_page: u32,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: MAX_PER_PAGE,
        }
    }
}

/// Normalized pagination values, always within bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    /// Clamp raw caller input into range.
    ///
    /// `page < 1` becomes 1, `per_page < 1` becomes the default and
    /// `per_page` above the maximum becomes the maximum. Never an error.
    pub fn normalize(page: i64, per_page: i64, limits: PaginationLimits) -> Self {
        let page = u32::try_from(page.max(1)).unwrap_or(u32::MAX);
        let per_page = if per_page < 1 {
            limits.default_per_page
        } else if per_page > i64::from(limits.max_per_page) {
            limits.max_per_page
        } else {
            // In range 1..=max_per_page, so it fits.
            per_page as u32
        };
        Self { page, per_page }
    }
}

/// Sort direction for filter queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One `{field, operator, value}` filter condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// One `{field, direction}` sort key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

fn insert_extras(params: &mut Map<String, Value>, extra: &[(&str, Option<Value>)]) {
    for (key, value) in extra {
        if let Some(value) = value {
            params.insert((*key).to_string(), value.clone());
        }
    }
}

/// Build a list-endpoint query map, keeping only present values.
///
/// `archived` is sent as the lowercase string `"true"` / `"false"`, never as
/// a JSON boolean. Extra keys pass through unchanged.
pub fn build_api_params(
    page: Option<u32>,
    per_page: Option<u32>,
    since: Option<&str>,
    archived: Option<bool>,
    extra: &[(&str, Option<Value>)],
) -> Map<String, Value> {
    let mut params = Map::new();
    if let Some(page) = page {
        params.insert("page".into(), page.into());
    }
    if let Some(per_page) = per_page {
        params.insert("perPage".into(), per_page.into());
    }
    if let Some(since) = since {
        params.insert("since".into(), since.into());
    }
    if let Some(archived) = archived {
        params.insert("archived".into(), archived.to_string().into());
    }
    insert_extras(&mut params, extra);
    params
}

/// Build a search query map: `q`, `page` and `perPage` plus present extras.
pub fn build_search_params(
    keyword: &str,
    page: u32,
    per_page: u32,
    extra: &[(&str, Option<Value>)],
) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("q".into(), keyword.into());
    params.insert("page".into(), page.into());
    params.insert("perPage".into(), per_page.into());
    insert_extras(&mut params, extra);
    params
}

/// Build a filter-query envelope.
///
/// Conditions are kept in the given order. `orderBy` is left out entirely
/// when no sort is given (an empty list counts as none).
pub fn build_filter_query(
    conditions: &[FilterCondition],
    order_by: Option<&[OrderBy]>,
    page: u32,
    per_page: u32,
) -> Value {
    let mut filter = Map::new();
    filter.insert("conditions".into(), json!(conditions));
    if let Some(order_by) = order_by.filter(|o| !o.is_empty()) {
        filter.insert("orderBy".into(), json!(order_by));
    }

    json!({
        "filter": filter,
        "page": page,
        "perPage": per_page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: PaginationLimits = PaginationLimits {
        default_per_page: 50,
        max_per_page: 100,
    };

    #[test]
    fn test_normalize_page() {
        assert_eq!(Pagination::normalize(0, 10, LIMITS).page, 1);
        assert_eq!(Pagination::normalize(-7, 10, LIMITS).page, 1);
        assert_eq!(Pagination::normalize(3, 10, LIMITS).page, 3);
    }

    #[test]
    fn test_normalize_per_page() {
        assert_eq!(Pagination::normalize(1, 0, LIMITS).per_page, 50);
        assert_eq!(Pagination::normalize(1, -1, LIMITS).per_page, 50);
        assert_eq!(Pagination::normalize(1, 250, LIMITS).per_page, 100);
        assert_eq!(Pagination::normalize(1, 100, LIMITS).per_page, 100);
        assert_eq!(Pagination::normalize(1, 1, LIMITS).per_page, 1);
    }

    #[test]
    fn test_normalize_custom_limits() {
        let limits = PaginationLimits {
            default_per_page: 10,
            max_per_page: 25,
        };
        assert_eq!(
            Pagination::normalize(0, 0, limits),
            Pagination { page: 1, per_page: 10 }
        );
        assert_eq!(Pagination::normalize(2, 40, limits).per_page, 25);
    }

    #[test]
    fn test_api_params_drop_absent() {
        let params = build_api_params(None, None, None, None, &[("userId", None)]);
        assert!(params.is_empty());
    }

    #[test]
    fn test_api_params_casing_and_archived() {
        let params = build_api_params(
            Some(2),
            Some(25),
            Some("2024-01-01T00:00:00Z"),
            Some(true),
            &[("userId", Some(json!(7)))],
        );
        assert_eq!(params["page"], json!(2));
        assert_eq!(params["perPage"], json!(25));
        assert!(!params.contains_key("per_page"));
        assert_eq!(params["since"], json!("2024-01-01T00:00:00Z"));
        assert_eq!(params["archived"], json!("true"));
        assert_eq!(params["userId"], json!(7));

        let params = build_api_params(None, None, None, Some(false), &[]);
        assert_eq!(params["archived"], json!("false"));
    }

    #[test]
    fn test_search_params() {
        let params = build_search_params("acme", 1, 50, &[("embed", Some(json!("tags"))), ("x", None)]);
        assert_eq!(params["q"], json!("acme"));
        assert_eq!(params["page"], json!(1));
        assert_eq!(params["perPage"], json!(50));
        assert_eq!(params["embed"], json!("tags"));
        assert!(!params.contains_key("x"));
    }

    #[test]
    fn test_filter_query_without_order() {
        let conditions = [FilterCondition::new("type", "is", "person")];
        let query = build_filter_query(&conditions, None, 1, 50);
        assert_eq!(
            query,
            json!({
                "filter": {"conditions": [{"field": "type", "operator": "is", "value": "person"}]},
                "page": 1,
                "perPage": 50
            })
        );
        assert!(build_filter_query(&conditions, Some(&[] as &[OrderBy]), 1, 50)["filter"]
            .get("orderBy")
            .is_none());
    }

    #[test]
    fn test_filter_query_with_order_keeps_condition_order() {
        let conditions = [
            FilterCondition::new("milestone", "is not", "won"),
            FilterCondition::new("milestone", "is not", "lost"),
        ];
        let order = [OrderBy::new("expectedCloseOn", SortDirection::Ascending)];
        let query = build_filter_query(&conditions, Some(&order[..]), 2, 10);
        assert_eq!(query["filter"]["conditions"][0]["value"], json!("won"));
        assert_eq!(query["filter"]["conditions"][1]["value"], json!("lost"));
        assert_eq!(
            query["filter"]["orderBy"],
            json!([{"field": "expectedCloseOn", "direction": "ascending"}])
        );
        assert_eq!(query["page"], json!(2));
        assert_eq!(query["perPage"], json!(10));
    }
}
