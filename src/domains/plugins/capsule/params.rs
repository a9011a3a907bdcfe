//! Capsule tool parameters.
//!
//! Page and page-size fields are accepted as raw integers so that
//! out-of-range input (`per_page: 0`, `per_page: 500`) is clamped rather than
//! rejected.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::domains::tools::params::DEFAULT_PER_PAGE;
use crate::domains::tools::{Pagination, PaginationLimits};

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    i64::from(DEFAULT_PER_PAGE)
}

// ============================================================================
// List Parameters
// ============================================================================

/// Page selection shared by every paginated tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PageParams {
    /// Page number (default: 1).
    #[serde(default = "default_page")]
    pub page: i64,

    /// Number of records per page (default: 50, max: 100).
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

impl PageParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::normalize(self.page, self.per_page, PaginationLimits::default())
    }
}

/// Paginated list restricted to records modified after a timestamp.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListSinceParams {
    #[serde(flatten)]
    pub page: PageParams,

    /// Only return records modified since this date (ISO8601 format, e.g. '2024-01-01T00:00:00Z').
    #[serde(default)]
    pub since: Option<String>,
}

/// Parameters for `list_contacts`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListContactsParams {
    #[serde(flatten)]
    pub page: PageParams,

    /// Include archived contacts (default: false).
    #[serde(default)]
    pub archived: bool,

    /// Only return contacts modified since this date (ISO8601 format, e.g. '2024-01-01T00:00:00Z').
    #[serde(default)]
    pub since: Option<String>,
}

/// Keyword search over a paginated collection.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Search term matched against names, emails and organisations.
    pub keyword: String,

    #[serde(flatten)]
    pub page: PageParams,
}

/// Tools that take no arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NoParams {}

// ============================================================================
// Record Lookups
// ============================================================================

/// A parameter struct naming a single upstream record.
pub trait RecordId {
    fn record_id(&self) -> u64;
}

macro_rules! record_params {
    ($($name:ident { $field:ident } => $doc:literal;)*) => {
        $(
            #[doc = concat!("Parameters for looking up one ", $doc, ".")]
            #[derive(Debug, Clone, Deserialize, JsonSchema)]
            pub struct $name {
                #[doc = concat!("Numeric ID of the ", $doc, ".")]
                pub $field: u64,
            }

            impl RecordId for $name {
                fn record_id(&self) -> u64 {
                    self.$field
                }
            }
        )*
    };
}

record_params! {
    ContactIdParams { contact_id } => "contact";
    OpportunityIdParams { opportunity_id } => "opportunity";
    CaseIdParams { case_id } => "support case";
    TaskIdParams { task_id } => "task";
    EntryIdParams { entry_id } => "timeline entry";
    ProjectIdParams { project_id } => "project";
    TagIdParams { tag_id } => "tag";
    UserIdParams { user_id } => "user";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_defaults() {
        let params: PageParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(params.pagination(), Pagination { page: 1, per_page: 50 });
    }

    #[test]
    fn test_page_out_of_range_is_clamped() {
        let params: PageParams = serde_json::from_value(json!({"page": 0, "per_page": 500})).unwrap();
        assert_eq!(params.pagination(), Pagination { page: 1, per_page: 100 });

        let params: PageParams = serde_json::from_value(json!({"per_page": 0})).unwrap();
        assert_eq!(params.pagination().per_page, 50);
    }

    #[test]
    fn test_flattened_list_params() {
        let params: ListContactsParams =
            serde_json::from_value(json!({"page": 3, "archived": true})).unwrap();
        assert_eq!(params.page.page, 3);
        assert!(params.archived);
        assert!(params.since.is_none());

        let params: SearchParams = serde_json::from_value(json!({"keyword": "acme"})).unwrap();
        assert_eq!(params.keyword, "acme");
        assert_eq!(params.page.per_page, 50);
    }

    #[test]
    fn test_record_id() {
        let params: CaseIdParams = serde_json::from_value(json!({"case_id": 42})).unwrap();
        assert_eq!(params.record_id(), 42);
        assert!(serde_json::from_value::<CaseIdParams>(json!({})).is_err());
    }
}
