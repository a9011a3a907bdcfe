//! Capsule CRM tool definitions.
//!
//! Most tools are a thin mapping from typed parameters to one upstream
//! endpoint, so they are declared in tables and built by a handful of
//! generic constructors. The three filter-based tools are spelled out.

use std::sync::Arc;

use rmcp::model::Tool;
use serde_json::{Map, Value};
use tracing::debug;

use super::params::{
    CaseIdParams, ContactIdParams, EntryIdParams, ListContactsParams, ListSinceParams, NoParams,
    OpportunityIdParams, PageParams, ProjectIdParams, RecordId, SearchParams, TagIdParams,
    TaskIdParams, UserIdParams,
};
use crate::client::{ApiClient, RequestOptions};
use crate::domains::tools::params::{
    FilterCondition, OrderBy, SortDirection, build_api_params, build_filter_query,
    build_search_params,
};
use crate::domains::tools::{ToolError, ToolHandler, ToolSurface, typed_tool};

type Client = Arc<ApiClient>;

/// `(category, name, description, endpoint)`
type Route = (&'static str, &'static str, &'static str, &'static str);

// ============================================================================
// Upstream Calls
// ============================================================================

async fn fetch(client: Client, endpoint: String, query: Map<String, Value>) -> Result<Value, ToolError> {
    debug!("GET {} {:?}", endpoint, query);
    let options = if query.is_empty() {
        RequestOptions::new()
    } else {
        RequestOptions::new().query(query)
    };
    Ok(client.get(&endpoint, options).await?)
}

async fn filter(client: Client, endpoint: &'static str, body: Value) -> Result<Value, ToolError> {
    debug!("POST {}", endpoint);
    Ok(client.post(endpoint, RequestOptions::new().json(body)).await?)
}

// ============================================================================
// Tool Tables
// ============================================================================

const PAGED_SINCE: &[Route] = &[
    (
        "opportunities",
        "list_opportunities",
        "Return a paginated list of opportunities.",
        "opportunities",
    ),
    ("cases", "list_cases", "Return a paginated list of support cases.", "kases"),
    ("tasks", "list_tasks", "Return a paginated list of tasks.", "tasks"),
    (
        "entries",
        "list_entries",
        "Return timeline entries (notes, emails, calls, etc.).",
        "entries",
    ),
    ("projects", "list_projects", "Return a paginated list of projects.", "projects"),
];

const PAGED: &[Route] = &[
    ("tags", "list_tags", "Return a paginated list of tags.", "tags"),
    ("users", "list_users", "Return a paginated list of users.", "users"),
    ("products", "list_products", "Return a paginated list of products.", "products"),
    (
        "products",
        "list_categories",
        "Return a paginated list of product categories.",
        "categories",
    ),
];

const SEARCH: &[Route] = &[
    (
        "contacts",
        "search_contacts",
        "Fuzzy search contacts by name, email, or organisation.",
        "parties/search",
    ),
    ("cases", "search_cases", "Search support cases by keyword.", "kases/search"),
];

const REFERENCE: &[Route] = &[
    ("reference", "list_pipelines", "Return a list of sales pipelines.", "pipelines"),
    ("reference", "list_stages", "Return a list of pipeline stages.", "stages"),
    ("reference", "list_milestones", "Return a list of opportunity milestones.", "milestones"),
    (
        "reference",
        "list_custom_fields",
        "Return a list of custom field definitions.",
        "fieldDefinitions",
    ),
    ("reference", "list_currencies", "Return a list of supported currencies.", "currencies"),
];

// ============================================================================
// Generic Constructors
// ============================================================================

fn paged_since_tool(route: &Route, client: &Client) -> (Tool, ToolHandler) {
    let (_, name, description, endpoint) = *route;
    let client = client.clone();
    typed_tool(name, description, move |p: ListSinceParams| {
        let page = p.page.pagination();
        let query = build_api_params(
            Some(page.page),
            Some(page.per_page),
            p.since.as_deref(),
            None,
            &[],
        );
        fetch(client.clone(), endpoint.to_string(), query)
    })
}

fn paged_tool(route: &Route, client: &Client) -> (Tool, ToolHandler) {
    let (_, name, description, endpoint) = *route;
    let client = client.clone();
    typed_tool(name, description, move |p: PageParams| {
        let page = p.pagination();
        let query = build_api_params(Some(page.page), Some(page.per_page), None, None, &[]);
        fetch(client.clone(), endpoint.to_string(), query)
    })
}

fn search_tool(route: &Route, client: &Client) -> (Tool, ToolHandler) {
    let (_, name, description, endpoint) = *route;
    let client = client.clone();
    typed_tool(name, description, move |p: SearchParams| {
        let page = p.page.pagination();
        let query = build_search_params(&p.keyword, page.page, page.per_page, &[]);
        fetch(client.clone(), endpoint.to_string(), query)
    })
}

fn reference_tool(route: &Route, client: &Client) -> (Tool, ToolHandler) {
    let (_, name, description, endpoint) = *route;
    let client = client.clone();
    typed_tool(name, description, move |_: NoParams| {
        fetch(client.clone(), endpoint.to_string(), Map::new())
    })
}

fn record_tool<P>(
    name: &'static str,
    description: &'static str,
    collection: &'static str,
    client: &Client,
) -> (Tool, ToolHandler)
where
    P: RecordId + serde::de::DeserializeOwned + schemars::JsonSchema + Send + 'static,
{
    let client = client.clone();
    typed_tool(name, description, move |p: P| {
        let endpoint = format!("{}/{}", collection, p.record_id());
        fetch(client.clone(), endpoint, Map::new())
    })
}

// ============================================================================
// Filter-based Tools
// ============================================================================

fn list_contacts(client: &Client) -> (Tool, ToolHandler) {
    let client = client.clone();
    typed_tool(
        "list_contacts",
        "Return a paginated list of contacts. Set archived=true to include archived contacts.",
        move |p: ListContactsParams| {
            let page = p.page.pagination();
            let query = build_api_params(
                Some(page.page),
                Some(page.per_page),
                p.since.as_deref(),
                Some(p.archived),
                &[],
            );
            fetch(client.clone(), "parties".to_string(), query)
        },
    )
}

fn list_recent_contacts(client: &Client) -> (Tool, ToolHandler) {
    let client = client.clone();
    typed_tool(
        "list_recent_contacts",
        "Return people sorted by most recently contacted.",
        move |p: PageParams| {
            let page = p.pagination();
            let conditions = [FilterCondition::new("type", "is", "person")];
            let order = [OrderBy::new("lastContactedOn", SortDirection::Descending)];
            let body = build_filter_query(&conditions, Some(&order[..]), page.page, page.per_page);
            filter(client.clone(), "parties/filters/results", body)
        },
    )
}

fn list_open_opportunities(client: &Client) -> (Tool, ToolHandler) {
    let client = client.clone();
    typed_tool(
        "list_open_opportunities",
        "Return opportunities that are neither won nor lost, soonest expected close first.",
        move |p: PageParams| {
            let page = p.pagination();
            let conditions = [
                FilterCondition::new("milestone", "is not", "won"),
                FilterCondition::new("milestone", "is not", "lost"),
            ];
            let order = [OrderBy::new("expectedCloseOn", SortDirection::Ascending)];
            let body = build_filter_query(&conditions, Some(&order[..]), page.page, page.per_page);
            filter(client.clone(), "opportunities/filters/results", body)
        },
    )
}

// ============================================================================
// Registration
// ============================================================================

/// Register every Capsule tool on `surface`, grouped by category.
pub(super) fn register(client: &Client, surface: &mut ToolSurface) {
    let (tool, handler) = list_contacts(client);
    surface.register_in("contacts", tool, handler);
    let (tool, handler) = list_recent_contacts(client);
    surface.register_in("contacts", tool, handler);
    let (tool, handler) = list_open_opportunities(client);
    surface.register_in("opportunities", tool, handler);

    for route in SEARCH {
        let (tool, handler) = search_tool(route, client);
        surface.register_in(route.0, tool, handler);
    }
    for route in PAGED_SINCE {
        let (tool, handler) = paged_since_tool(route, client);
        surface.register_in(route.0, tool, handler);
    }
    for route in PAGED {
        let (tool, handler) = paged_tool(route, client);
        surface.register_in(route.0, tool, handler);
    }
    for route in REFERENCE {
        let (tool, handler) = reference_tool(route, client);
        surface.register_in(route.0, tool, handler);
    }

    let records = [
        (
            "contacts",
            record_tool::<ContactIdParams>(
                "get_contact",
                "Get detailed information about a specific contact.",
                "parties",
                client,
            ),
        ),
        (
            "opportunities",
            record_tool::<OpportunityIdParams>(
                "get_opportunity",
                "Get detailed information about a specific opportunity.",
                "opportunities",
                client,
            ),
        ),
        (
            "cases",
            record_tool::<CaseIdParams>(
                "get_case",
                "Get detailed information about a specific support case.",
                "kases",
                client,
            ),
        ),
        (
            "tasks",
            record_tool::<TaskIdParams>(
                "get_task",
                "Get detailed information about a specific task.",
                "tasks",
                client,
            ),
        ),
        (
            "entries",
            record_tool::<EntryIdParams>(
                "get_entry",
                "Get detailed information about a specific timeline entry.",
                "entries",
                client,
            ),
        ),
        (
            "projects",
            record_tool::<ProjectIdParams>(
                "get_project",
                "Get detailed information about a specific project.",
                "projects",
                client,
            ),
        ),
        (
            "tags",
            record_tool::<TagIdParams>(
                "get_tag",
                "Get detailed information about a specific tag.",
                "tags",
                client,
            ),
        ),
        (
            "users",
            record_tool::<UserIdParams>(
                "get_user",
                "Get detailed information about a specific user.",
                "users",
                client,
            ),
        ),
    ];
    for (category, (tool, handler)) in records {
        surface.register_in(category, tool, handler);
    }
}
