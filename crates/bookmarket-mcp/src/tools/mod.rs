//! Bookmark tool catalog
//!
//! The catalog only describes tools. Executing them is delegated to a
//! [`ToolExecutor`] supplied by the embedding application.

mod params;

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::ErrorData;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use params::{
    BookmarkIdParams, CleanupTagsParams, CreateBookmarkParams, CreateListParams,
    DeleteListParams, GetListParams, ListAllListsParams, ListTagsParams, MoveBookmarkParams,
    ReorderBookmarksParams, SearchBookmarksParams, SyncBookmarkTagsParams, TagMerge,
    UpdateBookmarkParams, UpdateListParams, Visibility,
};

use crate::auth::permissions as p;
use crate::auth::{Principal, ToolDescriptor};

const fn tool(
    name: &'static str,
    title: &'static str,
    description: &'static str,
    permission: &'static str,
) -> ToolDescriptor {
    ToolDescriptor::new(name, title, description)
        .requires(permission)
        .authenticated()
}

pub static CATALOG: [ToolDescriptor; 15] = [
    // Lists
    tool(
        "list_all_lists",
        "List all lists",
        "Get all bookmark lists for the authenticated user.",
        p::LISTS_READ,
    )
    .read_only(),
    tool(
        "get_list",
        "Get list",
        "Get a specific bookmark list with its bookmarks.",
        p::LISTS_READ,
    )
    .read_only(),
    tool(
        "create_list",
        "Create list",
        "Create a new bookmark list for the authenticated user.",
        p::LISTS_WRITE,
    )
    .policy_checked(),
    tool(
        "update_list",
        "Update list",
        "Update an existing bookmark list.",
        p::LISTS_WRITE,
    )
    .policy_checked(),
    tool(
        "delete_list",
        "Delete list",
        "Delete a bookmark list and all its bookmarks. This action cannot be undone.",
        p::LISTS_DELETE,
    )
    .policy_checked()
    .destructive(),
    // Bookmarks
    tool(
        "create_bookmark",
        "Create bookmark",
        "Create a new bookmark in a specified list. IMPORTANT: Before creating, use list_tags to see existing tags and reuse them when appropriate instead of creating duplicates.",
        p::BOOKMARKS_WRITE,
    )
    .policy_checked(),
    tool(
        "get_bookmark",
        "Get bookmark",
        "Get details of a specific bookmark.",
        p::BOOKMARKS_READ,
    )
    .policy_checked()
    .read_only(),
    tool(
        "update_bookmark",
        "Update bookmark",
        "Update an existing bookmark.",
        p::BOOKMARKS_WRITE,
    ),
    tool(
        "delete_bookmark",
        "Delete bookmark",
        "Delete a bookmark. This action cannot be undone.",
        p::BOOKMARKS_DELETE,
    )
    .policy_checked()
    .destructive(),
    tool(
        "move_bookmark",
        "Move bookmark",
        "Move a bookmark from one list to another.",
        p::BOOKMARKS_WRITE,
    ),
    tool(
        "reorder_bookmarks",
        "Reorder bookmarks",
        "Reorder bookmarks within a list by providing an ordered array of bookmark IDs.",
        p::BOOKMARKS_WRITE,
    )
    .policy_checked(),
    // Search & tags
    tool(
        "search_bookmarks",
        "Search bookmarks",
        "Search across all bookmarks by title, URL, description, or domain.",
        p::BOOKMARKS_READ,
    )
    .policy_checked()
    .read_only(),
    tool(
        "list_tags",
        "List tags",
        "List all existing tags with bookmark counts. IMPORTANT: Always call this before creating/updating bookmarks to see available tags and reuse them instead of creating duplicates.",
        p::TAGS_READ,
    )
    .policy_checked()
    .read_only(),
    tool(
        "sync_bookmark_tags",
        "Sync bookmark tags",
        "Update the tags on a bookmark. IMPORTANT: Use list_tags first to see existing tags and reuse them instead of creating duplicates.",
        p::TAGS_WRITE,
    )
    .policy_checked(),
    tool(
        "cleanup_tags",
        "Clean up tags",
        "Find and merge duplicate or similar tags. Use preview mode first to see what would be merged, then confirm to apply changes.",
        p::TAGS_WRITE,
    )
    .destructive(),
];

pub fn find(name: &str) -> Option<&'static ToolDescriptor> {
    CATALOG.iter().find(|tool| tool.name == name)
}

fn schema<T: JsonSchema>() -> Arc<JsonObject> {
    match serde_json::to_value(schemars::schema_for!(T)) {
        Ok(Value::Object(object)) => Arc::new(object),
        _ => Arc::new(JsonObject::new()),
    }
}

fn check<T: DeserializeOwned>(arguments: &JsonObject) -> Result<(), serde_json::Error> {
    serde_json::from_value::<T>(Value::Object(arguments.clone())).map(drop)
}

type SchemaFn = fn() -> Arc<JsonObject>;
type CheckFn = fn(&JsonObject) -> Result<(), serde_json::Error>;

fn parameters(name: &str) -> Option<(SchemaFn, CheckFn)> {
    macro_rules! params {
        ($ty:ty) => {
            Some((schema::<$ty> as SchemaFn, check::<$ty> as CheckFn))
        };
    }

    match name {
        "list_all_lists" => params!(ListAllListsParams),
        "get_list" => params!(GetListParams),
        "create_list" => params!(CreateListParams),
        "update_list" => params!(UpdateListParams),
        "delete_list" => params!(DeleteListParams),
        "create_bookmark" => params!(CreateBookmarkParams),
        "get_bookmark" | "delete_bookmark" => params!(BookmarkIdParams),
        "update_bookmark" => params!(UpdateBookmarkParams),
        "move_bookmark" => params!(MoveBookmarkParams),
        "reorder_bookmarks" => params!(ReorderBookmarksParams),
        "search_bookmarks" => params!(SearchBookmarksParams),
        "list_tags" => params!(ListTagsParams),
        "sync_bookmark_tags" => params!(SyncBookmarkTagsParams),
        "cleanup_tags" => params!(CleanupTagsParams),
        _ => None,
    }
}

/// JSON schema of a tool's arguments; unknown tools get an empty object schema
pub fn input_schema(name: &str) -> Arc<JsonObject> {
    parameters(name).map_or_else(|| Arc::new(JsonObject::new()), |(schema, _)| schema())
}

/// Reject arguments that do not deserialize into the tool's parameter type
pub fn validate_arguments(name: &str, arguments: &JsonObject) -> Result<(), ErrorData> {
    let Some((_, check)) = parameters(name) else {
        return Err(ErrorData::invalid_params(format!("Unknown tool: {name}"), None));
    };
    check(arguments).map_err(|e| {
        ErrorData::invalid_params(format!("Invalid arguments for {name}: {e}"), None)
    })
}

/// Business logic behind the catalog
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        tool: &ToolDescriptor,
        principal: Option<&Principal>,
        arguments: JsonObject,
    ) -> Result<Value, ErrorData>;
}

/// Executor installed when no bookmark backend is wired in
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableExecutor;

#[async_trait]
impl ToolExecutor for UnavailableExecutor {
    async fn execute(
        &self,
        tool: &ToolDescriptor,
        _principal: Option<&Principal>,
        _arguments: JsonObject,
    ) -> Result<Value, ErrorData> {
        tracing::debug!(tool = tool.name, "No tool backend configured");
        Err(ErrorData::internal_error("tool backend not configured", None))
    }
}
