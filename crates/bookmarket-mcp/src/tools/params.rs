//! Input parameters for the bookmark tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
    Unlisted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListAllListsParams {
    #[serde(default)]
    #[schemars(description = "Include bookmarks in each list. Defaults to false for performance.")]
    pub include_bookmarks: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetListParams {
    #[schemars(description = "The ID of the list to retrieve.")]
    pub list_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateListParams {
    #[schemars(description = "The title of the list.")]
    pub title: String,
    #[serde(default)]
    #[schemars(description = "An optional description for the list.")]
    pub description: Option<String>,
    #[serde(default)]
    #[schemars(description = "The visibility of the list. Defaults to \"private\".")]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateListParams {
    #[schemars(description = "The ID of the list to update.")]
    pub list_id: u64,
    #[serde(default)]
    #[schemars(description = "The new title for the list.")]
    pub title: Option<String>,
    /// Empty string clears the description
    #[serde(default)]
    #[schemars(description = "The new description for the list. Pass empty string to clear.")]
    pub description: Option<String>,
    #[serde(default)]
    #[schemars(description = "The new visibility setting for the list.")]
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteListParams {
    #[schemars(description = "The ID of the list to delete.")]
    pub list_id: u64,
    #[schemars(
        description = "Must be true to confirm deletion. This prevents accidental deletions."
    )]
    pub confirm: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateBookmarkParams {
    #[schemars(description = "The ID of the list to add the bookmark to.")]
    pub list_id: u64,
    #[schemars(description = "The URL of the bookmark.")]
    pub url: String,
    #[schemars(description = "The title of the bookmark.")]
    pub title: String,
    #[serde(default)]
    #[schemars(description = "A brief description of the bookmark.")]
    pub description: Option<String>,
    #[serde(default)]
    #[schemars(description = "Personal notes about the bookmark.")]
    pub notes: Option<String>,
    #[serde(default)]
    #[schemars(
        description = "Array of tag names (strings). IMPORTANT: Use list_tags first to see existing tags and reuse them instead of creating duplicates."
    )]
    pub tags: Option<Vec<String>>,
}

/// Shared by `get_bookmark` and `delete_bookmark`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BookmarkIdParams {
    #[schemars(description = "The ID of the bookmark.")]
    pub bookmark_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateBookmarkParams {
    #[schemars(description = "The ID of the bookmark to update.")]
    pub bookmark_id: u64,
    #[serde(default)]
    #[schemars(description = "The new URL for the bookmark.")]
    pub url: Option<String>,
    #[serde(default)]
    #[schemars(description = "The new title for the bookmark.")]
    pub title: Option<String>,
    #[serde(default)]
    #[schemars(description = "The new description. Pass empty string to clear.")]
    pub description: Option<String>,
    #[serde(default)]
    #[schemars(description = "The new notes. Pass empty string to clear.")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MoveBookmarkParams {
    #[schemars(description = "The ID of the bookmark to move.")]
    pub bookmark_id: u64,
    #[schemars(description = "The ID of the list to move the bookmark to.")]
    pub target_list_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReorderBookmarksParams {
    #[schemars(description = "The ID of the list containing the bookmarks.")]
    pub list_id: u64,
    #[schemars(description = "Array of bookmark IDs (integers) in the desired order.")]
    pub bookmark_ids: Vec<u64>,
}

fn default_search_limit() -> u32 {
    25
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchBookmarksParams {
    #[schemars(
        description = "The search query. Searches title, URL, description, domain, and notes."
    )]
    pub query: String,
    #[serde(default)]
    #[schemars(description = "Optional list ID to limit search to a specific list.")]
    pub list_id: Option<u64>,
    #[serde(default = "default_search_limit")]
    #[schemars(
        description = "Maximum number of results to return. Default 25, max 100.",
        range(min = 1, max = 100)
    )]
    pub limit: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListTagsParams {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncBookmarkTagsParams {
    #[schemars(description = "The ID of the bookmark to update tags on.")]
    pub bookmark_id: u64,
    #[schemars(
        description = "Array of tag names (strings). This replaces all existing tags. Use empty array [] to remove all tags."
    )]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TagMerge {
    #[schemars(description = "Tag name to keep")]
    pub keep: String,
    #[schemars(description = "Tag names to merge into the kept tag")]
    pub remove: Vec<String>,
}

fn default_preview() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CleanupTagsParams {
    #[serde(default = "default_preview")]
    #[schemars(
        description = "If true (default), shows potential duplicates without making changes. Set to false and provide merge to apply changes."
    )]
    pub preview: bool,
    #[serde(default)]
    #[schemars(description = "Array of merge operations.")]
    pub merge: Vec<TagMerge>,
}
