//! MCP server implementation

use std::fmt;
use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParams, CallToolResult, JsonObject, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo, Tool, ToolAnnotations,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData, ServerHandler as RmcpServerHandler};

use crate::auth::{Principal, ToolAuthorizer, ToolDescriptor, request_principal};
use crate::tools::{self, CATALOG, ToolExecutor};

const INSTRUCTIONS: &str = "Bookmarket is a bookmark management application. Use these tools \
to manage the authenticated user's bookmark lists, bookmarks and tags. The tools you can see \
depend on your role. Always call list_tags before creating or updating bookmarks so existing \
tags are reused instead of duplicated.";

#[derive(Clone)]
pub struct BookmarketServer {
    authorizer: ToolAuthorizer,
    executor: Arc<dyn ToolExecutor>,
}

impl fmt::Debug for BookmarketServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookmarketServer")
            .field("authorizer", &self.authorizer)
            .field("executor", &"<ToolExecutor>")
            .finish()
    }
}

fn record(tool: &str, outcome: &'static str) {
    #[cfg(feature = "metrics")]
    crate::observability::record_tool_call(tool, outcome);
    #[cfg(not(feature = "metrics"))]
    let _ = (tool, outcome);
}

fn to_tool(descriptor: &ToolDescriptor) -> Tool {
    Tool::new(
        descriptor.name,
        descriptor.description,
        tools::input_schema(descriptor.name),
    )
    .annotate(
        ToolAnnotations::with_title(descriptor.title)
            .read_only(descriptor.read_only)
            .destructive(descriptor.destructive),
    )
}

impl BookmarketServer {
    pub fn new(authorizer: ToolAuthorizer, executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            authorizer,
            executor,
        }
    }

    pub const fn authorizer(&self) -> &ToolAuthorizer {
        &self.authorizer
    }

    /// Tools the caller may see
    pub async fn tools_for(&self, principal: Option<&Principal>) -> Vec<Tool> {
        let visible = self.authorizer.visible_tools(&CATALOG, principal).await;
        tracing::debug!(
            subject = principal.map_or("anonymous", |p| p.identity_id.as_str()),
            visible = visible.len(),
            total = CATALOG.len(),
            "Listing tools"
        );
        visible.into_iter().map(to_tool).collect()
    }

    /// Authorize and dispatch one tool call
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
        principal: Option<&Principal>,
    ) -> Result<CallToolResult, ErrorData> {
        let Some(tool) = tools::find(name) else {
            record(name, "unknown");
            return Err(ErrorData::invalid_params(format!("Unknown tool: {name}"), None));
        };

        // Hidden and unauthorized tools answer the same way
        if !self.authorizer.authorize(tool, principal).await {
            tracing::warn!(
                tool = tool.name,
                subject = principal.map_or("anonymous", |p| p.identity_id.as_str()),
                "Tool call denied"
            );
            record(tool.name, "denied");
            return Err(ErrorData::invalid_request(
                format!("Tool not available: {name}"),
                None,
            ));
        }

        let arguments = arguments.unwrap_or_default();
        if let Err(e) = tools::validate_arguments(tool.name, &arguments) {
            record(tool.name, "invalid_arguments");
            return Err(e);
        }

        match self.executor.execute(tool, principal, arguments).await {
            Ok(value) => {
                record(tool.name, "success");
                Ok(CallToolResult::structured(value))
            }
            Err(e) => {
                tracing::warn!(tool = tool.name, error = %e.message, "Tool call failed");
                record(tool.name, "error");
                Err(e)
            }
        }
    }
}

impl RmcpServerHandler for BookmarketServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.instructions = Some(INSTRUCTIONS.to_string());
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = self.tools_for(request_principal(&context)).await;
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.invoke(&request.name, request.arguments, request_principal(&context))
            .await
    }
}
