//! MCP stdio server implementation

use super::tools::{get_tool_definitions, handle_tool_call};
use super::types::{ErrorCode, McpError, McpMessage, McpNotification, McpRequest, McpResponse};
use crate::config::Config;
use crate::embed::Embedder;
use crate::error::Result;
use crate::store::Store;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP server answering one JSON-RPC message per line
pub struct McpServer {
    config: Config,
    store: Store,
    embedder: Box<dyn Embedder>,
}

impl McpServer {
    pub fn new(config: Config, store: Store, embedder: Box<dyn Embedder>) -> Self {
        Self {
            config,
            store,
            embedder,
        }
    }

    /// Run the MCP server loop over stdio
    pub async fn run(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve until `reader` reaches end of input
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("MCP server starting on stdio");

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            debug!("Received: {}", line);

            if let Some(response) = self.handle_line(line).await {
                let response = serde_json::to_string(&response)?;
                debug!("Sending: {}", response);
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        info!("MCP server shutting down");
        Ok(())
    }

    /// Handle one raw line; `None` when no reply is due
    pub async fn handle_line(&self, line: &str) -> Option<McpResponse> {
        let message: McpMessage = match serde_json::from_str(line) {
            Ok(m) => m,
            Err(e) => {
                error!("Failed to parse message: {}", e);
                return Some(McpResponse::error(
                    Value::Null,
                    McpError::parse_error(format!("Parse error: {}", e)),
                ));
            }
        };

        match message {
            McpMessage::Request(request) => Some(self.handle_request(request).await),
            McpMessage::Notification(notification) => {
                self.handle_notification(notification);
                None
            }
            McpMessage::Response(_) => {
                warn!("Unexpected response message received");
                None
            }
        }
    }

    async fn handle_request(&self, request: McpRequest) -> McpResponse {
        let id = request.id.clone();

        if request.jsonrpc != "2.0" {
            return McpResponse::error(
                id,
                McpError::new(ErrorCode::InvalidRequest, "Unsupported jsonrpc version"),
            );
        }

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "tools/list" => McpResponse::success(id, json!({ "tools": get_tool_definitions() })),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "resources/list" => McpResponse::success(id, json!({ "resources": [] })),
            "prompts/list" => McpResponse::success(id, json!({ "prompts": [] })),
            "ping" => McpResponse::success(id, json!({})),
            method => McpResponse::error(id, McpError::method_not_found(method)),
        }
    }

    fn handle_notification(&self, notification: McpNotification) {
        match notification.method.as_str() {
            "notifications/initialized" => info!("Client initialized"),
            "notifications/cancelled" => info!("Request cancelled"),
            other => debug!("Unknown notification: {}", other),
        }
    }

    fn handle_initialize(&self, id: Value) -> McpResponse {
        McpResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": "grimoire",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    async fn handle_tools_call(&self, id: Value, params: Option<Value>) -> McpResponse {
        let Some(params) = params else {
            return McpResponse::error(id, McpError::invalid_params("Missing params"));
        };

        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return McpResponse::error(id, McpError::invalid_params("Missing tool name"));
        };

        let arguments: HashMap<String, Value> = params
            .get("arguments")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        debug!("Calling tool: {} with args: {:?}", name, arguments);

        let result = handle_tool_call(
            name,
            &arguments,
            &self.config,
            &self.store,
            self.embedder.as_ref(),
        )
        .await;

        match serde_json::to_value(&result) {
            Ok(value) => McpResponse::success(id, value),
            Err(e) => McpResponse::error(
                id,
                McpError::new(ErrorCode::InternalError, e.to_string()),
            ),
        }
    }
}
