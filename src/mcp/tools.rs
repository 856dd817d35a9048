//! MCP tool definitions and handlers

use super::types::{ToolDefinition, ToolResult};
use crate::commands::{cmd_list_sources, cmd_list_topics, cmd_query, QueryOptions, QueryResult};
use crate::config::Config;
use crate::embed::Embedder;
use crate::error::Error;
use crate::store::Store;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::error;

const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 20;

/// Get all available tool definitions
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "query".to_string(),
            description: "Search the documentation knowledge base. Returns the passages most relevant to a natural language question.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Natural language question or keywords"
                    },
                    "topic": {
                        "type": "string",
                        "description": "Optional: restrict the search to one topic, e.g. 'go'"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results to return (default: 5, max: 20)",
                        "default": DEFAULT_LIMIT,
                        "minimum": 1,
                        "maximum": MAX_LIMIT
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "list_topics".to_string(),
            description: "List the topics installed in the knowledge base.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDefinition {
            name: "list_sources".to_string(),
            description: "List documentation sources, optionally for one topic.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "Optional: only list sources of this topic"
                    }
                }
            }),
        },
    ]
}

/// Handle a tool call
pub async fn handle_tool_call(
    name: &str,
    arguments: &HashMap<String, Value>,
    config: &Config,
    store: &Store,
    embedder: &dyn Embedder,
) -> ToolResult {
    match name {
        "query" => handle_query(arguments, config, store, embedder).await,
        "list_topics" => handle_list_topics(store).await,
        "list_sources" => handle_list_sources(arguments, store).await,
        _ => ToolResult::error(format!("Unknown tool: {}", name)),
    }
}

/// Topic argument; `language` is accepted for older clients
fn topic_argument(arguments: &HashMap<String, Value>) -> Option<String> {
    arguments
        .get("topic")
        .or_else(|| arguments.get("language"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

fn topic_not_found(topic: &str) -> ToolResult {
    ToolResult::text(format!("Topic \"{}\" not found in knowledge base.", topic))
}

async fn handle_query(
    arguments: &HashMap<String, Value>,
    config: &Config,
    store: &Store,
    embedder: &dyn Embedder,
) -> ToolResult {
    let query = match arguments.get("query") {
        Some(Value::String(q)) if !q.trim().is_empty() => q.clone(),
        _ => return ToolResult::error("Missing required parameter: query"),
    };

    let limit = arguments
        .get("limit")
        .and_then(Value::as_u64)
        .map(|v| (v as usize).clamp(1, MAX_LIMIT))
        .unwrap_or(DEFAULT_LIMIT);
    let topic = topic_argument(arguments);

    let options = QueryOptions {
        topic: topic.clone(),
        limit: Some(limit),
        vector_only: false,
    };

    match cmd_query(config, store, embedder, &query, options).await {
        Ok(result) => ToolResult::text(format_query_result(&result)),
        Err(Error::NotFound(_)) if topic.is_some() => {
            topic_not_found(topic.as_deref().unwrap_or_default())
        }
        Err(e) => {
            error!("Query tool failed: {}", e);
            ToolResult::error(format!("Search failed: {}", e))
        }
    }
}

fn format_query_result(result: &QueryResult) -> String {
    if result.results.is_empty() {
        return "No results found for the query.".to_string();
    }

    let mut output = String::new();
    for (i, hit) in result.results.iter().enumerate() {
        output.push_str(&format!(
            "## Result {} (relevance: {:.1}%)\n",
            i + 1,
            hit.relevance * 100.0
        ));
        output.push_str(&format!("**Title:** {}\n", hit.title));
        output.push_str(&format!("**Level:** {}\n", hit.level));
        if !hit.breadcrumbs.is_empty() {
            output.push_str(&format!("**Section:** {}\n", hit.breadcrumbs.join(" > ")));
        }
        output.push('\n');
        output.push_str(&hit.content);
        output.push_str("\n\n---\n\n");
    }
    output
}

async fn handle_list_topics(store: &Store) -> ToolResult {
    match cmd_list_topics(store).await {
        Ok(topics) => {
            if topics.is_empty() {
                return ToolResult::text(
                    "No topics installed. Use 'grimoire ingest <manifest>' to add documentation.",
                );
            }

            let mut output = String::from("Installed topics:\n\n");
            for topic in &topics {
                output.push_str(&format!("- **{}** ({})\n", topic.display_name, topic.name));
            }
            ToolResult::text(output)
        }
        Err(e) => ToolResult::error(format!("Failed to list topics: {}", e)),
    }
}

async fn handle_list_sources(arguments: &HashMap<String, Value>, store: &Store) -> ToolResult {
    let topic = topic_argument(arguments);

    match cmd_list_sources(store, topic.as_deref()).await {
        Ok(sources) => {
            if sources.is_empty() {
                return ToolResult::text("No sources found.");
            }

            let mut output = match &topic {
                Some(t) => format!("Sources for {}:\n\n", t),
                None => "All sources:\n\n".to_string(),
            };
            for info in &sources {
                output.push_str(&format!(
                    "- **{}** ({}): {}\n",
                    info.source.name, info.source.kind, info.source.url
                ));
            }
            ToolResult::text(output)
        }
        Err(Error::NotFound(_)) if topic.is_some() => {
            topic_not_found(topic.as_deref().unwrap_or_default())
        }
        Err(e) => ToolResult::error(format!("Failed to list sources: {}", e)),
    }
}
