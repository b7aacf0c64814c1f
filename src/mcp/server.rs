//! MCP Server
//!
//! Dispatches JSON-RPC requests to the picotool engine.
//!
//! # Lifecycle
//!
//! 1. Client sends `initialize`, server answers with its info and capabilities
//! 2. Client sends `notifications/initialized`
//! 3. Client lists and calls tools until it closes stdin
//!
//! Every `tools/call` runs in its own task so that a slow device command never
//! stops the loop from accepting further requests. Responses are funnelled
//! through a channel to a single writer, so they may leave in a different order
//! than requests arrived; ids correlate them.
//!
//! A failed picotool command is not a protocol error. It is reported as a tool
//! result with `isError: true`, and the server carries on.

use crate::mcp::protocol::{
    CallToolResult, InitializeParams, InitializeResult, McpError, McpMethod, McpRequest,
    McpResponse, ServerInfo, Tool, ToolCallParams, DEFAULT_PROTOCOL_VERSION,
};
use crate::mcp::tools;
use crate::mcp::transport::{Incoming, MessageReader, MessageWriter};
use crate::picotool::{self, Executor, Operation};
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Name reported in `serverInfo`
pub const SERVER_NAME: &str = "picotool-mcp-server";

/// Responses buffered between request tasks and the writer
const RESPONSE_CHANNEL_SIZE: usize = 64;

/// MCP server over a picotool [`Executor`].
///
/// Cheap to clone; clones share the executor and the tool catalog.
#[derive(Debug, Clone)]
pub struct McpServer {
    executor: Arc<Executor>,
    tools: Arc<Vec<Tool>>,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(executor: Executor) -> Self {
        Self {
            executor: Arc::new(executor),
            tools: Arc::new(tools::catalog()),
            info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Handle one request. Notifications produce no response.
    pub async fn handle(&self, request: McpRequest) -> Option<McpResponse> {
        let method = McpMethod::from(request.method.as_str());

        let Some(id) = request.id else {
            match method {
                McpMethod::Initialized => info!("Client finished initialization"),
                other => debug!("Ignoring notification: {}", other.as_str()),
            }
            return None;
        };

        let result = match method {
            McpMethod::Initialize => self.initialize(request.params),
            McpMethod::Ping => Ok(json!({})),
            McpMethod::ToolsList => Ok(json!({ "tools": self.tools.as_slice() })),
            McpMethod::ToolsCall => self
                .call_tool(request.params)
                .await
                .and_then(|result| to_value(&result)),
            McpMethod::Initialized | McpMethod::Other(_) => {
                Err(McpError::method_not_found(request.method))
            }
        };

        Some(match result {
            Ok(value) => McpResponse::ok(id, value),
            Err(err) => {
                warn!("Request {} failed: {}", id, err);
                McpResponse::err(id, err)
            }
        })
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: InitializeParams = match params {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| McpError::invalid_params(format!("Invalid initialize params: {}", e)))?,
            None => InitializeParams::default(),
        };

        if let Some(client) = &params.client_info {
            info!("Initializing session with {} {}", client.name, client.version);
        }

        to_value(&InitializeResult {
            protocol_version: params
                .protocol_version
                .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
            capabilities: json!({ "tools": {} }),
            server_info: self.info.clone(),
        })
    }

    /// Decode, validate and run a `tools/call`.
    ///
    /// Protocol-level problems (unknown tool, bad arguments) are `Err`; picotool
    /// failures are `Ok` with `is_error` set.
    pub async fn call_tool(&self, params: Option<Value>) -> Result<CallToolResult, McpError> {
        let params = params.ok_or_else(|| McpError::invalid_params("Missing tool call parameters"))?;
        let ToolCallParams { name, arguments } = serde_json::from_value(params)
            .map_err(|e| McpError::invalid_params(format!("Invalid tool call parameters: {}", e)))?;

        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| McpError::invalid_params(format!("Unknown tool: {}", name)))?;

        let unknown = tools::unknown_arguments(tool, &arguments);
        if !unknown.is_empty() {
            return Err(McpError::invalid_params(format!(
                "Invalid arguments for {}: unknown parameter(s): {}",
                name,
                unknown.join(", ")
            )));
        }

        let operation = Operation::from_tool_call(&name, arguments.clone())
            .map_err(|e| McpError::invalid_params(e.to_string()))?;

        info!("Running picotool {} with options={}", operation.label(), arguments);

        match picotool::run(&self.executor, &operation).await {
            Ok(output) => Ok(CallToolResult::text(output)),
            Err(e) => {
                let message = format!("Error running picotool {}: {}", operation.label(), e);
                error!("{}", message);
                Ok(CallToolResult::error(message))
            }
        }
    }

    /// Serve requests until the reader reaches end of input.
    ///
    /// In-flight tool calls are allowed to finish and their responses are
    /// written before this returns, also when reading the input fails. A read
    /// failure is returned only after that drain.
    pub async fn serve<R, W>(self, mut reader: MessageReader<R>, writer: MessageWriter<W>) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<McpResponse>(RESPONSE_CHANNEL_SIZE);
        let writer_task = tokio::spawn(write_responses(writer, rx));
        let mut in_flight = JoinSet::new();

        info!("MCP server ready on stdio");

        let mut read_failure = None;
        loop {
            let incoming = match reader.recv().await {
                Ok(Some(incoming)) => incoming,
                Ok(None) => break,
                Err(e) => {
                    error!("Stopped reading requests: {:#}", e);
                    read_failure = Some(e);
                    break;
                }
            };

            let request = match incoming {
                Incoming::Request(request) => request,
                Incoming::Malformed { id, error } => {
                    warn!("Rejecting malformed message: {}", error);
                    if tx.send(McpResponse::err(id, error)).await.is_err() {
                        break;
                    }
                    continue;
                }
            };

            if McpMethod::from(request.method.as_str()) == McpMethod::ToolsCall {
                let server = self.clone();
                let tx = tx.clone();
                in_flight.spawn(async move {
                    if let Some(response) = server.handle(request).await {
                        // The writer only goes away when stdout is closed.
                        let _ = tx.send(response).await;
                    }
                });
            } else if let Some(response) = self.handle(request).await {
                if tx.send(response).await.is_err() {
                    break;
                }
            }

            // Reap finished calls so the set doesn't grow without bound.
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    error!("Tool call task failed: {}", e);
                }
            }
        }

        info!("Input closed, waiting for {} in-flight call(s)", in_flight.len());
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!("Tool call task failed: {}", e);
            }
        }

        drop(tx);
        writer_task.await??;
        match read_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn write_responses<W>(mut writer: MessageWriter<W>, mut rx: mpsc::Receiver<McpResponse>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        writer.send(&response).await?;
    }
    Ok(())
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::internal_error(e.to_string()))
}
