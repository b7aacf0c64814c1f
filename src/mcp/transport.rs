//! MCP Transport Layer
//!
//! Line-delimited JSON-RPC over a byte stream. The server reads requests from
//! stdin and writes responses to stdout, one JSON object per line. stderr is
//! left to logging.
//!
//! Reading and writing are separate halves so that the dispatch loop can keep
//! accepting requests while a writer task drains responses of calls that
//! finished in the background.

use crate::mcp::protocol::{McpError, McpRequest, McpResponse};
use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// One decoded inbound line
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Request(McpRequest),

    /// The line wasn't a valid JSON-RPC request; answer `id` with this error.
    /// `id` is `null` unless the line was a JSON object carrying one.
    Malformed { id: Value, error: McpError },
}

impl Incoming {
    fn malformed(id: Value, error: McpError) -> Self {
        Self::Malformed { id, error }
    }
}

/// Reading half: decodes one JSON-RPC request per line.
pub struct MessageReader<R> {
    reader: BufReader<R>,

    /// Reusable buffer for raw line bytes
    line_buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_buffer: Vec::with_capacity(4096),
        }
    }

    /// Receive the next message, or `None` once the client closes the stream.
    ///
    /// Blank lines are skipped. Lines that are not valid UTF-8 or not valid
    /// JSON-RPC come back as [`Incoming::Malformed`] instead of an error so the
    /// loop can keep going. `Err` is reserved for the stream itself failing.
    pub async fn recv(&mut self) -> Result<Option<Incoming>> {
        loop {
            self.line_buffer.clear();

            let bytes_read = self
                .reader
                .read_until(b'\n', &mut self.line_buffer)
                .await
                .context("Failed to read from MCP client")?;

            if bytes_read == 0 {
                return Ok(None);
            }

            let line = match std::str::from_utf8(&self.line_buffer) {
                Ok(line) => line.trim(),
                Err(e) => {
                    return Ok(Some(Incoming::malformed(
                        Value::Null,
                        McpError::parse_error(format!("Parse error: invalid UTF-8: {}", e)),
                    )));
                }
            };
            if line.is_empty() {
                continue;
            }

            tracing::debug!("Received from MCP client: {}", line);

            return Ok(Some(decode(line)));
        }
    }
}

fn decode(line: &str) -> Incoming {
    let value = match serde_json::from_str::<Value>(line) {
        Ok(value) => value,
        Err(e) => {
            return Incoming::malformed(
                Value::Null,
                McpError::parse_error(format!("Parse error: {}", e)),
            )
        }
    };

    // Keep a usable id so the client can correlate the rejection.
    let id = match value.get("id") {
        Some(id @ (Value::String(_) | Value::Number(_))) => id.clone(),
        _ => Value::Null,
    };

    match serde_json::from_value::<McpRequest>(value) {
        Ok(request) => Incoming::Request(request),
        Err(e) => Incoming::malformed(
            id,
            McpError::invalid_request(format!("Invalid request: {}", e)),
        ),
    }
}

/// Writing half: encodes one JSON-RPC response per line.
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Send a response, flushing so the client sees it immediately.
    pub async fn send(&mut self, response: &McpResponse) -> Result<()> {
        let json =
            serde_json::to_string(response).context("Failed to serialize MCP response to JSON")?;

        tracing::debug!("Sending to MCP client: {}", json);

        self.writer
            .write_all(json.as_bytes())
            .await
            .context("Failed to write MCP response")?;
        self.writer
            .write_all(b"\n")
            .await
            .context("Failed to write newline after MCP response")?;
        self.writer
            .flush()
            .await
            .context("Failed to flush MCP response")?;

        Ok(())
    }
}

/// Reader and writer over the process's own stdin/stdout
pub fn stdio() -> (MessageReader<tokio::io::Stdin>, MessageWriter<tokio::io::Stdout>) {
    (
        MessageReader::new(tokio::io::stdin()),
        MessageWriter::new(tokio::io::stdout()),
    )
}
