//! MCP transport layer.
//!
//! Messages are newline-delimited JSON-RPC on stdin/stdout. Stdout carries
//! nothing but protocol messages.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::error::Result;
use crate::mcp::protocol::{
    error_codes, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};

/// A message that can be sent or received.
#[derive(Debug, Clone)]
pub enum Message {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

impl Message {
    /// Classify one line of input.
    pub fn parse(line: &str) -> Option<Self> {
        if let Ok(req) = serde_json::from_str::<JsonRpcRequest>(line) {
            return Some(Self::Request(req));
        }
        if let Ok(notif) = serde_json::from_str::<JsonRpcNotification>(line) {
            return Some(Self::Notification(notif));
        }
        None
    }

    fn to_json(&self) -> serde_json::Result<String> {
        match self {
            Self::Request(req) => serde_json::to_string(req),
            Self::Response(res) => serde_json::to_string(res),
            Self::Notification(notif) => serde_json::to_string(notif),
        }
    }
}

/// Transport trait for MCP communication.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start the transport, returning channels for messages.
    async fn start(&mut self) -> Result<(mpsc::Receiver<Message>, mpsc::Sender<Message>)>;

    /// Stop the transport once every sender has been dropped, flushing
    /// pending output.
    async fn stop(&mut self) -> Result<()>;
}

/// Stdio transport for MCP.
#[derive(Default)]
pub struct StdioTransport {
    writer: Option<JoinHandle<()>>,
}

impl StdioTransport {
    /// Create a new stdio transport.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&mut self) -> Result<(mpsc::Receiver<Message>, mpsc::Sender<Message>)> {
        let (incoming_tx, incoming_rx) = mpsc::channel::<Message>(100);
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Message>(100);

        // Parse errors are answered directly, so the reader needs a sender.
        let replies = outgoing_tx.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(tokio::io::stdin());
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!("EOF on stdin, stopping transport");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        trace!("Received: {}", trimmed);

                        match Message::parse(trimmed) {
                            Some(msg) => {
                                if incoming_tx.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            None => match request_id_of(trimmed) {
                                Some(id) => {
                                    warn!("Invalid request: {}", trimmed);
                                    let reply = JsonRpcResponse::failure(
                                        id,
                                        error_codes::INVALID_REQUEST,
                                        "Invalid JSON-RPC request",
                                    );
                                    let _ = replies.send(Message::Response(reply)).await;
                                }
                                // Client responses and unparseable lines get no reply.
                                None => debug!("Ignoring message: {}", trimmed),
                            },
                        }
                    }
                    Err(e) => {
                        error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();

            while let Some(msg) = outgoing_rx.recv().await {
                let json = match msg.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Error serializing message: {}", e);
                        continue;
                    }
                };

                trace!("Sending: {}", json);
                let written = async {
                    stdout.write_all(json.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await
                }
                .await;
                if let Err(e) = written {
                    error!("Error writing to stdout: {}", e);
                    break;
                }
            }
        });
        self.writer = Some(writer);

        Ok((incoming_rx, outgoing_tx))
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            // The reader task may still hold a sender while stdin stays open.
            if tokio::time::timeout(std::time::Duration::from_secs(5), writer)
                .await
                .is_err()
            {
                debug!("Stdout writer still busy at shutdown");
            }
        }
        Ok(())
    }
}

/// Id of a line that names a `method` but is not a valid request.
fn request_id_of(line: &str) -> Option<crate::mcp::protocol::RequestId> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    value.get("method")?;
    serde_json::from_value(value.get("id")?.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::RequestId;

    #[test]
    fn test_parse_request_and_notification() {
        let req = Message::parse(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        assert!(matches!(req, Some(Message::Request(ref r)) if r.method == "ping"));

        let notif = Message::parse(
            r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":1}}"#,
        );
        assert!(matches!(notif, Some(Message::Notification(_))));

        assert!(Message::parse("not json").is_none());
    }

    #[test]
    fn test_request_id_of_invalid_request() {
        let line = r#"{"jsonrpc":"2.0","id":"a","method":5}"#;
        assert!(Message::parse(line).is_none());
        assert_eq!(
            request_id_of(line),
            Some(RequestId::String("a".to_string()))
        );
        assert_eq!(request_id_of("garbage"), None);
    }

    #[test]
    fn test_client_response_gets_no_reply() {
        for line in [
            r#"{"jsonrpc":"2.0","id":7,"result":{}}"#,
            r#"{"jsonrpc":"2.0","id":"x","error":{"code":-32601,"message":"nope"}}"#,
            r#"{"jsonrpc":"2.0","id":3,"params":{}}"#,
        ] {
            assert!(Message::parse(line).is_none(), "{}", line);
            assert_eq!(request_id_of(line), None, "{}", line);
        }
    }
}
