//! The serve loop: one JSON-RPC message per line on stdin, responses on
//! stdout.
//!
//! Requests are handled one at a time, in order. The loop ends when the
//! input closes or on Ctrl-C.

use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::{debug, info, warn};

use secretary_protocol::{FrameReader, FrameWriter, ProtocolError, Response, RpcError};

use crate::error::ServerResult;
use crate::handler::RequestHandler;

/// Serves requests from `reader` until it closes.
pub async fn serve<R, W>(handler: &RequestHandler, reader: R, writer: W) -> ServerResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = FrameReader::new(reader);
    let mut writer = FrameWriter::new(writer);

    loop {
        let line = match reader.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Input closed");
                return Ok(());
            }
            Err(ProtocolError::MessageTooLarge { size, max }) => {
                warn!(size, max, "Message too large, skipped");
                let error = RpcError::invalid_request(format!(
                    "Message too large: {size} bytes (max {max})"
                ));
                writer.write_message(&Response::failure(None, error)).await?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let Some(response) = handler.handle_line(&line).await else {
            continue;
        };
        match writer.write_message(&response).await {
            Err(ProtocolError::MessageTooLarge { size, max }) => {
                warn!(size, max, "Response too large");
                let error = RpcError::internal(format!(
                    "Response too large: {size} bytes (max {max}); narrow the request"
                ));
                writer.write_message(&Response::failure(response.id, error)).await?;
            }
            other => other?,
        }
    }
}

/// Serves on stdin/stdout until the input closes or Ctrl-C.
pub async fn serve_stdio(handler: &RequestHandler) -> ServerResult<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    info!(tools = handler.toolbox().tools().len(), "Serving on stdio");

    tokio::select! {
        result = serve(handler, stdin, stdout) => {
            info!("Input closed, shutting down");
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt, shutting down");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    use secretary_core::Tz;
    use secretary_protocol::{MAX_MESSAGE_SIZE, RequestId};
    use secretary_providers::{MemoryClient, ProviderSet};
    use serde_json::{Value, json};

    use crate::handler::Toolbox;

    fn handler() -> RequestHandler {
        let client = MemoryClient::new().with_calendar("Work");
        let toolbox = Toolbox::new(ProviderSet::from_client(Arc::new(client), Tz::UTC), Tz::UTC);
        RequestHandler::new(toolbox, "secretary")
    }

    async fn run(input: Vec<u8>) -> Vec<Response> {
        let mut output = Vec::new();
        serve(&handler(), BufReader::new(Cursor::new(input)), &mut output)
            .await
            .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn session() {
        let input = [
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"get_all_calendar_names"}}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"shutdown"}"#,
        ]
        .join("\n");

        let responses = run(input.into_bytes()).await;
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].id, Some(RequestId::Number(1)));
        assert!(responses[0].is_success());

        let result = responses[1].result.as_ref().unwrap();
        assert_eq!(result["content"][0]["text"], Value::from("[\n  \"Work\"\n]"));
        assert_eq!(result["isError"], json!(false));

        assert_eq!(responses[2].error.as_ref().unwrap().code, -32601);
    }

    #[tokio::test]
    async fn recovers_from_garbage() {
        let input = "not json\n{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ping\"}\n";
        let responses = run(input.as_bytes().to_vec()).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].id, None);
        assert_eq!(responses[0].error.as_ref().unwrap().code, -32700);
        assert_eq!(responses[1].id, Some(RequestId::Number(7)));
        assert!(responses[1].is_success());
    }

    #[tokio::test]
    async fn oversized_message_is_rejected() {
        let mut input = vec![b' '; MAX_MESSAGE_SIZE + 1];
        input.extend_from_slice(b"x\n{\"jsonrpc\":\"2.0\",\"id\":8,\"method\":\"ping\"}\n");
        let responses = run(input).await;
        assert_eq!(responses.len(), 2);
        let error = responses[0].error.as_ref().unwrap();
        assert_eq!(error.code, -32600);
        assert!(error.message.starts_with("Message too large"));
        assert_eq!(responses[1].id, Some(RequestId::Number(8)));
    }
}
