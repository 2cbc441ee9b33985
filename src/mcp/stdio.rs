//! Newline-delimited JSON-RPC over stdin/stdout
//!
//! Every stdout line is a protocol message, so diagnostics go to the tracing
//! subscriber on stderr.

use serde_json::Value;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::mcp::rpc::is_json_rpc_error;
use crate::mcp::server::handle_json_rpc_value;
use crate::AppState;

/// Serves stdin until EOF or Ctrl-C.
pub async fn serve_stdio(state: AppState) -> io::Result<()> {
    info!("stdio transport ready");

    tokio::select! {
        result = serve(&state, BufReader::new(io::stdin()), io::stdout()) => {
            info!("stdin closed, stopping");
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, stopping");
            Ok(())
        }
    }
}

pub async fn serve<R, W>(state: &AppState, reader: R, mut writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let Some(response) = handle_line(state, &line).await else {
            continue;
        };

        let encoded = serde_json::to_string(&response)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        writer.write_all(encoded.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}

async fn handle_line(state: &AppState, line: &str) -> Option<Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let payload: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "skipping unparseable input line");
            return None;
        }
    };

    if let Value::Array(batch) = payload {
        let mut responses = Vec::new();
        for item in batch {
            if let Some(response) = handle_json_rpc_value(state, item).await {
                if is_addressable(&response) {
                    responses.push(response);
                }
            }
        }
        return (!responses.is_empty()).then_some(Value::Array(responses));
    }

    handle_json_rpc_value(state, payload)
        .await
        .filter(is_addressable)
}

/// Errors that cannot be correlated to a request id are logged, not written.
fn is_addressable(response: &Value) -> bool {
    if is_json_rpc_error(response) && response.get("id").map_or(true, Value::is_null) {
        debug!(response = %response, "dropping error response without id");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use super::serve;
    use crate::credentials::CredentialStore;
    use crate::test_support::MockMarketplace;
    use crate::AppState;

    fn state() -> AppState {
        AppState::new(
            None,
            Arc::new(MockMarketplace::default()),
            Arc::new(CredentialStore::new("/nonexistent/config.json")),
        )
    }

    async fn run(input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        serve(&state(), input.as_bytes(), &mut output)
            .await
            .expect("stdio loop");

        String::from_utf8(output)
            .expect("utf8 output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    #[tokio::test]
    async fn answers_each_request_on_its_own_line() {
        let responses = run(concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        ))
        .await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], 2);
        assert!(responses[1]["result"]["tools"].is_array());
    }

    #[tokio::test]
    async fn skips_blank_and_garbage_lines() {
        let responses = run(concat!(
            "\n",
            "   \n",
            "not json\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
            "\n",
        ))
        .await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 3);
    }

    #[tokio::test]
    async fn notifications_produce_no_output() {
        let responses = run(concat!(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
        ))
        .await;

        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn errors_without_id_are_not_written() {
        let responses = run("[1, 2]\n\"text\"\n").await;
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn unknown_method_is_reported() {
        let responses = run(concat!(
            r#"{"jsonrpc":"2.0","id":"a","method":"prompts/list"}"#,
            "\n",
        ))
        .await;

        assert_eq!(responses[0]["id"], "a");
        assert_eq!(responses[0]["error"]["code"], -32601);
    }
}
