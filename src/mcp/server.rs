use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::filesystem::ProjectService;

use super::protocol::*;
use super::tools::{dispatch_tool, tool_definitions};

/// Line-delimited JSON-RPC over a reader/writer pair
pub struct McpServer {
    service: Arc<ProjectService>,
}

impl McpServer {
    pub fn new(service: Arc<ProjectService>) -> Self {
        Self { service }
    }

    /// Serve stdin/stdout until stdin closes
    pub async fn run(&self) -> std::io::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(
            "MCP server ready on {}, waiting for JSON-RPC requests",
            self.service.config().root_path.display()
        );

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            tracing::debug!("Incoming JSON-RPC: {}", line);

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Failed to parse JSON-RPC request: {}", e);
                    let err = JsonRpcErrorResponse::new(
                        Value::Null,
                        PARSE_ERROR,
                        format!("Parse error: {}", e),
                    );
                    write_message(&mut writer, &to_json(&err)).await?;
                    continue;
                }
            };

            // Notifications get no response.
            let Some(id) = request.id else {
                tracing::debug!("Received notification {}", request.method);
                continue;
            };

            let response = self
                .handle_request(&request.method, &request.params, id)
                .await;
            write_message(&mut writer, &response).await?;
        }

        tracing::info!("stdin closed, shutting down");
        Ok(())
    }

    pub async fn handle_request(&self, method: &str, params: &Option<Value>, id: Value) -> Value {
        match method {
            "initialize" => to_json(&JsonRpcResponse::new(id, to_json(&InitializeResult::new()))),
            "tools/list" => {
                let result = ToolsListResult {
                    tools: tool_definitions(),
                };
                to_json(&JsonRpcResponse::new(id, to_json(&result)))
            }
            "tools/call" => {
                let Some(params) = params else {
                    let result = ToolCallResult::error("Missing params".to_string());
                    return to_json(&JsonRpcResponse::new(id, to_json(&result)));
                };
                let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
                let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

                let result = dispatch_tool(&self.service, tool_name, &arguments).await;
                to_json(&JsonRpcResponse::new(id, to_json(&result)))
            }
            "ping" => to_json(&JsonRpcResponse::new(id, json!({}))),
            _ => to_json(&JsonRpcErrorResponse::new(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            )),
        }
    }
}

async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) -> std::io::Result<()> {
    let mut text = message.to_string();
    tracing::debug!("Outgoing JSON-RPC: {}", text);
    text.push('\n');
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::config::ProjectConfig;
    use crate::filesystem::tools::ToolAvailability;
    use tempfile::TempDir;

    fn make_server(temp: &TempDir) -> McpServer {
        let config = ProjectConfig::with_root(temp.path()).unwrap();
        let service = ProjectService::new(config, ToolAvailability::none()).unwrap();
        McpServer::new(Arc::new(service))
    }

    fn tool_text(response: &Value) -> &str {
        response["result"]["content"][0]["text"].as_str().unwrap()
    }

    #[tokio::test]
    async fn test_handle_initialize() {
        let temp = TempDir::new().unwrap();
        let server = make_server(&temp);
        let result = server.handle_request("initialize", &None, json!(1)).await;
        assert_eq!(result["jsonrpc"], "2.0");
        assert_eq!(result["id"], 1);
        assert_eq!(result["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["result"]["serverInfo"]["name"], "context-mcp");
    }

    #[tokio::test]
    async fn test_handle_tools_list() {
        let temp = TempDir::new().unwrap();
        let server = make_server(&temp);
        let result = server.handle_request("tools/list", &None, json!(2)).await;
        let tools = result["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 12);
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        for expected in [
            "list_directory",
            "show_tree",
            "read_project_context",
            "search_in_file",
            "search_in_files",
            "find_files_by_name",
            "find_recently_modified_files",
            "read_entire_file",
            "read_file_lines",
            "read_file_tail",
            "read_files",
            "get_tool_usage_guide",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_handle_tools_call_read_file_tail() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("log.txt"), "a\nb\nc\n").unwrap();
        let server = make_server(&temp);

        let params = json!({
            "name": "read_file_tail",
            "arguments": { "file_path": "log.txt", "num_lines": 2 }
        });
        let result = server
            .handle_request("tools/call", &Some(params), json!(3))
            .await;
        assert!(result["result"].get("isError").is_none());
        let body: Value = serde_json::from_str(tool_text(&result)).unwrap();
        assert_eq!(body["content"], "b\nc\n");
        assert_eq!(body["is_partial"], true);
        assert_eq!(body["total_lines"], 3);
    }

    #[tokio::test]
    async fn test_handle_tools_call_uses_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "x").unwrap();
        let server = make_server(&temp);

        let params = json!({ "name": "list_directory" });
        let result = server
            .handle_request("tools/call", &Some(params), json!(4))
            .await;
        let body: Value = serde_json::from_str(tool_text(&result)).unwrap();
        assert_eq!(body["total"], 1);
        assert_eq!(body["truncated"], false);
        assert_eq!(body["entries"][0]["type"], "file");
    }

    #[tokio::test]
    async fn test_handle_tools_call_errors_carry_codes() {
        let temp = TempDir::new().unwrap();
        let server = make_server(&temp);

        let params = json!({ "name": "read_entire_file", "arguments": { "file_path": "../etc/passwd" } });
        let result = server
            .handle_request("tools/call", &Some(params), json!(5))
            .await;
        assert_eq!(result["result"]["isError"], true);
        assert!(tool_text(&result).starts_with("PATH_SECURITY_ERROR: "));

        let params = json!({ "name": "read_file_lines", "arguments": { "file_path": "a.txt" } });
        let result = server
            .handle_request("tools/call", &Some(params), json!(6))
            .await;
        assert_eq!(result["result"]["isError"], true);
        assert!(tool_text(&result).starts_with("INVALID_ARGUMENT: "));

        let params = json!({ "name": "no_such_tool", "arguments": {} });
        let result = server
            .handle_request("tools/call", &Some(params), json!(7))
            .await;
        assert!(tool_text(&result).contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_handle_tools_call_missing_params() {
        let temp = TempDir::new().unwrap();
        let server = make_server(&temp);
        let result = server.handle_request("tools/call", &None, json!(8)).await;
        assert_eq!(result["result"]["isError"], true);
        assert!(tool_text(&result).contains("Missing params"));
    }

    #[tokio::test]
    async fn test_handle_unknown_method_and_ping() {
        let temp = TempDir::new().unwrap();
        let server = make_server(&temp);

        let result = server.handle_request("unknown/method", &None, json!(99)).await;
        assert_eq!(result["error"]["code"], -32601);
        assert!(result["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Method not found"));

        let result = server.handle_request("ping", &None, json!(42)).await;
        assert_eq!(result["id"], 42);
        assert!(result["result"].is_object());
    }

    #[tokio::test]
    async fn test_serve_over_a_stream() {
        let temp = TempDir::new().unwrap();
        let server = make_server(&temp);

        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{}}\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
            "\n",
            "not json\n",
            "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n",
        );
        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["error"]["code"], -32700);
        assert!(responses[1]["id"].is_null());
        assert_eq!(responses[2]["id"], 2);
    }
}
