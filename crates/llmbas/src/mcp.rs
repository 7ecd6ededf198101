//! Tools exposed by MCP servers.
//!
//! Every configured server is connected once, its tools are listed, and each
//! of them becomes a [`McpTool`] that forwards calls to the server.

mod tool;

use std::collections::BTreeMap;
use std::sync::Arc;

use rmcp::model::ClientInfo;
use rmcp::service::{
    ClientInitializeError, DynService, RoleClient, RunningService,
    ServiceError, ServiceExt,
};
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

pub use tool::McpTool;

pub(crate) type McpSession =
    RunningService<RoleClient, Box<dyn DynService<RoleClient>>>;

/// How to reach one MCP server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum Connection {
    /// A remote server speaking streamable HTTP.
    StreamableHttp {
        /// Endpoint of the server, e.g. `http://127.0.0.1:8000/mcp`.
        url: String,
    },
    /// A local server spawned as a child process, speaking over stdio.
    Stdio {
        /// The program to run.
        command: String,
        /// Arguments for the program.
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Connection {
    /// Creates an HTTP connection from a CLI address.
    ///
    /// A bare `host:port` is mapped to `http://host:port/mcp`, anything
    /// with a scheme is used verbatim.
    ///
    /// Only the streamable HTTP transport is supported. Servers that serve
    /// the legacy SSE transport at `/sse` must be switched to streamable
    /// HTTP, passing their `/sse` URL won't work.
    pub fn from_address(address: &str) -> Self {
        let url = if address.contains("://") {
            address.to_owned()
        } else {
            format!("http://{}/mcp", address.trim_end_matches('/'))
        };
        Connection::StreamableHttp { url }
    }
}

/// Named MCP servers to take tools from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct McpServerConfig {
    servers: BTreeMap<String, Connection>,
}

impl McpServerConfig {
    /// Adds a server.
    #[inline]
    pub fn with_server<S: Into<String>>(
        mut self,
        name: S,
        connection: Connection,
    ) -> Self {
        self.servers.insert(name.into(), connection);
        self
    }

    /// Returns the configured servers, ordered by name.
    pub fn servers(&self) -> impl Iterator<Item = (&str, &Connection)> {
        self.servers.iter().map(|(name, conn)| (name.as_str(), conn))
    }
}

/// Errors raised while discovering tools.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// The server process could not be started.
    #[error("failed to spawn MCP server `{server}`: {source}")]
    Spawn {
        /// Name of the server.
        server: String,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The MCP handshake failed.
    #[error("failed to initialize MCP server `{server}`: {source}")]
    Initialize {
        /// Name of the server.
        server: String,
        /// The underlying error.
        source: Box<ClientInitializeError>,
    },
    /// The server didn't answer the tool listing.
    #[error("failed to list tools of MCP server `{server}`: {source}")]
    ListTools {
        /// Name of the server.
        server: String,
        /// The underlying error.
        source: ServiceError,
    },
}

/// The tools of a set of connected MCP servers.
///
/// Connections stay open as long as any of the tools is alive.
pub struct McpToolSource {
    tools: Vec<McpTool>,
}

impl McpToolSource {
    /// Connects to every server in `config` and lists their tools.
    pub async fn connect(config: &McpServerConfig) -> Result<Self, McpError> {
        let mut tools = vec![];
        for (server, connection) in config.servers() {
            let session = Arc::new(open(server, connection).await?);
            let listed = session.list_all_tools().await.map_err(|source| {
                McpError::ListTools {
                    server: server.to_owned(),
                    source,
                }
            })?;
            info!(
                module = "MCP",
                server,
                tools = listed.len(),
                "listed tools"
            );
            tools.extend(
                listed
                    .into_iter()
                    .map(|tool| McpTool::new(server, tool, Arc::clone(&session))),
            );
        }
        Ok(Self { tools })
    }

    /// Returns the number of discovered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no server exposed any tool.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Consumes the source and returns the tools.
    #[inline]
    pub fn into_tools(self) -> Vec<McpTool> {
        self.tools
    }
}

async fn open(
    server: &str,
    connection: &Connection,
) -> Result<McpSession, McpError> {
    let client = ClientInfo::default().into_dyn();
    let session = match connection {
        Connection::StreamableHttp { url } => {
            debug!(module = "MCP", server, url, "connecting");
            let transport = StreamableHttpClientTransport::from_uri(url.as_str());
            client.serve(transport).await
        }
        Connection::Stdio { command, args } => {
            debug!(module = "MCP", server, command, "spawning");
            let mut cmd = Command::new(command);
            cmd.args(args);
            let transport =
                TokioChildProcess::new(cmd).map_err(|source| McpError::Spawn {
                    server: server.to_owned(),
                    source,
                })?;
            client.serve(transport).await
        }
    };
    session.map_err(|source| McpError::Initialize {
        server: server.to_owned(),
        source: Box::new(source),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_address() {
        assert_eq!(
            Connection::from_address("127.0.0.1:8000"),
            Connection::StreamableHttp {
                url: "http://127.0.0.1:8000/mcp".to_owned()
            }
        );
        assert_eq!(
            Connection::from_address("https://tools.lab/mcp/"),
            Connection::StreamableHttp {
                url: "https://tools.lab/mcp/".to_owned()
            }
        );
    }

    #[test]
    fn test_config_format() {
        let config: McpServerConfig = serde_json::from_value(json!({
            "powershell": {
                "transport": "streamable_http",
                "url": "http://100.89.224.111:8000/mcp"
            },
            "thought": {
                "transport": "stdio",
                "command": "python",
                "args": ["./think_tool.py"]
            }
        }))
        .unwrap();

        let expected = McpServerConfig::default()
            .with_server(
                "thought",
                Connection::Stdio {
                    command: "python".to_owned(),
                    args: vec!["./think_tool.py".to_owned()],
                },
            )
            .with_server(
                "powershell",
                Connection::from_address("100.89.224.111:8000"),
            );
        assert_eq!(config, expected);
        let names: Vec<_> = config.servers().map(|(name, _)| name).collect();
        assert_eq!(names, ["powershell", "thought"]);
    }
}
