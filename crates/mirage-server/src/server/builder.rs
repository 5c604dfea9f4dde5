use anyhow::Context;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use super::serve;
use crate::config::{load_config_dirs, PluginConfig, ServerConfig};
use crate::engine::MockEngine;
use crate::error::ConfigError;

/// Starts a mock server in-process.
///
/// ```no_run
/// # async fn run() -> anyhow::Result<()> {
/// let server = mirage_server::MirageBuilder::new()
///     .with_specification_file("petstore.yaml")
///     .with_port(0)
///     .start()
///     .await?;
/// println!("mocking on {}", server.base_url());
/// server.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MirageBuilder {
    config_dirs: Vec<PathBuf>,
    plugins: Vec<PluginConfig>,
    server: ServerConfig,
}

impl MirageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dirs.push(dir.into());
        self
    }

    pub fn with_plugin_config(mut self, config: PluginConfig) -> Self {
        self.plugins.push(config);
        self
    }

    /// Serve an OpenAPI document without writing a configuration file for it.
    pub fn with_specification_file(mut self, spec: impl AsRef<Path>) -> Self {
        self.plugins.push(PluginConfig::for_specification(spec.as_ref()));
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.server.host = host.into();
        self
    }

    /// `0` binds an ephemeral port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    pub fn with_script_timeout(mut self, timeout: Duration) -> Self {
        self.server.script_timeout = timeout;
        self
    }

    pub fn with_server_config(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    /// Load and register everything without binding a socket.
    pub fn build_engine(&self) -> Result<MockEngine, ConfigError> {
        let mut configs = load_config_dirs(&self.config_dirs)?;
        configs.extend(self.plugins.iter().cloned());
        MockEngine::from_configs(configs, self.server.script_settings())
    }

    pub async fn start(self) -> anyhow::Result<RunningServer> {
        let engine = self
            .build_engine()
            .context("Failed to load mock configuration")?;
        info!("Loaded {} resource(s)", engine.registry().len());

        let host = self.server.host.as_str();
        let listener = TcpListener::bind((host, self.server.port))
            .await
            .with_context(|| format!("Failed to bind {}:{}", host, self.server.port))?;
        let local_addr = listener.local_addr()?;
        info!("Mock server listening on {}", local_addr);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(serve(listener, Arc::new(engine), shutdown_rx));

        Ok(RunningServer {
            local_addr,
            shutdown_tx,
            handle,
        })
    }
}

/// Handle to a started server.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL clients can reach the server on. Wildcard binds map to loopback.
    pub fn base_url(&self) -> String {
        let mut addr = self.local_addr;
        if addr.ip().is_unspecified() {
            addr.set_ip(match addr {
                SocketAddr::V4(_) => std::net::Ipv4Addr::LOCALHOST.into(),
                SocketAddr::V6(_) => std::net::Ipv6Addr::LOCALHOST.into(),
            });
        }
        format!("http://{addr}")
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}
