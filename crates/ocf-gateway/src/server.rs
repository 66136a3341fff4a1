//! Gateway assembly: shared state, routing, connection lifecycle, serving.

use std::sync::Arc;

use ocf_gateway_coap::{ClientCommander, CoapServer, SessionEvents};
use tokio::net::{TcpListener, UdpSocket};
use tokio_rustls::TlsAcceptor;
use tracing::info;

use crate::config::{Config, Network};
use crate::container::ClientContainer;
use crate::egress;
use crate::error::{ConfigError, GatewayError};
use crate::handlers;
use crate::tls;

/// The gateway: configuration, the shared back-end HTTP client, the session
/// container, and the TLS configuration when the listener needs one.
///
/// The gateway owns all sessions through its container and outlives every
/// connection; handlers reach it through an [`Arc`].
pub struct Gateway {
    config: Config,
    http_client: reqwest::Client,
    clients: ClientContainer,
    tls: Option<Arc<rustls::ServerConfig>>,
}

impl Gateway {
    /// Assemble a gateway from its configuration. Builds the TLS
    /// configuration eagerly so certificate problems fail startup.
    pub fn new(config: Config) -> Result<Arc<Self>, GatewayError> {
        let tls = if config.network.requires_tls() {
            let paths = config
                .tls
                .as_ref()
                .ok_or(ConfigError::Missing("TLS_CERTIFICATE"))?;
            Some(Arc::new(tls::server_config(paths)?))
        } else {
            None
        };
        Ok(Arc::new(Self {
            http_client: egress::http_client()?,
            clients: ClientContainer::new(),
            tls,
            config,
        }))
    }

    /// Gateway configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared back-end HTTP client.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Live sessions.
    pub fn clients(&self) -> &ClientContainer {
        &self.clients
    }

    fn coap_server(self: &Arc<Self>) -> CoapServer {
        CoapServer::new(
            handlers::build_mux(self.clone()),
            Arc::new(Lifecycle {
                gateway: self.clone(),
            }),
        )
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn listen_and_serve(self: &Arc<Self>) -> Result<(), GatewayError> {
        match self.config.network {
            Network::Tcp | Network::TcpTls => {
                let listener = TcpListener::bind(&self.config.addr).await.map_err(|source| {
                    GatewayError::Bind {
                        addr: self.config.addr.clone(),
                        source,
                    }
                })?;
                info!(addr = %self.config.addr, network = ?self.config.network, "listening");
                self.serve_tcp(listener).await
            }
            Network::Udp => {
                let socket = UdpSocket::bind(&self.config.addr).await.map_err(|source| {
                    GatewayError::Bind {
                        addr: self.config.addr.clone(),
                        source,
                    }
                })?;
                info!(addr = %self.config.addr, network = ?self.config.network, "listening");
                self.serve_udp(socket).await
            }
        }
    }

    /// Serve an already-bound TCP listener, with TLS when configured.
    pub async fn serve_tcp(self: &Arc<Self>, listener: TcpListener) -> Result<(), GatewayError> {
        let acceptor = self.tls.clone().map(TlsAcceptor::from);
        self.coap_server()
            .serve_tcp(listener, acceptor)
            .await
            .map_err(Into::into)
    }

    /// Serve an already-bound UDP socket.
    pub async fn serve_udp(self: &Arc<Self>, socket: UdpSocket) -> Result<(), GatewayError> {
        self.coap_server().serve_udp(socket).await.map_err(Into::into)
    }
}

/// Connection lifecycle: every new channel gets a session in the container,
/// every closed channel takes its session (and observations) with it.
struct Lifecycle {
    gateway: Arc<Gateway>,
}

impl SessionEvents for Lifecycle {
    fn connected(&self, commander: &ClientCommander) {
        self.gateway
            .clients
            .add(commander.clone(), self.gateway.config.keepalive.clone());
    }

    fn disconnected(&self, commander: &ClientCommander) {
        self.gateway.clients.remove(commander);
    }
}
