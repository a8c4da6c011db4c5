//! CONNECT tunnels as a dialing step
//!
//! `TunnelDialer` plugs into the HTTP/2 connector in place of a direct
//! dialer: it asks the proxy for a tunnel to the target, then either uses the
//! tunnel as is (`raw`) or runs a fresh TLS handshake through it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::HOST;
use http::{Method, Request, StatusCode};
use http_body_util::Empty;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ALPN_H2, ALPN_HTTP11, AgentConfig, H2Config};
use crate::connect::{BoxIo, Dialer, SessionResumption, TlsConfigCache, TunnelIo, connect_tcp, tls};
use crate::error::{self, Error, Result};
use crate::http::Authority;
use crate::pool::{Agent, SessionOptions};
use crate::protocols::H2Connector;

use super::descriptor::TunnelDescriptor;
use super::h2_io::H2Io;
use super::reach::ProxyReach;

/// Dials targets through an HTTP CONNECT proxy.
#[derive(Clone)]
pub struct TunnelDialer {
    inner: Arc<Inner>,
}

struct Inner {
    descriptor: TunnelDescriptor,
    reach: ProxyReach,
    proxy: Authority,
    proxy_options: SessionOptions,
    tls: TlsConfigCache,
    connect_timeout: Option<Duration>,
}

impl TunnelDialer {
    /// # Errors
    ///
    /// Returns a builder error if the descriptor's proxy URL is unusable.
    pub fn new(descriptor: TunnelDescriptor, reach: ProxyReach) -> Result<Self> {
        Self::with_proxy_options(descriptor, reach, SessionOptions::default())
    }

    /// Like [`TunnelDialer::new`], with `proxy_options` governing the
    /// connection to the proxy itself.
    ///
    /// # Errors
    ///
    /// See [`TunnelDialer::new`].
    pub fn with_proxy_options(
        descriptor: TunnelDescriptor,
        reach: ProxyReach,
        proxy_options: SessionOptions,
    ) -> Result<Self> {
        let proxy = descriptor.proxy_authority()?;
        Ok(Self {
            inner: Arc::new(Inner {
                descriptor,
                reach,
                proxy,
                proxy_options,
                tls: TlsConfigCache::new(),
                connect_timeout: Some(Duration::from_secs(10)),
            }),
        })
    }

    pub fn descriptor(&self) -> &TunnelDescriptor {
        &self.inner.descriptor
    }

    pub fn reach(&self) -> &ProxyReach {
        &self.inner.reach
    }
}

impl fmt::Debug for TunnelDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelDialer")
            .field("proxy", &self.inner.proxy.key())
            .field("reach", &self.inner.reach)
            .field("raw", &self.inner.descriptor.is_raw())
            .finish()
    }
}

impl Dialer for TunnelDialer {
    fn dial(&self, authority: &Authority, options: &SessionOptions) -> BoxFuture<'static, Result<BoxIo>> {
        self.through_tunnel(authority, options, None)
    }

    fn dial_resuming(
        &self,
        authority: &Authority,
        options: &SessionOptions,
        resumption: SessionResumption,
    ) -> BoxFuture<'static, Result<BoxIo>> {
        self.through_tunnel(authority, options, Some(resumption))
    }
}

impl TunnelDialer {
    fn through_tunnel(
        &self,
        authority: &Authority,
        options: &SessionOptions,
        resumption: Option<SessionResumption>,
    ) -> BoxFuture<'static, Result<BoxIo>> {
        let inner = Arc::clone(&self.inner);
        let authority = authority.clone();
        let options = options.clone();

        Box::pin(async move {
            let tunnel = inner.open_tunnel(&authority, &options).await?;
            debug!(
                target: "muxpool::proxy",
                proxy = %inner.proxy,
                authority = %authority,
                reach = inner.reach.name(),
                raw = inner.descriptor.is_raw(),
                "tunnel established"
            );

            if inner.descriptor.is_raw() {
                return Ok(tunnel);
            }

            let config = inner.tls.config(&options, &[ALPN_H2.as_bytes().to_vec()])?;
            let server_name = options.servername.as_deref().unwrap_or(authority.host());
            let stream = tls::wrap_resuming(tunnel, config, server_name, resumption).await?;
            Ok(Box::new(stream) as BoxIo)
        })
    }
}

impl Inner {
    fn rejected(&self, status: StatusCode) -> Error {
        warn!(target: "muxpool::proxy", proxy = %self.proxy, %status, "CONNECT rejected");
        let err = error::proxy_status(status);
        match Url::parse(self.proxy.key()) {
            Ok(url) => err.with_url(url),
            Err(_) => err,
        }
    }

    async fn open_tunnel(&self, target: &Authority, options: &SessionOptions) -> Result<BoxIo> {
        let headers = self.descriptor.connect_headers(target)?;
        let reported_alpn = self.descriptor.is_raw().then(|| ALPN_H2.as_bytes().to_vec());

        match &self.reach {
            ProxyReach::Plain | ProxyReach::Secure => {
                let tcp = connect_tcp(
                    self.proxy.host(),
                    self.proxy.port(),
                    options.local_address,
                    self.connect_timeout,
                )
                .await?;
                let io: BoxIo = if matches!(self.reach, ProxyReach::Secure) {
                    let config = self
                        .tls
                        .config(&self.proxy_options, &[ALPN_HTTP11.as_bytes().to_vec()])?;
                    let server_name = self
                        .proxy_options
                        .servername
                        .as_deref()
                        .unwrap_or(self.proxy.host());
                    Box::new(tls::wrap(tcp, config, server_name).await?)
                } else {
                    Box::new(tcp)
                };

                let (mut sender, connection) = http1::handshake(TokioIo::new(io))
                    .await
                    .map_err(error::connect)?;
                let driver = tokio::spawn(connection.with_upgrades());

                let mut request = Request::builder()
                    .method(Method::CONNECT)
                    .uri(target.connect_uri()?)
                    .body(Empty::<Bytes>::new())
                    .map_err(error::builder)?;
                *request.headers_mut() = headers;

                let response = match sender.send_request(request).await {
                    Ok(response) => response,
                    Err(err) => {
                        driver.abort();
                        return Err(error::connect(err));
                    }
                };

                if response.status() != StatusCode::OK {
                    // closes the half-open tunnel socket
                    driver.abort();
                    return Err(self.rejected(response.status()));
                }

                let upgraded = hyper::upgrade::on(response).await.map_err(error::connect)?;
                Ok(Box::new(TunnelIo::new(
                    TokioIo::new(upgraded),
                    target.host_port(),
                    reported_alpn,
                )))
            }
            ProxyReach::Multiplexed(agent) => {
                let mut head = Request::builder()
                    .method(Method::CONNECT)
                    .uri(target.connect_uri()?)
                    .body(())
                    .map_err(error::builder)?;
                *head.headers_mut() = headers;
                // :authority already names the target
                head.headers_mut().remove(HOST);

                let mut stream = agent.open_stream(&self.proxy, &self.proxy_options, head).await?;
                let response = stream.response().await?;

                if response.status() != StatusCode::OK {
                    stream.cancel();
                    return Err(self.rejected(response.status()));
                }

                let recv = response.into_body();
                Ok(Box::new(TunnelIo::new(
                    H2Io::new(recv, stream, agent.clone()),
                    target.host_port(),
                    reported_alpn,
                )))
            }
        }
    }
}

/// A session pool whose sessions run through the proxy in `descriptor`.
///
/// # Errors
///
/// Returns a builder error for an unusable proxy URL or pool config.
pub fn tunnel_agent(descriptor: TunnelDescriptor, reach: ProxyReach, config: AgentConfig) -> Result<Agent> {
    tunnel_agent_with(descriptor, reach, SessionOptions::default(), config, H2Config::default())
}

/// [`tunnel_agent`] with explicit proxy connection options and HTTP/2 settings.
///
/// # Errors
///
/// See [`tunnel_agent`].
pub fn tunnel_agent_with(
    descriptor: TunnelDescriptor,
    reach: ProxyReach,
    proxy_options: SessionOptions,
    config: AgentConfig,
    h2: H2Config,
) -> Result<Agent> {
    h2.validate()?;
    let dialer = TunnelDialer::with_proxy_options(descriptor, reach, proxy_options)?;
    Agent::with_connector(H2Connector::new(dialer, h2), config)
}
