//! Protocol auto-negotiation
//!
//! Secure targets are probed once per `host:port:alpn` key; the answer is
//! cached and decides between the pooled HTTP/2 path and HTTP/1.1 over TLS.
//! Plain targets always take HTTP/1.1 without probing. Concurrent resolves
//! of the same key share a single in-flight probe.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use hashbrown::HashMap;
use http::uri::{PathAndQuery, Uri};
use http::{Method, Request, Response};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::cache::ProtocolCache;
use crate::config::{ALPN_H2, ALPN_HTTP11, AgentConfig, NegotiatorConfig};
use crate::error::{self, Result};
use crate::http::{Authority, IntoTarget};
use crate::pool::{Agent, SessionOptions};

use super::alpn::{AlpnProbe, TlsAlpnProbe};
use super::body::Body;
use super::http1::{Http1Transport, LegacyTransport};

/// Which instance serves one dispatch path.
#[derive(Clone)]
pub enum Slot<T> {
    /// The negotiator's shared instance
    Default,
    /// A fresh, unpooled instance for this call only
    Disabled,
    Custom(T),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Default
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Default => f.write_str("Default"),
            Slot::Disabled => f.write_str("Disabled"),
            Slot::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Per-call choice of instance for each dispatch path.
#[derive(Clone, Default, Debug)]
pub struct AgentSlots {
    pub http2: Slot<Agent>,
    pub https: Slot<Arc<dyn LegacyTransport>>,
    pub http: Slot<Arc<dyn LegacyTransport>>,
}

/// Options for [`AutoNegotiator::resolve`].
#[derive(Clone, Default, Debug)]
pub struct ResolveOptions {
    pub session: SessionOptions,
    /// Overrides the negotiator's configured ALPN offer
    pub alpn_protocols: Option<Vec<String>>,
    pub agents: AgentSlots,
}

impl ResolveOptions {
    #[must_use]
    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }

    #[must_use]
    pub fn with_alpn_protocols(mut self, protocols: Vec<String>) -> Self {
        self.alpn_protocols = Some(protocols);
        self
    }

    #[must_use]
    pub fn with_agents(mut self, agents: AgentSlots) -> Self {
        self.agents = agents;
        self
    }
}

/// The path chosen for a target.
#[derive(Clone)]
pub enum Dispatcher {
    Multiplexed {
        agent: Agent,
        authority: Authority,
        options: SessionOptions,
    },
    LegacySecure {
        transport: Arc<dyn LegacyTransport>,
        authority: Authority,
        options: SessionOptions,
    },
    LegacyPlain {
        transport: Arc<dyn LegacyTransport>,
        authority: Authority,
        options: SessionOptions,
    },
}

impl Dispatcher {
    /// ALPN name of the protocol this dispatcher speaks.
    pub fn protocol(&self) -> &'static str {
        match self {
            Dispatcher::Multiplexed { .. } => ALPN_H2,
            Dispatcher::LegacySecure { .. } | Dispatcher::LegacyPlain { .. } => ALPN_HTTP11,
        }
    }

    pub fn authority(&self) -> &Authority {
        match self {
            Dispatcher::Multiplexed { authority, .. }
            | Dispatcher::LegacySecure { authority, .. }
            | Dispatcher::LegacyPlain { authority, .. } => authority,
        }
    }

    pub fn is_multiplexed(&self) -> bool {
        matches!(self, Dispatcher::Multiplexed { .. })
    }

    /// Perform one exchange on the chosen path.
    ///
    /// # Errors
    ///
    /// Returns pool errors on the multiplexed path and request or connect
    /// errors on the legacy paths.
    pub async fn request(&self, request: Request<Bytes>) -> Result<Response<Body>> {
        match self {
            Dispatcher::Multiplexed {
                agent,
                authority,
                options,
            } => {
                let (mut parts, body) = request.into_parts();
                if parts.method != Method::CONNECT {
                    parts.uri = absolute_uri(authority, &parts.uri)?;
                }
                let head = Request::from_parts(parts, ());

                let mut stream = agent.open_stream(authority, options, head).await?;
                stream.send_data(body, true)?;
                let response = stream.response().await?;

                let agent = agent.clone();
                Ok(response.map(|recv| Body::Multiplexed { recv, stream, agent }))
            }
            Dispatcher::LegacySecure {
                transport,
                authority,
                options,
            }
            | Dispatcher::LegacyPlain {
                transport,
                authority,
                options,
            } => {
                let response = transport.request(authority, options, request).await?;
                Ok(response.map(Body::Legacy))
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("protocol", &self.protocol())
            .field("authority", &self.authority().key())
            .finish()
    }
}

fn absolute_uri(authority: &Authority, uri: &Uri) -> Result<Uri> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Ok(uri.clone());
    }
    let path = uri.path_and_query().map_or("/", PathAndQuery::as_str);
    format!("{}{path}", authority.key())
        .parse::<Uri>()
        .map_err(error::invalid_url)
}

type ProbeFuture = Shared<BoxFuture<'static, Result<String>>>;

/// Chooses between the multiplexed and legacy paths per target.
///
/// Cloning yields another handle to the same caches and default instances.
#[derive(Clone)]
pub struct AutoNegotiator {
    inner: Arc<Inner>,
}

struct Inner {
    config: NegotiatorConfig,
    cache: Arc<ProtocolCache>,
    probe: Arc<dyn AlpnProbe>,
    in_flight: Mutex<HashMap<String, ProbeFuture>>,
    http2: Agent,
    https: Arc<dyn LegacyTransport>,
    http: Arc<dyn LegacyTransport>,
}

impl AutoNegotiator {
    /// A negotiator with the bundled probe, pool and HTTP/1.1 transport.
    ///
    /// # Errors
    ///
    /// Returns a builder error if `config` fails validation.
    pub fn new(config: NegotiatorConfig) -> Result<Self> {
        let legacy: Arc<dyn LegacyTransport> = Arc::new(Http1Transport::new());
        Self::with_components(
            config,
            Arc::new(TlsAlpnProbe::new()),
            Agent::new(AgentConfig::default())?,
            Arc::clone(&legacy),
            legacy,
        )
    }

    /// A negotiator over caller-supplied default instances.
    ///
    /// # Errors
    ///
    /// Returns a builder error if `config` fails validation.
    pub fn with_components(
        config: NegotiatorConfig,
        probe: Arc<dyn AlpnProbe>,
        http2: Agent,
        https: Arc<dyn LegacyTransport>,
        http: Arc<dyn LegacyTransport>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                cache: Arc::new(ProtocolCache::new(config.max_cached_protocols)),
                config,
                probe,
                in_flight: Mutex::new(HashMap::new()),
                http2,
                https,
                http,
            }),
        })
    }

    /// Choose the path for `target`.
    ///
    /// # Errors
    ///
    /// Returns a builder error for unusable targets and the probe's error if
    /// negotiation fails. Failed probes are not cached.
    pub async fn resolve(&self, target: impl IntoTarget, options: ResolveOptions) -> Result<Dispatcher> {
        let authority = target.into_authority()?;
        let ResolveOptions {
            session,
            alpn_protocols,
            agents,
        } = options;

        if !authority.is_secure() {
            trace!(target: "muxpool::negotiate", authority = %authority, "plain target");
            return Ok(Dispatcher::LegacyPlain {
                transport: self.legacy(agents.http, &self.inner.http),
                authority,
                options: session,
            });
        }

        let offered = alpn_protocols.unwrap_or_else(|| self.inner.config.alpn_protocols.clone());
        let protocol = self.negotiate(&authority, &session, &offered).await?;

        if protocol == ALPN_H2 && self.inner.config.multiplexed_supported {
            let agent = match agents.http2 {
                Slot::Default => self.inner.http2.clone(),
                Slot::Disabled => Agent::new(AgentConfig::default())?,
                Slot::Custom(agent) => agent,
            };
            Ok(Dispatcher::Multiplexed {
                agent,
                authority,
                options: session,
            })
        } else {
            Ok(Dispatcher::LegacySecure {
                transport: self.legacy(agents.https, &self.inner.https),
                authority,
                options: session,
            })
        }
    }

    /// Resolve `target` and perform `request` on the chosen path.
    ///
    /// # Errors
    ///
    /// See [`AutoNegotiator::resolve`] and [`Dispatcher::request`].
    pub async fn auto(
        &self,
        target: impl IntoTarget,
        options: ResolveOptions,
        request: Request<Bytes>,
    ) -> Result<Response<Body>> {
        let dispatcher = self.resolve(target, options).await?;
        dispatcher.request(request).await
    }

    pub fn protocol_cache(&self) -> &ProtocolCache {
        &self.inner.cache
    }

    pub fn clear_protocol_cache(&self) {
        self.inner.cache.clear();
    }

    /// The shared pool behind the default `http2` slot.
    pub fn http2_agent(&self) -> &Agent {
        &self.inner.http2
    }

    pub fn config(&self) -> &NegotiatorConfig {
        &self.inner.config
    }

    fn legacy(
        &self,
        slot: Slot<Arc<dyn LegacyTransport>>,
        default: &Arc<dyn LegacyTransport>,
    ) -> Arc<dyn LegacyTransport> {
        match slot {
            Slot::Default => Arc::clone(default),
            Slot::Disabled => Arc::new(Http1Transport::unpooled()),
            Slot::Custom(transport) => transport,
        }
    }

    async fn negotiate(
        &self,
        authority: &Authority,
        options: &SessionOptions,
        offered: &[String],
    ) -> Result<String> {
        let key = ProtocolCache::cache_key(authority.host(), authority.port(), offered);

        let probe = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(protocol) = self.inner.cache.get(&key) {
                trace!(target: "muxpool::negotiate", key = %key, %protocol, "protocol cache hit");
                return Ok(protocol);
            }
            in_flight
                .entry(key.clone())
                .or_insert_with(|| {
                    debug!(target: "muxpool::negotiate", key = %key, "probing alpn");
                    let cache = Arc::clone(&self.inner.cache);
                    let probe = self.inner.probe.probe(authority, options, offered);
                    let key = key.clone();
                    async move {
                        let protocol = probe.await?;
                        Ok(cache.insert_if_absent(key, protocol))
                    }
                    .boxed()
                    .shared()
                })
                .clone()
        };

        let result = probe.clone().await;

        let mut in_flight = self.inner.in_flight.lock();
        if in_flight.get(&key).is_some_and(|current| current.ptr_eq(&probe)) {
            in_flight.remove(&key);
        }
        result
    }
}

impl fmt::Debug for AutoNegotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoNegotiator")
            .field("config", &self.inner.config)
            .field("cached_protocols", &self.inner.cache.len())
            .field("http2", &self.inner.http2)
            .finish_non_exhaustive()
    }
}
