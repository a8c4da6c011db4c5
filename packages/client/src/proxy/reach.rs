use std::fmt;

use crate::http::{Authority, Scheme};
use crate::pool::Agent;

/// How a tunnel dialer talks to its proxy.
#[derive(Clone)]
pub enum ProxyReach {
    /// HTTP/1.1 over plain TCP
    Plain,
    /// HTTP/1.1 over TLS
    Secure,
    /// A CONNECT stream on a session of an HTTP/2 pool pointed at the proxy
    Multiplexed(Agent),
}

impl ProxyReach {
    /// `Plain` for http proxies, `Secure` for https ones.
    pub fn for_proxy(proxy: &Authority) -> Self {
        match proxy.scheme() {
            Scheme::Http => ProxyReach::Plain,
            Scheme::Https => ProxyReach::Secure,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProxyReach::Plain => "plain",
            ProxyReach::Secure => "secure",
            ProxyReach::Multiplexed(_) => "multiplexed",
        }
    }
}

impl fmt::Debug for ProxyReach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
