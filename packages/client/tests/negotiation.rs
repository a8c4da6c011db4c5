use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use muxpool_client::error;
use muxpool_client::protocols::{AgentSlots, AlpnProbe, Http1Transport, LegacyTransport, Slot};
use muxpool_client::{
    Agent, AgentConfig, Authority, AutoNegotiator, Dispatcher, NegotiatorConfig, ResolveOptions,
    Result, SessionOptions,
};

/// Answers from a fixed table after a short delay and counts every probe.
struct CountingProbe {
    probes: AtomicUsize,
}

impl CountingProbe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            probes: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl AlpnProbe for CountingProbe {
    fn probe(
        &self,
        authority: &Authority,
        _options: &SessionOptions,
        _alpn_protocols: &[String],
    ) -> BoxFuture<'static, Result<String>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let host = authority.host().to_string();
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            match host.as_str() {
                "legacy.example" => Ok("http/1.1".to_string()),
                "broken.example" => Err(error::connect("handshake failed")),
                _ => Ok("h2".to_string()),
            }
        }
        .boxed()
    }
}

fn negotiator(probe: &Arc<CountingProbe>) -> AutoNegotiator {
    negotiator_with(probe, NegotiatorConfig::default())
}

fn negotiator_with(probe: &Arc<CountingProbe>, config: NegotiatorConfig) -> AutoNegotiator {
    let legacy: Arc<dyn LegacyTransport> = Arc::new(Http1Transport::new());
    AutoNegotiator::with_components(
        config,
        Arc::clone(probe) as Arc<dyn AlpnProbe>,
        Agent::new(AgentConfig::default()).unwrap(),
        Arc::clone(&legacy),
        legacy,
    )
    .unwrap()
}

#[tokio::test]
async fn sequential_resolves_probe_once() {
    let probe = CountingProbe::new();
    let negotiator = negotiator(&probe);

    let first = negotiator.resolve("https://example.com", ResolveOptions::default()).await.unwrap();
    let second = negotiator.resolve("https://example.com/other", ResolveOptions::default()).await.unwrap();

    assert!(first.is_multiplexed());
    assert!(second.is_multiplexed());
    assert_eq!(probe.count(), 1);
    assert_eq!(negotiator.protocol_cache().len(), 1);
}

#[tokio::test]
async fn concurrent_resolves_share_one_probe() {
    let probe = CountingProbe::new();
    let negotiator = negotiator(&probe);

    let (a, b, c) = tokio::join!(
        negotiator.resolve("https://example.com", ResolveOptions::default()),
        negotiator.resolve("https://example.com", ResolveOptions::default()),
        negotiator.resolve("https://example.com:443", ResolveOptions::default()),
    );

    assert!(a.unwrap().is_multiplexed());
    assert!(b.unwrap().is_multiplexed());
    assert!(c.unwrap().is_multiplexed());
    assert_eq!(probe.count(), 1);
}

#[tokio::test]
async fn plain_targets_skip_probing() {
    let probe = CountingProbe::new();
    let negotiator = negotiator(&probe);

    let dispatcher = negotiator.resolve("http://example.com", ResolveOptions::default()).await.unwrap();

    assert!(matches!(dispatcher, Dispatcher::LegacyPlain { .. }));
    assert_eq!(dispatcher.protocol(), "http/1.1");
    assert_eq!(probe.count(), 0);
    assert!(negotiator.protocol_cache().is_empty());
}

#[tokio::test]
async fn legacy_answer_selects_secure_http1() {
    let probe = CountingProbe::new();
    let negotiator = negotiator(&probe);

    let dispatcher = negotiator.resolve("https://legacy.example", ResolveOptions::default()).await.unwrap();

    assert!(matches!(dispatcher, Dispatcher::LegacySecure { .. }));
    assert_eq!(dispatcher.authority().key(), "https://legacy.example");
}

#[tokio::test]
async fn multiplexing_can_be_switched_off() {
    let probe = CountingProbe::new();
    let config = NegotiatorConfig::default().with_multiplexed_supported(false);
    let negotiator = negotiator_with(&probe, config);

    let dispatcher = negotiator.resolve("https://example.com", ResolveOptions::default()).await.unwrap();

    assert!(matches!(dispatcher, Dispatcher::LegacySecure { .. }));
    assert_eq!(probe.count(), 1);
}

#[tokio::test]
async fn offer_order_does_not_split_the_cache() {
    let probe = CountingProbe::new();
    let negotiator = negotiator(&probe);
    let offer = |protocols: [&str; 2]| {
        ResolveOptions::default().with_alpn_protocols(protocols.iter().map(ToString::to_string).collect())
    };

    negotiator.resolve("https://example.com", offer(["h2", "http/1.1"])).await.unwrap();
    negotiator.resolve("https://example.com", offer(["http/1.1", "h2"])).await.unwrap();

    assert_eq!(probe.count(), 1);
}

#[tokio::test]
async fn failed_probe_is_not_cached() {
    let probe = CountingProbe::new();
    let negotiator = negotiator(&probe);

    let first = negotiator.resolve("https://broken.example", ResolveOptions::default()).await;
    let second = negotiator.resolve("https://broken.example", ResolveOptions::default()).await;

    assert!(first.unwrap_err().is_connect());
    assert!(second.unwrap_err().is_connect());
    assert_eq!(probe.count(), 2);
    assert!(negotiator.protocol_cache().is_empty());
}

#[tokio::test]
async fn clearing_the_cache_forces_a_new_probe() {
    let probe = CountingProbe::new();
    let negotiator = negotiator(&probe);

    negotiator.resolve("https://example.com", ResolveOptions::default()).await.unwrap();
    negotiator.clear_protocol_cache();
    negotiator.resolve("https://example.com", ResolveOptions::default()).await.unwrap();

    assert_eq!(probe.count(), 2);
}

#[tokio::test]
async fn agent_slots_pick_the_instance() {
    let probe = CountingProbe::new();
    let negotiator = negotiator(&probe);
    let shared = negotiator.http2_agent().clone();
    let custom = Agent::new(AgentConfig::default()).unwrap();

    let pick = |http2: Slot<Agent>| {
        let negotiator = negotiator.clone();
        async move {
            let slots = AgentSlots {
                http2,
                ..AgentSlots::default()
            };
            let options = ResolveOptions::default().with_agents(slots);
            match negotiator.resolve("https://example.com", options).await.unwrap() {
                Dispatcher::Multiplexed { agent, .. } => agent,
                other => panic!("expected multiplexed path, got {other:?}"),
            }
        }
    };

    assert!(pick(Slot::Default).await.same_pool(&shared));
    assert!(pick(Slot::Custom(custom.clone())).await.same_pool(&custom));
    let fresh = pick(Slot::Disabled).await;
    assert!(!fresh.same_pool(&shared));
    assert!(!fresh.same_pool(&custom));
}

#[tokio::test]
async fn legacy_slot_can_be_replaced() {
    let probe = CountingProbe::new();
    let negotiator = negotiator(&probe);
    let custom: Arc<dyn LegacyTransport> = Arc::new(Http1Transport::unpooled());

    let slots = AgentSlots {
        http: Slot::Custom(Arc::clone(&custom)),
        ..AgentSlots::default()
    };
    let options = ResolveOptions::default().with_agents(slots);
    let dispatcher = negotiator.resolve("http://example.com", options).await.unwrap();

    match dispatcher {
        Dispatcher::LegacyPlain { transport, .. } => assert!(Arc::ptr_eq(&transport, &custom)),
        other => panic!("expected plain path, got {other:?}"),
    }
}

#[tokio::test]
async fn unsupported_scheme_is_a_builder_error() {
    let probe = CountingProbe::new();
    let negotiator = negotiator(&probe);

    let err = negotiator.resolve("ws://example.com", ResolveOptions::default()).await.unwrap_err();

    assert!(err.is_builder());
    assert_eq!(probe.count(), 0);
}
