mod common;

use common::{Script, agent, options, wait_until};
use muxpool_client::cache::{TlsSessionCache, TlsSessionEntry};
use muxpool_client::error;

const TARGET: &str = "https://example.com";

#[tokio::test]
async fn connect_error_rejects_every_waiter() {
    let (agent, connector) = agent(Script::Fail("connection refused".into()));
    let name = TlsSessionCache::cache_name(TARGET, &options().fingerprint());
    agent.tls_session_cache().insert(
        name.clone(),
        TlsSessionEntry {
            ticket: bytes::Bytes::from_static(b"stale"),
            ..TlsSessionEntry::default()
        },
    );

    let opts = options();
    let (first, second) = tokio::join!(
        agent.get_session(TARGET, &opts),
        agent.get_session(TARGET, &opts),
    );

    let first = first.unwrap_err();
    let second = second.unwrap_err();
    assert!(first.is_connect());
    assert!(second.is_connect());
    assert!(first.to_string().contains("connection refused"));
    assert_eq!(connector.connect_count(), 1);
    assert!(!agent.tls_session_cache().contains(&name));
    assert_eq!(agent.session_count(), 0);
    assert_eq!(agent.queued_attempt_count(), 0);
}

#[tokio::test]
async fn close_before_settings_is_a_protocol_error() {
    let (agent, _connector) = agent(Script::CloseEarly);

    let err = agent.get_session(TARGET, &options()).await.unwrap_err();

    assert!(err.is_protocol());
    assert_eq!(agent.pending_session_count(), 0);
}

#[tokio::test]
async fn destroy_rejects_waiters_and_pool_stays_usable() {
    let (agent, connector) = agent(Script::Manual);

    let waiting = tokio::spawn({
        let agent = agent.clone();
        async move { agent.get_session(TARGET, &options()).await }
    });
    wait_until(|| connector.connect_count() == 1).await;

    agent.destroy(Some("shutting down"));
    let err = waiting.await.unwrap().unwrap_err();
    assert!(err.is_destroyed());
    assert!(err.to_string().contains("shutting down"));
    assert!(connector.session(0).is_destroyed());
    assert_eq!(agent.pending_session_count(), 0);

    connector.set_script(Script::Settings(10));
    let session = agent.get_session(TARGET, &options()).await.unwrap();
    assert!(session.is_settled());
    assert_eq!(connector.connect_count(), 2);
}

#[tokio::test]
async fn session_error_after_settings_is_isolated() {
    let (agent, connector) = agent(Script::Settings(10));

    let failing = agent.get_session(TARGET, &options()).await.unwrap();
    let other = agent.get_session("https://other.example", &options()).await.unwrap();

    connector.session(0).fail(error::connect("reset by peer"));
    wait_until(|| connector.session(0).is_destroyed()).await;

    assert!(failing.is_retired());
    assert!(!other.is_retired());
    assert_eq!(agent.session_count(), 1);
}

#[tokio::test]
async fn tls_ticket_is_offered_to_the_next_connection() {
    let (agent, connector) = agent(Script::Manual);

    let first = tokio::spawn({
        let agent = agent.clone();
        async move { agent.get_session(TARGET, &options()).await }
    });
    wait_until(|| connector.connect_count() == 1).await;
    let control = connector.session(0);
    assert!(control.cached_tls.is_none());

    control.settings(10);
    control.tls_session(b"ticket");
    first.await.unwrap().unwrap();
    wait_until(|| agent.tls_session_cache().len() == 1).await;

    agent.destroy(None);
    connector.set_script(Script::Settings(10));
    agent.get_session(TARGET, &options()).await.unwrap();

    let offered = connector.session(1).cached_tls.expect("cached ticket offered");
    assert_eq!(&offered.ticket[..], b"ticket");
    assert_eq!(agent.stats().tls_cache_hits, 1);
}

#[tokio::test]
async fn dropping_the_agent_destroys_sessions() {
    let (agent, connector) = agent(Script::Settings(10));
    agent.get_session(TARGET, &options()).await.unwrap();

    drop(agent);

    assert!(connector.session(0).is_destroyed());
}
