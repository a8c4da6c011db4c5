mod common;

use std::sync::Arc;

use common::{Script, agent, head, options, wait_until};
use muxpool_client::SessionState;

const TARGET: &str = "https://example.com";

#[tokio::test]
async fn concurrent_get_session_shares_one_connection() {
    let (agent, connector) = agent(Script::Settings(100));

    let opts = options();
    let (first, second) = tokio::join!(
        agent.get_session(TARGET, &opts),
        agent.get_session(TARGET, &opts),
    );

    let first = first.unwrap();
    let second = second.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(connector.connect_count(), 1);
    assert_eq!(agent.stats().queue_joins, 1);
    assert_eq!(first.state(), SessionState::Free);
}

#[tokio::test]
async fn sequential_streams_reuse_the_free_session() {
    let (agent, connector) = agent(Script::Settings(100));

    let first = agent.open_stream(TARGET, &options(), head(TARGET)).await.unwrap();
    let second = agent.open_stream(TARGET, &options(), head(TARGET)).await.unwrap();

    assert_eq!(first.session().id(), second.session().id());
    assert_eq!(first.session().current_streams(), 2);
    assert_eq!(connector.connect_count(), 1);
    assert_eq!(agent.stats().reuse_hits, 1);
}

#[tokio::test]
async fn equivalent_targets_share_a_key() {
    let (agent, connector) = agent(Script::Settings(100));

    let a = agent.get_session("https://EXAMPLE.com:443/some/path", &options()).await.unwrap();
    let b = agent.get_session("https://example.com", &options()).await.unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test]
async fn different_options_never_share() {
    let (agent, connector) = agent(Script::Settings(100));
    let strict = options();
    let relaxed = options().reject_unauthorized(false);

    let a = agent.get_session(TARGET, &strict).await.unwrap();
    let b = agent.get_session(TARGET, &relaxed).await.unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(connector.connect_count(), 2);
    assert_ne!(a.fingerprint(), b.fingerprint());
}

#[tokio::test]
async fn session_at_capacity_moves_to_busy_and_back() {
    let (agent, _connector) = agent(Script::Settings(1));

    let mut stream = agent.open_stream(TARGET, &options(), head(TARGET)).await.unwrap();
    assert_eq!(agent.busy_session_count(), 1);
    assert_eq!(agent.free_session_count(), 0);
    assert_eq!(stream.session().state(), SessionState::Busy);

    stream.close();
    assert!(stream.is_released());
    assert_eq!(agent.busy_session_count(), 0);
    assert_eq!(agent.free_session_count(), 1);
    assert_eq!(stream.session().current_streams(), 0);
}

#[tokio::test]
async fn busier_free_session_is_preferred() {
    let (agent, connector) = agent(Script::Settings(4));
    let opts = options();
    let open = || agent.open_stream(TARGET, &opts, head(TARGET));

    let mut on_a = Vec::new();
    for _ in 0..4 {
        on_a.push(open().await.unwrap());
    }
    let a_id = on_a[0].session().id();
    assert_eq!(agent.busy_session_count(), 1);

    let mut on_b = Vec::new();
    for _ in 0..3 {
        on_b.push(open().await.unwrap());
    }
    let b_id = on_b[0].session().id();
    assert_ne!(a_id, b_id);
    assert_eq!(connector.connect_count(), 2);

    // a: 3 open, b: 2 open, both free
    drop(on_a.pop());
    drop(on_b.pop());
    assert_eq!(agent.free_session_count(), 2);

    let next = open().await.unwrap();
    assert_eq!(next.session().id(), a_id);
}

#[tokio::test]
async fn peer_limit_is_capped_by_options() {
    let (agent, _connector) = agent(Script::Settings(100));
    let capped = options().peer_max_concurrent_streams(2);

    let session = agent.get_session(TARGET, &capped).await.unwrap();

    assert_eq!(session.capacity(), 2);
}

#[tokio::test]
async fn settings_update_reclassifies_session() {
    let (agent, connector) = agent(Script::Manual);

    let pending = tokio::spawn({
        let agent = agent.clone();
        async move { agent.get_session(TARGET, &options()).await }
    });
    wait_until(|| connector.connect_count() == 1).await;
    let control = connector.session(0);

    control.settings(10);
    let session = pending.await.unwrap().unwrap();
    assert_eq!(agent.free_session_count(), 1);

    control.settings(0);
    wait_until(|| agent.busy_session_count() == 1).await;
    assert_eq!(session.capacity(), 0);
    assert_eq!(agent.free_session_count(), 0);

    control.settings(5);
    wait_until(|| agent.free_session_count() == 1).await;
    assert_eq!(session.capacity(), 5);
}

#[tokio::test]
async fn open_stream_on_checks_out_from_known_session() {
    let (agent, _connector) = agent(Script::Settings(1));
    let session = agent.get_session(TARGET, &options()).await.unwrap();

    let stream = agent.open_stream_on(&session, head(TARGET)).unwrap();
    assert_eq!(session.current_streams(), 1);

    let err = agent.open_stream_on(&session, head(TARGET)).unwrap_err();
    assert!(err.is_stream());
    drop(stream);
    assert_eq!(session.current_streams(), 0);
}

#[tokio::test]
async fn cancel_releases_immediately() {
    let (agent, connector) = agent(Script::Settings(10));

    let mut stream = agent.open_stream(TARGET, &options(), head(TARGET)).await.unwrap();
    stream.cancel();
    stream.cancel();

    let control = connector.session(0);
    assert_eq!(control.state.canceled.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(stream.session().current_streams(), 0);
    assert_eq!(agent.stats().streams_closed, 1);
}
