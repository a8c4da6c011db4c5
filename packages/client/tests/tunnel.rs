mod common;

use std::time::Duration;

use common::peer::{local_listener, serve_connect_proxy, serve_h2, tls_acceptor};
use common::wait_until;
use http::StatusCode;
use muxpool_client::connect::{Dialer, Io};
use muxpool_client::proxy::{ProxyReach, TunnelDescriptor, TunnelDialer, tunnel_agent};
use muxpool_client::{Agent, AgentConfig, Authority, SessionOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_test::assert_ok;

/// Read one request head off `socket`.
async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = socket.read(&mut byte).await.unwrap();
        assert_ne!(n, 0, "client hung up mid-request");
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

struct FakeProxy {
    url: String,
    seen: oneshot::Receiver<(String, bool)>,
}

/// A single-connection proxy answering CONNECT with `status_line`.
///
/// On 200 it echoes tunneled bytes. Otherwise it reports whether the client
/// closed the socket after the rejection.
async fn fake_proxy(status_line: &'static str, credentials: &str) -> FakeProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, seen) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let head = read_head(&mut socket).await;
        let accepted = status_line.starts_with("HTTP/1.1 200");

        let response = if accepted {
            format!("{status_line}\r\n\r\n")
        } else {
            format!("{status_line}\r\ncontent-length: 0\r\n\r\n")
        };
        socket.write_all(response.as_bytes()).await.unwrap();

        if accepted {
            let _ = tx.send((head, false));
            let mut buf = [0u8; 64];
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => socket.write_all(&buf[..n]).await.unwrap(),
                }
            }
        } else {
            let mut buf = [0u8; 64];
            let closed = matches!(
                tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf)).await,
                Ok(Ok(0) | Err(_))
            );
            let _ = tx.send((head, closed));
        }
    });

    FakeProxy {
        url: format!("http://{credentials}127.0.0.1:{port}"),
        seen,
    }
}

fn target() -> Authority {
    Authority::parse("https://example.com").unwrap()
}

#[tokio::test]
async fn rejected_connect_reports_status_and_closes_socket() {
    let proxy = fake_proxy("HTTP/1.1 403 Forbidden", "user:pw@").await;
    let descriptor = TunnelDescriptor::new(&proxy.url).unwrap();
    let dialer = TunnelDialer::new(descriptor, ProxyReach::Plain).unwrap();

    let err = match dialer.dial(&target(), &SessionOptions::default()).await {
        Ok(_) => panic!("tunnel should be rejected"),
        Err(err) => err,
    };
    assert!(err.is_proxy_status());
    assert_eq!(err.status_code(), Some(403));
    assert!(err.url().is_some_and(|url| url.password().is_none()));

    let (head, closed) = proxy.seen.await.unwrap();
    let head = head.to_ascii_lowercase();
    assert!(head.starts_with("connect example.com:443 http/1.1\r\n"));
    assert!(head.contains("host: example.com:443\r\n"));
    assert!(head.contains("proxy-authorization: basic dxnlcjpwdw==\r\n"));
    assert!(closed);
}

#[tokio::test]
async fn tunnel_agent_surfaces_proxy_status() {
    let proxy = fake_proxy("HTTP/1.1 407 Proxy Authentication Required", "").await;
    let descriptor = TunnelDescriptor::new(&proxy.url).unwrap();
    let reach = ProxyReach::for_proxy(&descriptor.proxy_authority().unwrap());
    let agent = tunnel_agent(descriptor, reach, AgentConfig::default()).unwrap();

    let err = agent
        .get_session("https://example.com", &SessionOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(407));
    assert_eq!(agent.session_count(), 0);

    let (head, _) = proxy.seen.await.unwrap();
    assert!(!head.to_ascii_lowercase().contains("proxy-authorization"));
}

#[tokio::test]
async fn raw_tunnel_carries_bytes_unchanged() {
    let proxy = fake_proxy("HTTP/1.1 200 Connection Established", "").await;
    let descriptor = TunnelDescriptor::new(&proxy.url)
        .unwrap()
        .with_header("x-tunnel-id", "abc")
        .unwrap()
        .raw(true);
    let dialer = TunnelDialer::new(descriptor, ProxyReach::Plain).unwrap();

    let mut io = assert_ok!(dialer.dial(&target(), &SessionOptions::default()).await);

    let info = io.connection_info();
    assert!(info.tunneled);
    assert!(info.negotiated_h2());
    assert_eq!(info.authority.as_deref(), Some("example.com:443"));
    assert_eq!(info.remote_addr, None);

    io.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    io.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"ping");

    let (head, _) = proxy.seen.await.unwrap();
    assert!(head.to_ascii_lowercase().contains("x-tunnel-id: abc\r\n"));
}

/// An HTTP/2 proxy on a local listener, plus a pool that reaches it.
async fn multiplexed_proxy(status: StatusCode) -> (String, Agent) {
    let (listener, port) = local_listener().await;
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        serve_connect_proxy(socket, status).await;
    });
    let proxy_pool = Agent::new(AgentConfig::default()).unwrap();
    (format!("http://127.0.0.1:{port}"), proxy_pool)
}

#[tokio::test]
async fn multiplexed_reach_reports_status_and_releases_the_stream() {
    let (url, proxy_pool) = multiplexed_proxy(StatusCode::FORBIDDEN).await;
    let descriptor = TunnelDescriptor::new(&url).unwrap();
    let dialer = TunnelDialer::new(descriptor, ProxyReach::Multiplexed(proxy_pool.clone())).unwrap();

    let err = match dialer.dial(&target(), &SessionOptions::default()).await {
        Ok(_) => panic!("tunnel should be rejected"),
        Err(err) => err,
    };

    assert!(err.is_proxy_status());
    assert_eq!(err.status_code(), Some(403));
    wait_until(|| proxy_pool.stats().streams_in_flight() == 0).await;
    // the session to the proxy stays pooled for the next tunnel
    assert_eq!(proxy_pool.session_count(), 1);
}

#[tokio::test]
async fn multiplexed_reach_carries_bytes_unchanged() {
    let (url, proxy_pool) = multiplexed_proxy(StatusCode::OK).await;
    let descriptor = TunnelDescriptor::new(&url).unwrap().raw(true);
    let dialer = TunnelDialer::new(descriptor, ProxyReach::Multiplexed(proxy_pool.clone())).unwrap();

    let mut io = assert_ok!(dialer.dial(&target(), &SessionOptions::default()).await);

    let info = io.connection_info();
    assert!(info.tunneled);
    assert!(info.negotiated_h2());
    assert_eq!(info.authority.as_deref(), Some("example.com:443"));
    assert_eq!(proxy_pool.stats().streams_in_flight(), 1);

    io.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    io.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"ping");
}

#[tokio::test]
async fn tls_handshake_runs_through_the_tunnel() {
    let (listener, port) = local_listener().await;
    let acceptor = tls_acceptor();
    let (head_tx, head_rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let head = read_head(&mut socket).await;
        socket
            .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
            .await
            .unwrap();
        let _ = head_tx.send(head);
        // the proxy end of the tunnel terminates TLS itself
        let tls = acceptor.accept(socket).await.unwrap();
        serve_h2(tls, h2::server::Builder::new()).await;
    });

    let descriptor = TunnelDescriptor::new(&format!("http://127.0.0.1:{port}")).unwrap();
    let agent = tunnel_agent(descriptor, ProxyReach::Plain, AgentConfig::default()).unwrap();
    let options = SessionOptions::default().reject_unauthorized(false);

    let session = agent.get_session("https://localhost", &options).await.unwrap();

    assert!(session.is_settled());
    let head = head_rx.await.unwrap().to_ascii_lowercase();
    assert!(head.starts_with("connect localhost:443 http/1.1\r\n"));
    wait_until(|| agent.tls_session_cache().len() == 1).await;
}
