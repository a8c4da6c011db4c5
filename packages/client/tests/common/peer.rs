//! Real TLS and HTTP/2 peers for tests that exercise the bundled transport.

use std::sync::Arc;

use bytes::Bytes;
use http::{Response, StatusCode};
use rustls::ServerConfig;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// TLS acceptor with a fresh self-signed certificate for `localhost`,
/// offering `h2` over ALPN.
pub fn tls_acceptor() -> TlsAcceptor {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let cert = rcgen::CertificateParams::new(vec!["localhost".to_string()])
        .unwrap()
        .self_signed(&key_pair)
        .unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .unwrap();
    config.alpn_protocols = vec![b"h2".to_vec()];
    TlsAcceptor::from(Arc::new(config))
}

pub async fn local_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Answer every request with an empty 200 until the client goes away.
pub async fn serve_h2<T>(io: T, builder: h2::server::Builder)
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let Ok(mut connection) = builder.handshake::<_, Bytes>(io).await else {
        return;
    };
    while let Some(Ok((_request, mut respond))) = connection.accept().await {
        let response = Response::builder().status(StatusCode::OK).body(()).unwrap();
        let _ = respond.send_response(response, true);
    }
}

/// An HTTP/2 CONNECT proxy answering every tunnel request with `status`.
/// Accepted tunnels echo whatever the client sends.
pub async fn serve_connect_proxy<T>(io: T, status: StatusCode)
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let Ok(mut connection) = h2::server::handshake(io).await else {
        return;
    };
    while let Some(Ok((request, mut respond))) = connection.accept().await {
        let accepted = status == StatusCode::OK;
        let response = Response::builder().status(status).body(()).unwrap();
        let Ok(mut send) = respond.send_response(response, !accepted) else {
            continue;
        };
        if !accepted {
            continue;
        }

        let mut body = request.into_body();
        tokio::spawn(async move {
            while let Some(Ok(data)) = body.data().await {
                let _ = body.flow_control().release_capacity(data.len());
                if send.send_data(data, false).is_err() {
                    break;
                }
            }
        });
    }
}
