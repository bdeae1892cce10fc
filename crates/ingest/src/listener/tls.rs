//! webhook TLS 설정 및 HTTPS 서빙 루프
//!
//! PEM 형식 인증서 체인과 개인키 파일로 rustls 서버 설정을 만들고,
//! 수락한 TLS 연결마다 hyper 연결 태스크를 띄워 axum 라우터로 요청을 넘깁니다.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, info, warn};

use super::LISTENER_WEBHOOK;
use crate::error::IngestError;

/// 인증서와 개인키 파일로 TLS acceptor를 만듭니다.
pub fn tls_acceptor(
    cert_file: impl AsRef<Path>,
    key_file: impl AsRef<Path>,
) -> Result<TlsAcceptor, IngestError> {
    let certs = load_certs(cert_file.as_ref())?;
    let key = load_private_key(key_file.as_ref())?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| IngestError::Tls(format!("unsupported protocol versions: {e}")))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| IngestError::Tls(format!("invalid certificate or key: {e}")))?;

    info!(
        cert_file = %cert_file.as_ref().display(),
        "TLS configuration loaded"
    );

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// PEM 파일에서 인증서 체인을 읽습니다.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, IngestError> {
    let file = File::open(path).map_err(|e| {
        IngestError::Tls(format!("failed to open cert file {}: {e}", path.display()))
    })?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| IngestError::Tls(format!("failed to parse certificates: {e}")))?;

    if certs.is_empty() {
        return Err(IngestError::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    Ok(certs)
}

/// PEM 파일에서 개인키를 읽습니다 (PKCS#8, PKCS#1, SEC1).
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, IngestError> {
    let file = File::open(path).map_err(|e| {
        IngestError::Tls(format!("failed to open key file {}: {e}", path.display()))
    })?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| IngestError::Tls(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| IngestError::Tls(format!("no private key found in {}", path.display())))
}

/// TLS 연결 수락 루프
///
/// 취소되면 새 연결 수락을 멈추고, 열린 연결에 graceful shutdown을 알린 뒤
/// 처리 중인 요청이 끝날 때까지 기다립니다.
pub(crate) async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    app: Router,
    cancel: CancellationToken,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(listener = LISTENER_WEBHOOK, error = %e, "accept failed");
                        continue;
                    }
                };

                let acceptor = acceptor.clone();
                let app = app.clone();
                let cancel = cancel.clone();
                connections.spawn(async move {
                    let tls = match acceptor.accept(stream).await {
                        Ok(tls) => tls,
                        Err(e) => {
                            debug!(listener = LISTENER_WEBHOOK, peer = %peer, error = %e, "TLS handshake failed");
                            return;
                        }
                    };

                    let service = hyper::service::service_fn(move |req: hyper::Request<Incoming>| {
                        app.clone().call(req)
                    });
                    let builder = auto::Builder::new(TokioExecutor::new());
                    let conn = builder.serve_connection(TokioIo::new(tls), service);
                    tokio::pin!(conn);

                    let result = tokio::select! {
                        result = conn.as_mut() => result,
                        _ = cancel.cancelled() => {
                            conn.as_mut().graceful_shutdown();
                            conn.await
                        }
                    };
                    if let Err(e) = result {
                        debug!(listener = LISTENER_WEBHOOK, peer = %peer, error = %e, "connection error");
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = cancel.cancelled() => {
                debug!(listener = LISTENER_WEBHOOK, "received shutdown signal");
                break;
            }
        }
    }

    drop(listener);
    while connections.join_next().await.is_some() {}
}
