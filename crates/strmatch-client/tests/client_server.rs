//! Client library against a live strmatch server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;

use tokio::net::TcpListener;
use tokio::sync::watch;

use strmatch_client::{ClientError, Endpoint, query, tls_connector};
use strmatch_core::ServerConfig;
use strmatch_server::SearchServer;
use strmatch_server::tls::{CertBundle, build_acceptor, generate_dev_bundle};

const DATA: &str = "alpha\nbeta\n9;0;1;28;0;19;4;0;\n";

fn server_for(data_path: &Path) -> SearchServer {
    let mut config = ServerConfig::default();
    config.files.data_path = data_path.to_path_buf();
    SearchServer::new(&config).unwrap()
}

async fn spawn(server: SearchServer) -> (SocketAddr, watch::Sender<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = watch::channel(false);
    tokio::spawn(server.serve(listener, rx));
    (addr, tx)
}

fn with_tls(server: SearchServer, bundle: &CertBundle) -> SearchServer {
    let chain = rustls_pemfile::certs(&mut BufReader::new(bundle.server_cert_pem.as_bytes()))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut BufReader::new(bundle.server_key_pem.as_bytes()))
        .unwrap()
        .unwrap();
    server.with_tls(build_acceptor(chain, key).unwrap())
}

#[tokio::test]
async fn plain_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    std::fs::write(&data, DATA).unwrap();
    let (addr, _shutdown) = spawn(server_for(&data)).await;
    let endpoint = Endpoint::new("127.0.0.1", addr.port());

    assert_eq!(query(&endpoint, None, "beta").await.unwrap(), "STRING EXISTS");
    assert_eq!(
        query(&endpoint, None, "9;0;1;28;0;19;4;0;").await.unwrap(),
        "STRING EXISTS"
    );
    assert_eq!(
        query(&endpoint, None, "gamma").await.unwrap(),
        "STRING NOT EXIST"
    );
}

#[tokio::test]
async fn tls_with_ca_cert() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    std::fs::write(&data, DATA).unwrap();

    let bundle = generate_dev_bundle(&["localhost", "127.0.0.1"]).unwrap();
    let ca_path = dir.path().join("ca.pem");
    std::fs::write(&ca_path, &bundle.ca_cert_pem).unwrap();

    let (addr, _shutdown) = spawn(with_tls(server_for(&data), &bundle)).await;
    let connector = tls_connector(Some(&ca_path), false).unwrap();

    for host in ["localhost", "127.0.0.1"] {
        let endpoint = Endpoint::new(host, addr.port());
        assert_eq!(
            query(&endpoint, Some(&connector), "alpha").await.unwrap(),
            "STRING EXISTS",
            "host: {host}"
        );
    }
}

#[tokio::test]
async fn tls_with_untrusted_ca_fails() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    std::fs::write(&data, DATA).unwrap();

    let served = generate_dev_bundle(&["localhost"]).unwrap();
    let other = generate_dev_bundle(&["localhost"]).unwrap();
    let ca_path = dir.path().join("other-ca.pem");
    std::fs::write(&ca_path, &other.ca_cert_pem).unwrap();

    let (addr, _shutdown) = spawn(with_tls(server_for(&data), &served)).await;
    let connector = tls_connector(Some(&ca_path), false).unwrap();
    let endpoint = Endpoint::new("localhost", addr.port());

    let err = query(&endpoint, Some(&connector), "alpha").await.unwrap_err();
    assert!(matches!(err, ClientError::Tls(_)), "got: {err}");
}

#[tokio::test]
async fn tls_insecure_skips_verification() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    std::fs::write(&data, DATA).unwrap();

    let bundle = generate_dev_bundle(&["some-other-name"]).unwrap();
    let (addr, _shutdown) = spawn(with_tls(server_for(&data), &bundle)).await;
    let connector = tls_connector(None, true).unwrap();
    let endpoint = Endpoint::new("127.0.0.1", addr.port());

    assert_eq!(
        query(&endpoint, Some(&connector), "nope").await.unwrap(),
        "STRING NOT EXIST"
    );
}
