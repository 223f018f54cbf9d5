use std::process;

use bytes::Bytes;
use http::Response;
use tracing::error;
use tracing_subscriber::EnvFilter;

use pico_http::config::ServerConfig;
use pico_http::handler::{make_handler, BoxError};
use pico_http::server::Reactor;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match ServerConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path, error = %e, "failed to load config");
                process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };

    let handler = make_handler(|request| {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let body = request.into_body();
        let reply = format!("received {} {} with {} body bytes\r\n", method, path, body.len());
        Ok::<_, BoxError>(Response::builder().status(200).body(Bytes::from(reply))?)
    });

    let mut reactor = match Reactor::bind(config, handler) {
        Ok(reactor) => reactor,
        Err(e) => {
            error!(error = %e, "failed to start server");
            process::exit(1);
        }
    };

    if let Err(e) = reactor.run() {
        error!(error = %e, "event loop failed");
        process::exit(1);
    }
}
