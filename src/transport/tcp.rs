use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::BytesMut;
use futures::SinkExt;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::core::assembler::FrameAssembler;
use crate::core::codec::DhipCodec;
use crate::core::frame::Frame;
use crate::error::{constants, DhipError, Result};
use crate::protocol::correlator::Correlator;
use crate::protocol::message::{Request, Response};
use crate::utils::metrics::global_metrics;

const READ_CHUNK: usize = 4096;

/// Build the `host:port` to dial.
///
/// An address that already names a port is used as given; bare hosts and IPs get `port`.
pub fn resolve_target(address: &str, port: u16) -> String {
    let address = address.trim();

    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return SocketAddr::new(ip, port).to_string();
    }
    if let Some((host, maybe_port)) = address.rsplit_once(':') {
        if !host.is_empty() && !host.contains(':') && maybe_port.parse::<u16>().is_ok() {
            return address.to_string();
        }
    }

    format!("{address}:{port}")
}

/// One open TCP connection to a device.
///
/// Dropping a connection without [`close`](Connection::close) still stops its
/// tasks, but skips the orderly shutdown of the write half.
pub struct Connection {
    correlator: Arc<Correlator>,
    config: ClientConfig,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl Connection {
    /// Connect to `target` (`host:port`) within `config.connect_timeout`
    #[instrument(skip(config))]
    pub async fn connect(target: &str, config: &ClientConfig) -> Result<Self> {
        let stream = match tokio::time::timeout(config.connect_timeout, TcpStream::connect(target))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                global_metrics().connection_error();
                return Err(DhipError::ConnectFailure(e.to_string()));
            }
            Err(_) => {
                global_metrics().connection_error();
                return Err(DhipError::ConnectFailure(
                    constants::ERR_CONNECT_TIMEOUT.into(),
                ));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not disable Nagle's algorithm");
        }
        debug!("Connected to device");
        global_metrics().connection_established();

        let (read_half, write_half) = stream.into_split();
        let (correlator, outbound) = Correlator::new(
            config.credentials(),
            config.login_params(),
            config.max_auth_attempts,
        );
        let correlator = Arc::new(correlator);

        let writer = tokio::spawn(write_loop(
            FramedWrite::new(write_half, DhipCodec),
            outbound,
            correlator.clone(),
        ));
        let reader = tokio::spawn(read_loop(
            read_half,
            FrameAssembler::with_max_body_size(config.max_body_size),
            correlator.clone(),
        ));

        Ok(Self {
            correlator,
            config: config.clone(),
            writer: Some(writer),
            reader: Some(reader),
        })
    }

    /// Send `request` and wait for its final (post-challenge) response
    pub async fn call(&self, request: Request) -> Result<Response> {
        self.correlator
            .call(request, self.config.response_timeout)
            .await
    }

    /// Log in, answering any challenge on the way
    pub async fn login(&self) -> Result<Response> {
        self.call(self.correlator.login_request()).await
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Tear the connection down. Any pending request fails with `TransportClosed`.
    pub async fn close(&mut self) {
        self.correlator.shutdown();

        if let Some(writer) = self.writer.take() {
            // The writer exits once the queue is drained, shutting down the write half.
            let _ = writer.await;
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
            let _ = reader.await;
        }

        global_metrics().connection_closed();
        debug!("Connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.writer.is_none() && self.reader.is_none() {
            return;
        }

        self.correlator.shutdown();
        for task in [self.writer.take(), self.reader.take()].into_iter().flatten() {
            task.abort();
        }
        global_metrics().connection_closed();
    }
}

async fn write_loop(
    mut sink: FramedWrite<OwnedWriteHalf, DhipCodec>,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    correlator: Arc<Correlator>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = sink.send(frame).await {
            warn!(error = %e, "Received transmission error while writing");
            correlator.on_transport_closed();
            return;
        }
    }

    if let Err(e) = sink.close().await {
        debug!(error = %e, "Error shutting down write half");
    }
}

async fn read_loop(
    mut stream: OwnedReadHalf,
    mut assembler: FrameAssembler,
    correlator: Arc<Correlator>,
) {
    let mut chunk = BytesMut::with_capacity(READ_CHUNK);

    loop {
        chunk.clear();
        match stream.read_buf(&mut chunk).await {
            Ok(0) => {
                debug!("Received end of transmission");
                correlator.on_transport_closed();
                return;
            }
            Ok(n) => {
                global_metrics().bytes_read(n);
                match assembler.push::<Response>(&chunk) {
                    Ok(Some(response)) => {
                        debug!(id = ?response.id, "Received frame");
                        correlator.on_message(response);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "Dropping connection after framing error");
                        correlator.on_transport_error(e);
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Received transmission error");
                correlator.on_transport_closed();
                return;
            }
        }
    }
}
