use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, error, info};

use crate::error::Error;
use crate::http::connection::Connection;
use crate::middleware::pipeline::Pipeline;

/// A bound listener with the pipeline every accepted connection runs through.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    pipeline: Arc<Pipeline>,
}

impl Server {
    pub async fn bind<A>(addr: A, pipeline: Pipeline) -> Result<Self, Error>
    where
        A: ToSocketAddrs + std::fmt::Display,
    {
        let shown = addr.to_string();
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                error!("Server error: failed to bind {}: {}", shown, source);
                return Err(Error::Listen {
                    addr: shown,
                    source,
                });
            }
        };

        info!("Listening on {}", shown);
        Ok(Self {
            listener,
            pipeline: Arc::new(pipeline),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, one task per connection.
    ///
    /// A failed accept is logged and does not stop the loop.
    pub async fn run(self) -> Result<(), Error> {
        loop {
            let (socket, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };
            debug!("Accepted connection from {}", peer);

            let pipeline = Arc::clone(&self.pipeline);
            tokio::spawn(async move {
                let mut conn = Connection::new(socket, peer, pipeline);
                if let Err(e) = conn.run().await {
                    error!("Connection error from {}: {}", peer, e);
                }
            });
        }
    }
}
