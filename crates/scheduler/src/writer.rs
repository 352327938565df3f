//! Downstream metric sink.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::prelude::*;
use zeromq::{PubSocket, ZmqMessage};

use crate::error::WriterError;

/// Destination for serialized metrics.
///
/// Shared by every Scheduler's consume loop, so implementations must accept
/// concurrent calls. Failures are logged by the caller and never retried.
#[async_trait]
pub trait MetricWriter: Send + Sync {
    async fn write(&self, topic: &str, payload: Vec<u8>) -> Result<(), WriterError>;
}

/// ZeroMQ PUB socket writer.
///
/// Each metric goes out as a two-frame message:
/// 1. Topic string (subscribers filter on its prefix)
/// 2. JSON-encoded metric
pub struct ZmqWriter {
    socket: Mutex<PubSocket>,
}

impl ZmqWriter {
    /// Connect to a downstream SUB socket or broker frontend.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn connect(endpoint: &str) -> Result<Self, WriterError> {
        let mut socket = PubSocket::new();
        info!("connecting metric PUB socket");
        socket.connect(endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Bind locally and let subscribers connect.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn bind(endpoint: &str) -> Result<Self, WriterError> {
        let mut socket = PubSocket::new();
        info!("binding metric PUB socket");
        socket.bind(endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl MetricWriter for ZmqWriter {
    async fn write(&self, topic: &str, payload: Vec<u8>) -> Result<(), WriterError> {
        let mut message = ZmqMessage::from(topic);
        message.push_back(payload.into());

        let mut socket = self.socket.lock().await;
        socket.send(message).await?;

        debug!(topic = %topic, "wrote metric");
        Ok(())
    }
}
