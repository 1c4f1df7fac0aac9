use crate::error::{ClientError, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Channel;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by a [`ChannelBuilder`]
pub type ChannelFuture = Pin<Box<dyn Future<Output = std::result::Result<Channel, BoxError>> + Send>>;

/// Type alias for channel creation function
///
/// Takes a `host:port` address. Swapping the builder allows TLS, custom
/// timeouts or, in tests, recording connection attempts.
pub type ChannelBuilder = Arc<dyn Fn(String) -> ChannelFuture + Send + Sync>;

/// Default channel builder for insecure HTTP connections
pub fn default_channel_builder() -> ChannelBuilder {
    Arc::new(|address: String| -> ChannelFuture {
        Box::pin(async move {
            let uri = format!("http://{}", address);
            let endpoint = Channel::from_shared(uri).map_err(|e| Box::new(e) as BoxError)?;
            endpoint.connect().await.map_err(|e| Box::new(e) as BoxError)
        })
    })
}

/// Channel builder that gives up connecting after `timeout`
pub fn channel_builder_with_timeout(timeout: Duration) -> ChannelBuilder {
    Arc::new(move |address: String| -> ChannelFuture {
        Box::pin(async move {
            let uri = format!("http://{}", address);
            let endpoint = Channel::from_shared(uri)
                .map_err(|e| Box::new(e) as BoxError)?
                .connect_timeout(timeout);
            endpoint.connect().await.map_err(|e| Box::new(e) as BoxError)
        })
    })
}

/// Open a channel to `address` (`host:port`) through `builder`.
pub async fn connect_channel(builder: &ChannelBuilder, address: &str) -> Result<Channel> {
    builder(address.to_string())
        .await
        .map_err(|e| ClientError::Connect {
            address: address.to_string(),
            reason: e.to_string(),
        })
}
