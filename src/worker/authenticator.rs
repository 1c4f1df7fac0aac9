//! Runtime clients for worker functions that call back into the runtime.

use super::{CallbackAddress, FunctionCall, FunctionHandler, HandlerFuture};
use crate::client::RuntimeClient;
use crate::error::{ClientError, Result, WorkerError};
use crate::grpc::{default_channel_builder, ChannelBuilder, CredentialInterceptor, CredentialStore};
use crate::model::StructValue;
use slog::{debug, Logger};
use std::future::Future;
use std::sync::Arc;

/// Opens authenticated runtime clients on behalf of worker functions.
///
/// Credentials are read from the injected store on every call. When the
/// store lacks either the token or the key, requests go out without
/// credential metadata.
#[derive(Clone)]
pub struct CallbackAuthenticator {
    credentials: Arc<dyn CredentialStore>,
    channel_builder: ChannelBuilder,
    logger: Logger,
}

impl CallbackAuthenticator {
    pub fn new(credentials: Arc<dyn CredentialStore>, logger: Logger) -> Self {
        Self {
            credentials,
            channel_builder: default_channel_builder(),
            logger,
        }
    }

    /// Use a custom channel builder for callback connections.
    pub fn with_channel_builder(mut self, builder: ChannelBuilder) -> Self {
        self.channel_builder = builder;
        self
    }

    /// Connect to the runtime at `callback`.
    ///
    /// Fails with [`ClientError::MissingCallback`] without touching the
    /// network when no address is known.
    pub async fn connect(&self, callback: Option<&CallbackAddress>) -> Result<RuntimeClient> {
        let callback = callback.ok_or(ClientError::MissingCallback)?;
        let interceptor = CredentialInterceptor::from_store(self.credentials.as_ref())?;

        debug!(self.logger, "Calling back into runtime";
            "address" => %callback,
            "authenticated" => interceptor.is_active()
        );

        RuntimeClient::connect_with(
            callback.socket_address(),
            self.channel_builder.clone(),
            interceptor,
            self.logger.clone(),
        )
        .await
    }

    /// Run `handler` with a client connected to `callback`.
    ///
    /// The client, and with it the channel, is owned by the handler's future
    /// and released when it completes, whether or not it succeeded.
    pub async fn call<F, Fut, T, E>(
        &self,
        callback: Option<&CallbackAddress>,
        handler: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(RuntimeClient) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<ClientError>,
    {
        let client = self.connect(callback).await?;
        handler(client).await
    }

    /// Adapt a function that needs a runtime client into a namespace handler.
    ///
    /// The callback address is taken from each incoming call.
    pub fn wrap<F, Fut>(&self, handler: F) -> FunctionHandler
    where
        F: Fn(RuntimeClient, StructValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<StructValue, WorkerError>> + Send + 'static,
    {
        let authenticator = self.clone();
        let handler = Arc::new(handler);
        Arc::new(move |call: FunctionCall| -> HandlerFuture {
            let authenticator = authenticator.clone();
            let handler = handler.clone();
            Box::pin(async move {
                let FunctionCall {
                    inputs, callback, ..
                } = call;
                authenticator
                    .call(callback.as_ref(), move |client| handler(client, inputs))
                    .await
            })
        })
    }
}
