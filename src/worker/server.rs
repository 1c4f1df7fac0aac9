//! gRPC services a worker exposes to the runtime.
//!
//! The runtime discovers a worker's functions through `Signature` and
//! invokes them through `Worker`.

use super::namespace::Namespace;
use super::{CallbackAddress, FunctionCall};
use crate::error::WorkerError;
use crate::grpc::proto::signature as ps;
use crate::grpc::proto::signature::signature_server::{Signature, SignatureServer};
use crate::grpc::proto::worker as pw;
use crate::grpc::proto::worker::worker_server::{Worker as WorkerService, WorkerServer};
use crate::model::{NamedStructs, StructValue};
use slog::{debug, info, warn, Logger};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{transport::Server, Request, Response, Status};

/// Serves the functions of one namespace tree.
#[derive(Clone)]
pub struct Worker {
    root: Arc<Namespace>,
    /// Snapshot of every struct in `root`, used to check inputs and outputs
    structs: Arc<NamedStructs>,
    logger: Logger,
}

impl Worker {
    pub fn new(root: Namespace, logger: Logger) -> Self {
        let structs = root.named_structs();
        Self {
            root: Arc::new(root),
            structs: Arc::new(structs),
            logger,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.root
    }

    /// Decode, check and run one function request.
    pub async fn execute(&self, request: pw::RunFunctionRequest) -> Result<StructValue, WorkerError> {
        let function = self
            .root
            .get_function(&request.function)
            .ok_or_else(|| WorkerError::FunctionNotFound(request.function.clone()))?;

        let inputs = match request.inputs.as_ref() {
            Some(inputs) => {
                StructValue::from_proto(inputs).map_err(|source| WorkerError::InvalidInput {
                    function: request.function.clone(),
                    source,
                })?
            }
            None => StructValue::default(),
        };
        function.check_inputs(&inputs, &self.structs)?;

        let callback = request
            .callback
            .as_ref()
            .map(CallbackAddress::from_proto)
            .transpose()?;

        debug!(self.logger, "Running function";
            "function" => &request.function,
            "has_callback" => callback.is_some()
        );

        let outputs = function
            .run(FunctionCall {
                function: request.function.clone(),
                inputs,
                callback,
            })
            .await?;
        function.check_outputs(&outputs, &self.structs)?;
        Ok(outputs)
    }
}

#[tonic::async_trait]
impl WorkerService for Worker {
    async fn run_function(
        &self,
        request: Request<pw::RunFunctionRequest>,
    ) -> Result<Response<pw::RunFunctionResponse>, Status> {
        let request = request.into_inner();
        let function = request.function.clone();

        match self.execute(request).await {
            Ok(outputs) => Ok(Response::new(pw::RunFunctionResponse {
                outputs: Some(outputs.to_proto()),
            })),
            Err(e) => {
                warn!(self.logger, "Function failed"; "function" => &function, "error" => %e);
                Err(e.into())
            }
        }
    }
}

#[tonic::async_trait]
impl Signature for Worker {
    async fn list_functions(
        &self,
        _request: Request<ps::ListFunctionsRequest>,
    ) -> Result<Response<ps::ListFunctionsResponse>, Status> {
        Ok(Response::new(self.root.signature()))
    }
}

/// Serve `worker` on `address` (e.g. "0.0.0.0:8090") until the server stops.
pub async fn start_worker_server(worker: Worker, address: &str) -> Result<(), WorkerError> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|_| WorkerError::InvalidAddress(address.to_string()))?;

    info!(worker.logger, "Starting worker server";
        "address" => %addr,
        "functions" => worker.root.functions().len()
    );

    Server::builder()
        .add_service(WorkerServer::new(worker.clone()))
        .add_service(SignatureServer::new(worker))
        .serve(addr)
        .await?;

    Ok(())
}

/// Serve `worker` on an already bound listener.
pub async fn serve_with_listener(worker: Worker, listener: TcpListener) -> Result<(), WorkerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(worker.logger, "Starting worker server"; "address" => %addr);
    }

    Server::builder()
        .add_service(WorkerServer::new(worker.clone()))
        .add_service(SignatureServer::new(worker))
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TierkreisType, TierkreisValue};
    use crate::worker::FunctionDeclaration;

    fn test_worker() -> Worker {
        let mut root = Namespace::new();
        root.sub("arith")
            .add_function(
                "negate",
                FunctionDeclaration::new()
                    .with_input("value", TierkreisType::Int)
                    .with_output("value", TierkreisType::Int),
                |call: FunctionCall| async move {
                    let value = call.inputs.get("value").cloned();
                    match value {
                        Some(TierkreisValue::Int(value)) => {
                            let mut outputs = StructValue::default();
                            outputs.insert("value", TierkreisValue::Int(-value));
                            Ok(outputs)
                        }
                        _ => Err(WorkerError::Failed("no value".to_string())),
                    }
                },
            )
            .unwrap();
        root.sub("arith")
            .add_function(
                "broken",
                FunctionDeclaration::new().with_output("value", TierkreisType::Int),
                |_call: FunctionCall| async move { Ok(StructValue::default()) },
            )
            .unwrap();
        Worker::new(root, slog::Logger::root(slog::Discard, slog::o!()))
    }

    fn request(function: &str, inputs: StructValue) -> pw::RunFunctionRequest {
        pw::RunFunctionRequest {
            function: function.to_string(),
            inputs: Some(inputs.to_proto()),
            callback: None,
        }
    }

    #[tokio::test]
    async fn test_execute_runs_the_function() {
        let mut inputs = StructValue::default();
        inputs.insert("value", TierkreisValue::Int(7));
        let outputs = test_worker().execute(request("arith/negate", inputs)).await.unwrap();
        assert_eq!(outputs.get("value"), Some(&TierkreisValue::Int(-7)));
    }

    #[tokio::test]
    async fn test_unknown_function_is_not_found() {
        let status = test_worker()
            .run_function(Request::new(request("arith/missing", StructValue::default())))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn test_nonconforming_inputs_are_rejected() {
        let mut inputs = StructValue::default();
        inputs.insert("value", TierkreisValue::Str("seven".to_string()));
        let err = test_worker()
            .execute(request("arith/negate", inputs))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_nonconforming_outputs_are_rejected() {
        let err = test_worker()
            .execute(request("arith/broken", StructValue::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::InvalidOutput { .. }));
    }

    #[tokio::test]
    async fn test_signature_service_lists_functions() {
        let response = test_worker()
            .list_functions(Request::new(ps::ListFunctionsRequest {}))
            .await
            .unwrap()
            .into_inner();
        let mut names: Vec<_> = response.functions.keys().cloned().collect();
        names.sort();
        assert_eq!(names, vec!["arith/broken".to_string(), "arith/negate".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_listen_address() {
        let err = start_worker_server(test_worker(), "not an address").await.unwrap_err();
        assert!(matches!(err, WorkerError::InvalidAddress(_)));
    }
}
