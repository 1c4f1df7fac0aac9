//! Task lifecycle and type checking against a remote Tierkreis runtime.

use super::signature::{signature_from_proto, RuntimeSignature};
use super::sync_bridge::block_on_isolated;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result, RuntimeHttpError};
use crate::grpc::proto::runtime as pr;
use crate::grpc::proto::runtime::runtime_client::RuntimeClient as RuntimeStub;
use crate::grpc::proto::signature as ps;
use crate::grpc::proto::signature::signature_client::SignatureClient as SignatureStub;
use crate::grpc::proto::signature::type_inference_client::TypeInferenceClient as TypeInferenceStub;
use crate::grpc::{
    channel_builder_with_timeout, connect_channel, default_channel_builder, AuthChannel,
    ChannelBuilder, CredentialInterceptor,
};
use crate::model::{StructValue, TierkreisGraph, TierkreisTypeErrors, TierkreisValue};
use serde::Serialize;
use slog::{debug, info, warn, Logger};
use std::collections::BTreeMap;
use std::fmt;
use tonic::transport::Channel;

pub const LIST_FUNCTIONS_ENDPOINT: &str = "/tierkreis.signature.Signature/ListFunctions";
pub const INFER_TYPE_ENDPOINT: &str = "/tierkreis.signature.TypeInference/InferType";
pub const RUN_TASK_ENDPOINT: &str = "/tierkreis.runtime.Runtime/RunTask";
pub const LIST_TASKS_ENDPOINT: &str = "/tierkreis.runtime.Runtime/ListTasks";
pub const AWAIT_TASK_ENDPOINT: &str = "/tierkreis.runtime.Runtime/AwaitTask";
pub const DELETE_TASK_ENDPOINT: &str = "/tierkreis.runtime.Runtime/DeleteTask";

/// Identifier of one task on the runtime.
///
/// Only meaningful to the runtime instance that issued it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskHandle {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Status of a task as last reported by the runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Success,
    /// Failed, with the runtime's message
    Error(String),
}

impl TaskStatus {
    /// A task with no reported status is still running.
    pub fn from_proto(status: Option<&pr::task_info::Status>) -> Self {
        match status {
            None => Self::Running,
            Some(pr::task_info::Status::Success(_)) => Self::Success,
            Some(pr::task_info::Status::Error(message)) => Self::Error(message.clone()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Convert named native inputs, stopping at the first one without a typed form.
pub fn convert_inputs<I, K, V>(inputs: I) -> Result<StructValue>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Serialize,
{
    inputs
        .into_iter()
        .map(|(name, value)| {
            let name = name.into();
            match TierkreisValue::from_native(&value) {
                Ok(value) => Ok((name, value)),
                Err(source) => Err(ClientError::InputConversion {
                    input_name: name,
                    source,
                }),
            }
        })
        .collect()
}

/// Client for one Tierkreis runtime.
///
/// All three service stubs share a single channel and are built when the
/// client is created. Cloning is cheap and every method takes `&self`.
#[derive(Clone)]
pub struct RuntimeClient {
    address: String,
    channel_builder: ChannelBuilder,
    interceptor: CredentialInterceptor,
    signature: SignatureStub<AuthChannel>,
    runtime: RuntimeStub<AuthChannel>,
    type_inference: TypeInferenceStub<AuthChannel>,
    logger: Logger,
}

impl RuntimeClient {
    /// Connect to the runtime described by `config`, without credentials.
    pub async fn connect(config: &ClientConfig, logger: Logger) -> Result<Self> {
        let builder = match config.connect_timeout {
            Some(timeout) => channel_builder_with_timeout(timeout),
            None => default_channel_builder(),
        };
        Self::connect_with(
            config.socket_address(),
            builder,
            CredentialInterceptor::none(),
            logger,
        )
        .await
    }

    /// Connect to `address` (`host:port`) through `builder`, stamping every
    /// request with `interceptor`.
    pub async fn connect_with(
        address: impl Into<String>,
        builder: ChannelBuilder,
        interceptor: CredentialInterceptor,
        logger: Logger,
    ) -> Result<Self> {
        let address = address.into();
        info!(logger, "Connecting to Tierkreis runtime";
            "address" => &address,
            "authenticated" => interceptor.is_active()
        );

        let channel = connect_channel(&builder, &address).await?;
        Ok(Self::from_parts(address, channel, builder, interceptor, logger))
    }

    /// Wrap an already open channel.
    ///
    /// `builder` should be the one that opened `channel`;
    /// [`run_graph_block`](Self::run_graph_block) reconnects through it.
    pub fn from_channel(
        address: impl Into<String>,
        channel: Channel,
        builder: ChannelBuilder,
        interceptor: CredentialInterceptor,
        logger: Logger,
    ) -> Self {
        Self::from_parts(address.into(), channel, builder, interceptor, logger)
    }

    fn from_parts(
        address: String,
        channel: Channel,
        channel_builder: ChannelBuilder,
        interceptor: CredentialInterceptor,
        logger: Logger,
    ) -> Self {
        Self {
            signature: SignatureStub::with_interceptor(channel.clone(), interceptor.clone()),
            runtime: RuntimeStub::with_interceptor(channel.clone(), interceptor.clone()),
            type_inference: TypeInferenceStub::with_interceptor(channel, interceptor.clone()),
            address,
            channel_builder,
            interceptor,
            logger,
        }
    }

    /// `host:port` of the runtime
    pub fn socket_address(&self) -> &str {
        &self.address
    }

    /// Fetch the runtime's functions and aliases, grouped by namespace.
    pub async fn get_signature(&self) -> Result<RuntimeSignature> {
        let mut stub = self.signature.clone();
        let response = stub
            .list_functions(ps::ListFunctionsRequest {})
            .await
            .map_err(|status| RuntimeHttpError::from_status(LIST_FUNCTIONS_ENDPOINT, &status))?
            .into_inner();

        debug!(self.logger, "Fetched runtime signature";
            "functions" => response.functions.len(),
            "aliases" => response.aliases.len()
        );
        signature_from_proto(&response)
    }

    /// Submit `graph` for execution.
    ///
    /// Every input is converted before anything is sent; the first input
    /// without a typed form fails the call with
    /// [`ClientError::InputConversion`].
    pub async fn start_task<I, K, V>(&self, graph: &TierkreisGraph, inputs: I) -> Result<TaskHandle>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        let inputs = convert_inputs(inputs)?;
        self.start_task_values(graph, inputs).await
    }

    /// Submit `graph` with inputs that are already typed values.
    pub async fn start_task_values(
        &self,
        graph: &TierkreisGraph,
        inputs: StructValue,
    ) -> Result<TaskHandle> {
        use pr::run_task_response::Result as RunTaskResult;

        let request = pr::RunTaskRequest {
            graph: Some(graph.to_proto().into()),
            inputs: Some(inputs.to_proto()),
        };

        let mut stub = self.runtime.clone();
        let response = stub
            .run_task(request)
            .await
            .map_err(|status| RuntimeHttpError::from_status(RUN_TASK_ENDPOINT, &status))?
            .into_inner();

        match response.result {
            Some(RunTaskResult::TaskId(id)) => {
                info!(self.logger, "Started task"; "task_id" => &id, "graph" => graph.name());
                Ok(TaskHandle(id))
            }
            Some(RunTaskResult::TypeErrors(errors)) => {
                let errors = TierkreisTypeErrors::from_proto(&errors)?;
                warn!(self.logger, "Runtime rejected graph";
                    "graph" => graph.name(),
                    "type_errors" => errors.len()
                );
                Err(ClientError::TypeErrors(errors))
            }
            None => Err(ClientError::MissingField {
                message: "RunTaskResponse",
                field: "result",
            }),
        }
    }

    /// Every task the runtime knows about, with its current status.
    pub async fn list_tasks(&self) -> Result<BTreeMap<TaskHandle, TaskStatus>> {
        let mut stub = self.runtime.clone();
        let response = stub
            .list_tasks(pr::ListTasksRequest {})
            .await
            .map_err(|status| RuntimeHttpError::from_status(LIST_TASKS_ENDPOINT, &status))?
            .into_inner();

        Ok(response
            .tasks
            .into_iter()
            .map(|task| {
                let status = TaskStatus::from_proto(task.status.as_ref());
                (TaskHandle(task.id), status)
            })
            .collect())
    }

    /// Wait for a task to finish and return its outputs.
    ///
    /// There is no client-side timeout. Any status other than success fails
    /// with [`ClientError::TaskFailed`] carrying the runtime's message.
    pub async fn await_task(&self, handle: &TaskHandle) -> Result<StructValue> {
        use pr::task_info::Status;

        debug!(self.logger, "Awaiting task"; "task_id" => handle.as_str());

        let mut stub = self.runtime.clone();
        let response = stub
            .await_task(pr::AwaitTaskRequest {
                id: handle.as_str().to_string(),
            })
            .await
            .map_err(|status| RuntimeHttpError::from_status(AWAIT_TASK_ENDPOINT, &status))?
            .into_inner();

        let task = response.task.ok_or(ClientError::MissingField {
            message: "AwaitTaskResponse",
            field: "task",
        })?;

        match task.status {
            Some(Status::Success(outputs)) => {
                let outputs = StructValue::from_proto(&outputs)?;
                info!(self.logger, "Task finished";
                    "task_id" => handle.as_str(),
                    "outputs" => outputs.len()
                );
                Ok(outputs)
            }
            Some(Status::Error(message)) => {
                warn!(self.logger, "Task failed"; "task_id" => handle.as_str(), "error" => &message);
                Err(ClientError::TaskFailed { status: message })
            }
            None => Err(ClientError::TaskFailed {
                status: "task reported no completion status".to_string(),
            }),
        }
    }

    /// Ask the runtime to stop and forget a task. Does not wait for it to stop.
    pub async fn delete_task(&self, handle: &TaskHandle) -> Result<()> {
        let mut stub = self.runtime.clone();
        stub.delete_task(pr::DeleteTaskRequest {
            id: handle.as_str().to_string(),
        })
        .await
        .map_err(|status| RuntimeHttpError::from_status(DELETE_TASK_ENDPOINT, &status))?;

        info!(self.logger, "Deleted task"; "task_id" => handle.as_str());
        Ok(())
    }

    /// Start a task and wait for its outputs.
    pub async fn run_graph<I, K, V>(&self, graph: &TierkreisGraph, inputs: I) -> Result<StructValue>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        let inputs = convert_inputs(inputs)?;
        self.run_graph_values(graph, inputs).await
    }

    pub async fn run_graph_values(
        &self,
        graph: &TierkreisGraph,
        inputs: StructValue,
    ) -> Result<StructValue> {
        let handle = self.start_task_values(graph, inputs).await?;
        self.await_task(&handle).await
    }

    /// Blocking [`run_graph`](Self::run_graph) for synchronous callers.
    ///
    /// Runs on an isolated thread and runtime, so it may be called from code
    /// that is itself inside a tokio runtime.
    pub fn run_graph_block<I, K, V>(&self, graph: &TierkreisGraph, inputs: I) -> Result<StructValue>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        let inputs = convert_inputs(inputs)?;
        let graph = graph.clone();
        let address = self.address.clone();
        let builder = self.channel_builder.clone();
        let interceptor = self.interceptor.clone();
        let logger = self.logger.clone();

        // A channel is driven by the runtime that opened it, so the isolated
        // runtime opens its own.
        block_on_isolated(move || async move {
            let client = Self::connect_with(address, builder, interceptor, logger).await?;
            client.run_graph_values(&graph, inputs).await
        })?
    }

    /// Type check `graph` on the runtime, returning it with inferred edge types.
    ///
    /// A rejected graph fails with [`ClientError::TypeErrors`] holding every error.
    pub async fn type_check_graph(&self, graph: &TierkreisGraph) -> Result<TierkreisGraph> {
        use ps::infer_type_response::Response;

        let request = ps::InferTypeRequest {
            value: Some(TierkreisValue::from(graph.clone()).to_proto()),
        };

        let mut stub = self.type_inference.clone();
        let response = stub
            .infer_type(request)
            .await
            .map_err(|status| RuntimeHttpError::from_status(INFER_TYPE_ENDPOINT, &status))?
            .into_inner();

        match response.response {
            Some(Response::Success(success)) => {
                let value = success.value.as_ref().ok_or(ClientError::MissingField {
                    message: "InferTypeSuccess",
                    field: "value",
                })?;
                match TierkreisValue::from_proto(value)? {
                    TierkreisValue::Graph(annotated) => {
                        debug!(self.logger, "Graph type checked"; "graph" => annotated.name());
                        Ok(annotated)
                    }
                    other => Err(ClientError::UnexpectedValue {
                        expected: "graph",
                        found: other.kind_name(),
                    }),
                }
            }
            Some(Response::Error(errors)) => {
                Err(ClientError::TypeErrors(TierkreisTypeErrors::from_proto(&errors)?))
            }
            None => Err(ClientError::MissingField {
                message: "InferTypeResponse",
                field: "response",
            }),
        }
    }
}

impl fmt::Debug for RuntimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeClient")
            .field("address", &self.address)
            .field("interceptor", &self.interceptor)
            .finish()
    }
}
