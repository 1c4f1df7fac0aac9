//! In-process stand-in for a Tierkreis runtime.
//!
//! Behaviour is keyed on the submitted graph's name:
//! - `ill_typed`: rejected with two type errors
//! - `failing`: task finishes with an error status
//! - `pending`: task never reports a status
//! - anything else: `result` is twice the `angle` input

#![allow(dead_code)]

use slog::{Drain, Logger};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tierkreis_client::grpc::proto::graph as pg;
use tierkreis_client::grpc::proto::runtime as pr;
use tierkreis_client::grpc::proto::runtime::runtime_server::{Runtime, RuntimeServer};
use tierkreis_client::grpc::proto::signature as ps;
use tierkreis_client::grpc::proto::signature::signature_server::{Signature, SignatureServer};
use tierkreis_client::grpc::proto::signature::type_inference_server::{
    TypeInference, TypeInferenceServer,
};
use tierkreis_client::model::{
    GraphType, Row, StructValue, TierkreisGraph, TierkreisType, TierkreisTypeError,
    TierkreisTypeErrors, TierkreisValue, TypeErrorKind, TypeScheme,
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{transport::Server, Request, Response, Status};

pub fn create_logger() -> Logger {
    let decorator = slog_term::PlainDecorator::new(std::io::stdout());
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, slog::o!())
}

/// Graph with one float input `angle` and one output `result`
pub fn angle_graph(name: &str) -> TierkreisGraph {
    let mut graph = TierkreisGraph::new(name);
    let angle = graph.add_input("angle");
    let two = graph.add_const(TierkreisValue::Float(2.0));
    let mul = graph.add_func("builtin/fmul");
    graph.add_edge(angle, mul.port("a"));
    graph.add_edge(two.port("value"), mul.port("b"));
    graph.set_output("result", mul.port("value"));
    graph
}

pub fn sample_type_errors() -> TierkreisTypeErrors {
    TierkreisTypeErrors::new(vec![
        TierkreisTypeError {
            kind: TypeErrorKind::Unify {
                expected: TierkreisType::Float,
                found: TierkreisType::Str,
            },
            location: vec!["N2".to_string(), "a".to_string()],
        },
        TierkreisTypeError {
            kind: TypeErrorKind::UnknownFunction("builtin/fmul".to_string()),
            location: Vec::new(),
        },
    ])
}

#[derive(Default)]
struct MockState {
    run_task_calls: usize,
    credentials: Vec<Option<(String, String)>>,
    deleted: Vec<String>,
    tasks: BTreeMap<String, pr::TaskInfo>,
}

#[derive(Clone, Default)]
pub struct MockRuntime {
    state: Arc<Mutex<MockState>>,
}

impl MockRuntime {
    pub fn run_task_calls(&self) -> usize {
        self.state.lock().unwrap().run_task_calls
    }

    /// `(token, key)` metadata seen on each request, in arrival order
    pub fn credentials(&self) -> Vec<Option<(String, String)>> {
        self.state.lock().unwrap().credentials.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    fn record<T>(&self, request: &Request<T>) {
        let metadata = request.metadata();
        let read = |name: &str| {
            metadata
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let credentials = match (read("token"), read("key")) {
            (Some(token), Some(key)) => Some((token, key)),
            _ => None,
        };
        self.state.lock().unwrap().credentials.push(credentials);
    }

    fn finish(graph: &TierkreisGraph, inputs: &StructValue) -> Option<pr::task_info::Status> {
        match graph.name() {
            "pending" => None,
            "failing" => Some(pr::task_info::Status::Error(
                "boom: qubit decohered".to_string(),
            )),
            _ => {
                let angle = inputs
                    .get("angle")
                    .and_then(TierkreisValue::as_float)
                    .unwrap_or_default();
                let mut outputs = StructValue::default();
                outputs.insert("result", TierkreisValue::Float(angle * 2.0));
                Some(pr::task_info::Status::Success(outputs.to_proto()))
            }
        }
    }
}

#[tonic::async_trait]
impl Runtime for MockRuntime {
    async fn run_task(
        &self,
        request: Request<pr::RunTaskRequest>,
    ) -> Result<Response<pr::RunTaskResponse>, Status> {
        self.record(&request);
        let request = request.into_inner();
        self.state.lock().unwrap().run_task_calls += 1;

        let graph = request
            .graph
            .as_ref()
            .map(|graph| TierkreisGraph::from_proto(graph))
            .transpose()
            .map_err(|e| Status::invalid_argument(e.to_string()))?
            .ok_or_else(|| Status::invalid_argument("missing graph"))?;
        let inputs = request
            .inputs
            .as_ref()
            .map(StructValue::from_proto)
            .transpose()
            .map_err(|e| Status::invalid_argument(e.to_string()))?
            .unwrap_or_default();

        if graph.name() == "ill_typed" {
            return Ok(Response::new(pr::RunTaskResponse {
                result: Some(pr::run_task_response::Result::TypeErrors(
                    sample_type_errors().to_proto(),
                )),
            }));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let info = pr::TaskInfo {
            id: id.clone(),
            status: Self::finish(&graph, &inputs),
        };
        self.state.lock().unwrap().tasks.insert(id.clone(), info);

        Ok(Response::new(pr::RunTaskResponse {
            result: Some(pr::run_task_response::Result::TaskId(id)),
        }))
    }

    async fn list_tasks(
        &self,
        request: Request<pr::ListTasksRequest>,
    ) -> Result<Response<pr::ListTasksResponse>, Status> {
        self.record(&request);
        let tasks = self.state.lock().unwrap().tasks.values().cloned().collect();
        Ok(Response::new(pr::ListTasksResponse { tasks }))
    }

    async fn await_task(
        &self,
        request: Request<pr::AwaitTaskRequest>,
    ) -> Result<Response<pr::AwaitTaskResponse>, Status> {
        self.record(&request);
        let id = request.into_inner().id;
        let task = self
            .state
            .lock()
            .unwrap()
            .tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("no task {}", id)))?;
        Ok(Response::new(pr::AwaitTaskResponse { task: Some(task) }))
    }

    async fn delete_task(
        &self,
        request: Request<pr::DeleteTaskRequest>,
    ) -> Result<Response<pr::DeleteTaskResponse>, Status> {
        self.record(&request);
        let id = request.into_inner().id;
        let mut state = self.state.lock().unwrap();
        state.tasks.remove(&id);
        state.deleted.push(id);
        Ok(Response::new(pr::DeleteTaskResponse {}))
    }
}

#[tonic::async_trait]
impl Signature for MockRuntime {
    async fn list_functions(
        &self,
        request: Request<ps::ListFunctionsRequest>,
    ) -> Result<Response<ps::ListFunctionsResponse>, Status> {
        self.record(&request);

        let mut row = Row::new();
        row.insert("qubit".to_string(), TierkreisType::Int);
        let gate = ps::FunctionDeclaration {
            type_scheme: Some(
                TypeScheme::monomorphic(TierkreisType::Graph(GraphType {
                    inputs: row.clone(),
                    outputs: row,
                }))
                .to_proto(),
            ),
            description: "single qubit gate".to_string(),
            input_order: vec!["qubit".to_string()],
            output_order: vec!["qubit".to_string()],
        };

        let mut response = ps::ListFunctionsResponse::default();
        response.functions.insert("qubit/h".to_string(), gate.clone());
        response.functions.insert("qubit/x".to_string(), gate);
        response.aliases.insert(
            "qubit/QubitAlias".to_string(),
            TypeScheme::monomorphic(TierkreisType::Int).to_proto(),
        );
        Ok(Response::new(response))
    }
}

#[tonic::async_trait]
impl TypeInference for MockRuntime {
    async fn infer_type(
        &self,
        request: Request<ps::InferTypeRequest>,
    ) -> Result<Response<ps::InferTypeResponse>, Status> {
        self.record(&request);
        let value = request
            .into_inner()
            .value
            .ok_or_else(|| Status::invalid_argument("missing value"))?;
        let graph = match TierkreisValue::from_proto(&value) {
            Ok(TierkreisValue::Graph(graph)) => graph,
            _ => return Err(Status::invalid_argument("expected a graph")),
        };

        if graph.name() == "ill_typed" {
            return Ok(Response::new(ps::InferTypeResponse {
                response: Some(ps::infer_type_response::Response::Error(
                    sample_type_errors().to_proto(),
                )),
            }));
        }

        let mut annotated = graph.to_proto();
        for edge in annotated.edges.iter_mut() {
            edge.edge_type = Some(TierkreisType::Float.to_proto().into());
        }
        let value = pg::Value {
            value: Some(pg::value::Value::Graph(annotated.into())),
        };

        Ok(Response::new(ps::InferTypeResponse {
            response: Some(ps::infer_type_response::Response::Success(
                ps::InferTypeSuccess {
                    value: Some(value),
                    type_scheme: Some(
                        TypeScheme::monomorphic(TierkreisType::Graph(GraphType::default()))
                            .to_proto(),
                    ),
                },
            )),
        }))
    }
}

/// Serve a fresh mock runtime on an ephemeral local port.
pub async fn spawn_mock_runtime() -> (MockRuntime, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mock = MockRuntime::default();

    let service = mock.clone();
    tokio::spawn(async move {
        Server::builder()
            .add_service(RuntimeServer::new(service.clone()))
            .add_service(SignatureServer::new(service.clone()))
            .add_service(TypeInferenceServer::new(service))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    (mock, addr)
}
