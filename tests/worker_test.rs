mod common;

use common::{angle_graph, create_logger, spawn_mock_runtime};
use std::net::SocketAddr;
use std::sync::Arc;
use tierkreis_client::client::signature_from_proto;
use tierkreis_client::grpc::proto::signature::signature_client::SignatureClient;
use tierkreis_client::grpc::proto::signature::ListFunctionsRequest;
use tierkreis_client::grpc::proto::worker as pw;
use tierkreis_client::grpc::proto::worker::worker_client::WorkerClient;
use tierkreis_client::grpc::{CredentialStore, MemoryCredentialStore, NoCredentials};
use tierkreis_client::model::{StructValue, TierkreisType, TierkreisValue};
use tierkreis_client::worker::serve_with_listener;
use tierkreis_client::{CallbackAddress, CallbackAuthenticator, FunctionDeclaration, Namespace, Worker};
use tokio::net::TcpListener;

/// Worker exposing `nested/double_remote`, which runs a graph on the
/// runtime that invoked it.
fn build_worker(credentials: Arc<dyn CredentialStore>) -> Worker {
    let authenticator = CallbackAuthenticator::new(credentials, create_logger());

    let mut root = Namespace::new();
    root.sub("nested")
        .add_handler(
            "double_remote",
            FunctionDeclaration::new()
                .with_input("angle", TierkreisType::Float)
                .with_output("result", TierkreisType::Float)
                .with_docs("double an angle on the calling runtime"),
            authenticator.wrap(|client, inputs| async move {
                let outputs = client.run_graph_values(&angle_graph("double"), inputs).await?;
                Ok(outputs)
            }),
        )
        .unwrap();

    Worker::new(root, create_logger())
}

async fn spawn_worker(worker: Worker) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        serve_with_listener(worker, listener).await.unwrap();
    });
    addr
}

fn angle_inputs(angle: TierkreisValue) -> StructValue {
    let mut inputs = StructValue::default();
    inputs.insert("angle", angle);
    inputs
}

#[tokio::test]
async fn test_function_calls_back_with_credentials() {
    let (mock, runtime_addr) = spawn_mock_runtime().await;
    let store = MemoryCredentialStore::with_credentials("abc", "xyz");
    let worker_addr = spawn_worker(build_worker(Arc::new(store))).await;

    let mut worker = WorkerClient::connect(format!("http://{}", worker_addr))
        .await
        .expect("Should connect to worker");
    let response = worker
        .run_function(pw::RunFunctionRequest {
            function: "nested/double_remote".to_string(),
            inputs: Some(angle_inputs(TierkreisValue::Float(1.5)).to_proto()),
            callback: Some(CallbackAddress::new("127.0.0.1", runtime_addr.port()).to_proto()),
        })
        .await
        .expect("Function should succeed")
        .into_inner();

    let outputs = StructValue::from_proto(&response.outputs.unwrap()).unwrap();
    assert_eq!(outputs.get("result"), Some(&TierkreisValue::Float(3.0)));

    // run_task and await_task, both authenticated
    let expected = Some(("abc".to_string(), "xyz".to_string()));
    assert_eq!(mock.credentials(), vec![expected.clone(), expected]);
}

#[tokio::test]
async fn test_function_calls_back_without_credentials() {
    let (mock, runtime_addr) = spawn_mock_runtime().await;
    let worker_addr = spawn_worker(build_worker(Arc::new(NoCredentials))).await;

    let mut worker = WorkerClient::connect(format!("http://{}", worker_addr))
        .await
        .unwrap();
    worker
        .run_function(pw::RunFunctionRequest {
            function: "nested/double_remote".to_string(),
            inputs: Some(angle_inputs(TierkreisValue::Float(0.25)).to_proto()),
            callback: Some(CallbackAddress::new("127.0.0.1", runtime_addr.port()).to_proto()),
        })
        .await
        .unwrap();

    assert_eq!(mock.credentials(), vec![None, None]);
}

#[tokio::test]
async fn test_missing_callback_fails_before_connecting() {
    let (mock, _runtime_addr) = spawn_mock_runtime().await;
    let worker_addr = spawn_worker(build_worker(Arc::new(NoCredentials))).await;

    let mut worker = WorkerClient::connect(format!("http://{}", worker_addr))
        .await
        .unwrap();
    let status = worker
        .run_function(pw::RunFunctionRequest {
            function: "nested/double_remote".to_string(),
            inputs: Some(angle_inputs(TierkreisValue::Float(1.5)).to_proto()),
            callback: None,
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), tonic::Code::FailedPrecondition);
    assert_eq!(mock.run_task_calls(), 0);
    assert!(mock.credentials().is_empty());
}

#[tokio::test]
async fn test_nonconforming_inputs_are_rejected() {
    let (mock, runtime_addr) = spawn_mock_runtime().await;
    let worker_addr = spawn_worker(build_worker(Arc::new(NoCredentials))).await;

    let mut worker = WorkerClient::connect(format!("http://{}", worker_addr))
        .await
        .unwrap();
    let status = worker
        .run_function(pw::RunFunctionRequest {
            function: "nested/double_remote".to_string(),
            inputs: Some(angle_inputs(TierkreisValue::Str("wide".to_string())).to_proto()),
            callback: Some(CallbackAddress::new("127.0.0.1", runtime_addr.port()).to_proto()),
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), tonic::Code::InvalidArgument);
    assert!(status.message().contains("nested/double_remote"));
    assert_eq!(mock.run_task_calls(), 0);
}

#[tokio::test]
async fn test_worker_signature_round_trip() {
    let worker_addr = spawn_worker(build_worker(Arc::new(NoCredentials))).await;

    let mut signature_client = SignatureClient::connect(format!("http://{}", worker_addr))
        .await
        .unwrap();
    let response = signature_client
        .list_functions(ListFunctionsRequest {})
        .await
        .unwrap()
        .into_inner();

    let signature = signature_from_proto(&response).unwrap();
    let nested = &signature["nested"];
    let function = &nested.functions["double_remote"];
    assert_eq!(function.name, "nested/double_remote");
    assert_eq!(function.docs, "double an angle on the calling runtime");
    assert_eq!(function.input_order, vec!["angle".to_string()]);
}
