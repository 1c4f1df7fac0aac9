//! Blocking entry points for async client calls.
//!
//! Each bridged call gets its own thread hosting a fresh current-thread
//! runtime, so it is safe to call from synchronous code that is itself
//! running inside a tokio runtime.

use crate::error::BridgeError;
use std::any::Any;
use std::future::Future;

/// Run the future produced by `f` to completion on an isolated runtime,
/// blocking the calling thread until it finishes.
///
/// The future is built on the new thread, so it need not be `Send`.
pub fn block_on_isolated<F, Fut, T>(f: F) -> Result<T, BridgeError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = T>,
    T: Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name("tierkreis-sync-bridge".to_string())
        .spawn(move || -> Result<T, BridgeError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(BridgeError::Runtime)?;
            Ok(runtime.block_on(f()))
        })
        .map_err(BridgeError::Spawn)?;

    match handle.join() {
        Ok(result) => result,
        Err(payload) => Err(BridgeError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Turn an async function into a blocking one.
///
/// Every call of the returned closure runs on its own isolated runtime.
pub fn async_to_sync<A, F, Fut, T>(f: F) -> impl Fn(A) -> Result<T, BridgeError>
where
    A: Send + 'static,
    F: Fn(A) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = T>,
    T: Send + 'static,
{
    move |arg: A| {
        let f = f.clone();
        block_on_isolated(move || f(arg))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_returns_value_from_isolated_runtime() {
        let value = block_on_isolated(|| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            21 * 2
        })
        .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_runs_on_a_separate_thread() {
        let caller = std::thread::current().id();
        let inner = block_on_isolated(|| async { std::thread::current().id() }).unwrap();
        assert_ne!(caller, inner);
    }

    #[test]
    fn test_errors_propagate_unchanged() {
        let result: Result<Result<(), String>, _> =
            block_on_isolated(|| async { Err("boom".to_string()) });
        assert_eq!(result.unwrap(), Err("boom".to_string()));
    }

    #[test]
    fn test_panic_is_reported() {
        let result = block_on_isolated(|| async {
            if true {
                panic!("exploded");
            }
        });
        match result {
            Err(BridgeError::Panicked(message)) => assert_eq!(message, "exploded"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_callable_from_inside_a_runtime() {
        let value = block_on_isolated(|| async { "nested" }).unwrap();
        assert_eq!(value, "nested");
    }

    #[test]
    fn test_async_to_sync() {
        let double = async_to_sync(|x: u32| async move { x * 2 });
        assert_eq!(double(4).unwrap(), 8);
        assert_eq!(double(5).unwrap(), 10);
    }
}
