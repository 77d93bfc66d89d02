//! Runtime plumbing shared by the async cores and their blocking facades
//!
//! Inside a multi-threaded tokio runtime the caller's worker is handed off
//! with `block_in_place`; anywhere else a private current-thread runtime
//! drives the future.

use crate::{Error, Result};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::future::Future;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Block the calling thread until `future` completes
pub fn block_on<F>(future: F) -> Result<F::Output>
where
    F: Future,
{
    if let Ok(handle) = Handle::try_current() {
        return match handle.runtime_flavor() {
            RuntimeFlavor::MultiThread => {
                Ok(tokio::task::block_in_place(|| handle.block_on(future)))
            }
            _ => Err(Error::Runtime(
                "blocking calls need a multi-threaded runtime, use the async API instead"
                    .to_string(),
            )),
        };
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(rt.block_on(future))
}

/// Yield items until the first error, which is the last item.
///
/// The inner stream is dropped together with that error, cancelling
/// whatever it still had in flight.
pub(crate) fn until_first_error<T: Send + 'static>(
    inner: BoxStream<'static, Result<T>>,
) -> BoxStream<'static, Result<T>> {
    stream::unfold(Some(inner), |state| async move {
        let Some(mut inner) = state else {
            return None;
        };
        match inner.next().await {
            Some(Ok(item)) => Some((Ok(item), Some(inner))),
            Some(Err(e)) => Some((Err(e), None)),
            None => None,
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_without_runtime() {
        let value = block_on(async { 40 + 2 }).unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_block_on_inside_multi_thread_runtime() {
        let value = block_on(async { tokio::task::yield_now().await; 7 }).unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_until_first_error_stops_after_error() {
        let inner = stream::iter(vec![
            Ok(1),
            Err(Error::NoStatementSet),
            Ok(2),
        ])
        .boxed();

        let items: Vec<Result<i32>> = until_first_error(inner).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Ok(1)));
        assert!(matches!(items[1], Err(Error::NoStatementSet)));
    }

    #[tokio::test]
    async fn test_block_on_inside_current_thread_runtime_is_rejected() {
        assert!(matches!(block_on(async { 1 }), Err(Error::Runtime(_))));
    }
}
