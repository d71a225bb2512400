use std::sync::{Arc, OnceLock};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinHandle;

use crate::error::{Error, Result, SharedError};

pub type MemoFuture<T> = Shared<BoxFuture<'static, std::result::Result<T, SharedError>>>;

/// Single-assignment cell for an asynchronous operation: the first caller starts it, every caller
///  (concurrent or later) gets a handle to the same in-flight or completed result.
///
/// The operation runs as its own task, so it makes progress whether or not anybody is awaiting it.
pub struct Memo<T> {
    cell: OnceLock<MemoFuture<T>>,
}
impl <T: Clone + Send + Sync + 'static> Memo<T> {
    pub fn new() -> Memo<T> {
        Memo {
            cell: OnceLock::new(),
        }
    }

    /// `start` is called at most once per cell, and it must not block
    pub fn get_or_start(&self, start: impl FnOnce() -> JoinHandle<Result<T>>) -> MemoFuture<T> {
        self.cell.get_or_init(|| {
            let handle = start();
            async move {
                match handle.await {
                    Ok(result) => result.map_err(|e| match e {
                        Error::Shared(shared) => shared,
                        e => Arc::new(e),
                    }),
                    Err(join_error) => Err(Arc::new(Error::Task(join_error.to_string()))),
                }
            }
                .boxed()
                .shared()
        })
            .clone()
    }

    pub fn is_started(&self) -> bool {
        self.cell.get().is_some()
    }

    /// the result, if the operation has completed
    pub fn peek(&self) -> Option<std::result::Result<T, SharedError>> {
        self.cell.get()
            .and_then(|f| f.peek().cloned())
    }
}

impl <T: Clone + Send + Sync + 'static> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}
