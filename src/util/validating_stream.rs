use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::{ready, Stream};
use pin_project_lite::pin_project;

use crate::error::{Error, Result};
use crate::util::checksum::ChecksumValidator;

pin_project! {
    /// This struct wraps a byte stream, allowing it to be consumed asynchronously without
    ///  materializing it but at the same time performing validation that requires knowledge of the
    ///  entire data (i.e. checksum checks).
    ///
    /// The actual contract is to append an error to the stream if the validation fails. Once an
    ///  error was returned, this stream stops polling from upstream and always returns an error.
    pub struct ValidatingStream<S> {
        #[pin]
        inner: S,
        label: String,
        validators: Vec<Box<dyn ChecksumValidator>>,
        is_failed: bool,
        is_done: bool,
    }
}
impl <S: Stream<Item = Result<Bytes>>> ValidatingStream<S> {
    /// label identifies the data in error messages
    pub fn new(inner: S, label: String, validators: Vec<Box<dyn ChecksumValidator>>) -> ValidatingStream<S> {
        ValidatingStream {
            inner,
            label,
            validators,
            is_failed: false,
            is_done: false,
        }
    }

    pub fn is_validating(&self) -> bool {
        !self.validators.is_empty()
    }
}

impl <S: Stream<Item = Result<Bytes>>> Stream for ValidatingStream<S> {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.is_failed {
            return Poll::Ready(Some(Err(Error::Task(format!("polling from failed stream for {}", this.label)))));
        }
        if *this.is_done {
            return Poll::Ready(None);
        }

        match ready!(this.inner.poll_next(cx)) {
            Some(Ok(data)) => {
                for validator in this.validators.iter_mut() {
                    validator.add_data(&data);
                }
                Poll::Ready(Some(Ok(data)))
            }
            None => {
                // upstream is fully drained -> finalize validation
                *this.is_done = true;
                for validator in this.validators.iter() {
                    if let Err((expected, actual)) = validator.do_validate() {
                        *this.is_failed = true;
                        return Poll::Ready(Some(Err(Error::ChecksumMismatch {
                            artifact: format!("{} ({})", this.label, validator.algorithm()),
                            expected,
                            actual,
                        })));
                    }
                }
                Poll::Ready(None)
            }
            Some(Err(e)) => {
                *this.is_failed = true;
                Poll::Ready(Some(Err(e)))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
