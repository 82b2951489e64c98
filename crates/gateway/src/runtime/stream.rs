//! Paced delivery of a finished answer, one character at a time.

use std::time::Duration;

use futures_core::Stream;

/// Yield each Unicode scalar of `answer` as its own chunk, sleeping `delay`
/// after every chunk.  The stream is finite; dropping it stops emission.
pub fn emit(answer: String, delay: Duration) -> impl Stream<Item = String> + Send + 'static {
    async_stream::stream! {
        for ch in answer.chars() {
            yield ch.to_string();
            tokio::time::sleep(delay).await;
        }
    }
}
