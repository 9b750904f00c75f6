//! Text stream consumer.

use futures_util::StreamExt;
use turnstile_core::{
    CompletionStatus, MessageBuffer, TextStream, TurnFailure, TurnPhase, TurnToken,
};

/// Drain `stream` into `buffer` for as long as `token` stays current.
///
/// Each non-empty fragment is appended to `buffer` and then handed to
/// `on_fragment` together with the updated buffer. The stream is dropped
/// (aborting the request) as soon as the turn is interrupted.
pub async fn consume<F>(
    mut stream: TextStream,
    token: &TurnToken,
    buffer: &mut MessageBuffer,
    mut on_fragment: F,
) -> CompletionStatus
where
    F: FnMut(&str, &MessageBuffer) + Send,
{
    let turn = token.id();

    if !token.is_current() {
        tracing::debug!(turn = %turn, "Text stream skipped for stale turn");
        return CompletionStatus::Interrupted;
    }

    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!(
                    turn = %turn,
                    fragments = buffer.fragments(),
                    "Text stream interrupted"
                );
                return CompletionStatus::Interrupted;
            }
            item = stream.next() => item,
        };

        // The read may have resolved in the same instant the turn was superseded.
        if !token.is_current() {
            tracing::debug!(turn = %turn, "Discarding text read for superseded turn");
            return CompletionStatus::Interrupted;
        }

        match next {
            Some(Ok(fragment)) => {
                if fragment.is_empty() {
                    continue;
                }
                buffer.push(&fragment);
                on_fragment(&fragment, buffer);
            }
            Some(Err(e)) => {
                tracing::warn!(turn = %turn, error = %e, "Text stream failed");
                return CompletionStatus::Failed(TurnFailure::transport(TurnPhase::Text, e));
            }
            None => {
                buffer.mark_complete();
                tracing::debug!(
                    turn = %turn,
                    fragments = buffer.fragments(),
                    chars = buffer.text().len(),
                    "Text stream complete"
                );
                return CompletionStatus::Completed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use futures_util::stream;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;
    use turnstile_core::{TransportError, TurnClock};

    use super::*;

    fn text_stream(items: Vec<Result<&'static str, TransportError>>) -> TextStream {
        stream::iter(items.into_iter().map(|r| r.map(str::to_string))).boxed()
    }

    /// Stream that stays open until the sender is dropped and records being dropped.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn live_stream() -> (
        mpsc::UnboundedSender<Result<String, TransportError>>,
        TextStream,
        Arc<AtomicBool>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(Arc::clone(&dropped));
        let stream = UnboundedReceiverStream::new(rx)
            .map(move |item| {
                let _keep = &flag;
                item
            })
            .boxed();
        (tx, stream, dropped)
    }

    #[tokio::test]
    async fn completes_with_all_fragments() {
        let mut clock = TurnClock::new();
        let token = clock.mint();
        let mut buffer = MessageBuffer::new(token.id());
        let mut seen = Vec::new();

        let status = consume(
            text_stream(vec![Ok("Take"), Ok(""), Ok(" ibuprofen.")]),
            &token,
            &mut buffer,
            |fragment, buf| seen.push((fragment.to_string(), buf.text().to_string())),
        )
        .await;

        assert_eq!(status, CompletionStatus::Completed);
        assert!(buffer.is_complete());
        assert_eq!(buffer.text(), "Take ibuprofen.");
        assert_eq!(
            seen,
            [
                ("Take".to_string(), "Take".to_string()),
                (" ibuprofen.".to_string(), "Take ibuprofen.".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn transport_error_fails_text_phase() {
        let mut clock = TurnClock::new();
        let token = clock.mint();
        let mut buffer = MessageBuffer::new(token.id());

        let status = consume(
            text_stream(vec![
                Ok("Hel"),
                Err(TransportError::Aborted("connection reset".into())),
            ]),
            &token,
            &mut buffer,
            |_, _| {},
        )
        .await;

        assert_eq!(
            status.failure().and_then(TurnFailure::phase),
            Some(TurnPhase::Text)
        );
        assert!(!buffer.is_complete());
        assert_eq!(buffer.text(), "Hel");
    }

    #[tokio::test]
    async fn interrupt_wakes_pending_read_and_drops_stream() {
        let mut clock = TurnClock::new();
        let token = clock.mint();
        let (tx, stream, dropped) = live_stream();

        tx.send(Ok("Hello".into())).unwrap();

        let consumer_token = token.clone();
        let task = tokio::spawn(async move {
            let mut buffer = MessageBuffer::new(consumer_token.id());
            let status = consume(stream, &consumer_token, &mut buffer, |_, _| {}).await;
            (status, buffer)
        });

        // Let the first fragment land, then interrupt while the read is pending.
        tokio::task::yield_now().await;
        clock.invalidate();

        let (status, buffer) = task.await.unwrap();
        assert_eq!(status, CompletionStatus::Interrupted);
        assert!(!buffer.is_complete());
        assert!(dropped.load(Ordering::SeqCst));

        // Late fragments have nowhere to go.
        assert!(tx.send(Ok(" there".into())).is_err());
    }

    #[tokio::test]
    async fn stale_token_reads_nothing() {
        let mut clock = TurnClock::new();
        let stale = clock.mint();
        let _current = clock.mint();
        let mut buffer = MessageBuffer::new(stale.id());

        let status = consume(
            text_stream(vec![Ok("never")]),
            &stale,
            &mut buffer,
            |_, _| panic!("stale turn must not publish"),
        )
        .await;

        assert_eq!(status, CompletionStatus::Interrupted);
        assert_eq!(buffer.fragments(), 0);
    }
}
