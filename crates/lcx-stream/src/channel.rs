use lcx_types::ChangeBatch;
use tokio::sync::{mpsc, oneshot};

use crate::error::StreamError;

/// How the producer side of a change stream finished.
#[derive(Debug)]
pub enum StreamEnd {
    /// The bounded range was fully delivered.
    Completed { last_ledger: u32 },
    /// Shutdown was requested, or the consumer went away.
    Shutdown,
    /// An unrecoverable fault in the source or in stream integrity.
    Failed(StreamError),
}

/// What a [`BatchStream`] yields.
#[derive(Debug)]
pub enum StreamMessage {
    Batch(ChangeBatch),
    End(StreamEnd),
}

/// Build a linked publisher/stream pair.
///
/// Batches travel over an unbounded queue; the terminal [`StreamEnd`]
/// travels separately and is sent exactly once.
pub fn batch_channel() -> (BatchPublisher, BatchStream) {
    let (batch_tx, batch_rx) = mpsc::unbounded_channel();
    let (end_tx, end_rx) = oneshot::channel();
    (
        BatchPublisher {
            batches: batch_tx,
            end: end_tx,
        },
        BatchStream {
            batches: batch_rx,
            end: Some(end_rx),
            finished: None,
        },
    )
}

/// The sole writer of a change stream.
///
/// Publishing moves the batch to the consumer. [`Self::finish`] consumes
/// the publisher, so nothing can be sent after the end is reported.
#[derive(Debug)]
pub struct BatchPublisher {
    batches: mpsc::UnboundedSender<ChangeBatch>,
    end: oneshot::Sender<StreamEnd>,
}

impl BatchPublisher {
    /// Hand a completed batch to the consumer. Gives the batch back if the
    /// consumer has gone away.
    pub fn publish(&self, batch: ChangeBatch) -> Result<(), ChangeBatch> {
        self.batches.send(batch).map_err(|e| e.0)
    }

    /// `true` once the consumer has dropped its stream.
    pub fn is_closed(&self) -> bool {
        self.batches.is_closed()
    }

    /// Report how the stream ended and close it.
    pub fn finish(self, end: StreamEnd) {
        let _ = self.end.send(end);
    }
}

/// The sole reader of a change stream.
#[derive(Debug)]
pub struct BatchStream {
    batches: mpsc::UnboundedReceiver<ChangeBatch>,
    end: Option<oneshot::Receiver<StreamEnd>>,
    finished: Option<StreamEnd>,
}

impl BatchStream {
    /// Wait for the next batch or for the end of the stream.
    ///
    /// Every batch published before the end was reported is yielded before
    /// [`StreamMessage::End`]. After the end has been yielded once, further
    /// calls report [`StreamError::Disconnected`]. Cancel-safe.
    pub async fn recv(&mut self) -> StreamMessage {
        if let Some(end_rx) = self.end.as_mut() {
            tokio::select! {
                biased;
                Some(batch) = self.batches.recv() => return StreamMessage::Batch(batch),
                end = end_rx => {
                    self.end = None;
                    self.finished = Some(end.unwrap_or(StreamEnd::Failed(StreamError::Disconnected)));
                }
            }
        }
        if let Ok(batch) = self.batches.try_recv() {
            return StreamMessage::Batch(batch);
        }
        StreamMessage::End(
            self.finished
                .take()
                .unwrap_or(StreamEnd::Failed(StreamError::Disconnected)),
        )
    }

    /// Stop accepting batches. The producer sees a closed channel on its
    /// next publish; already-queued batches are dropped.
    pub fn close(&mut self) {
        self.batches.close();
        while self.batches.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(start: u32, end: u32) -> ChangeBatch {
        ChangeBatch::new(start, end).unwrap()
    }

    #[tokio::test]
    async fn batches_arrive_before_end() {
        let (publisher, mut stream) = batch_channel();
        publisher.publish(batch(1, 10)).unwrap();
        publisher.publish(batch(11, 20)).unwrap();
        publisher.finish(StreamEnd::Completed { last_ledger: 20 });

        let mut starts = Vec::new();
        loop {
            match stream.recv().await {
                StreamMessage::Batch(b) => starts.push(b.start_ledger),
                StreamMessage::End(end) => {
                    assert!(matches!(end, StreamEnd::Completed { last_ledger: 20 }));
                    break;
                }
            }
        }
        assert_eq!(starts, vec![1, 11]);
    }

    #[tokio::test]
    async fn dropped_publisher_reports_disconnect() {
        let (publisher, mut stream) = batch_channel();
        drop(publisher);
        assert!(matches!(
            stream.recv().await,
            StreamMessage::End(StreamEnd::Failed(StreamError::Disconnected))
        ));
    }

    #[tokio::test]
    async fn end_is_reported_once() {
        let (publisher, mut stream) = batch_channel();
        publisher.finish(StreamEnd::Shutdown);
        assert!(matches!(stream.recv().await, StreamMessage::End(StreamEnd::Shutdown)));
        assert!(matches!(
            stream.recv().await,
            StreamMessage::End(StreamEnd::Failed(StreamError::Disconnected))
        ));
    }

    #[tokio::test]
    async fn closed_stream_rejects_publish() {
        let (publisher, mut stream) = batch_channel();
        stream.close();
        assert!(publisher.is_closed());
        let returned = publisher.publish(batch(1, 1)).unwrap_err();
        assert_eq!(returned.start_ledger, 1);
    }
}
