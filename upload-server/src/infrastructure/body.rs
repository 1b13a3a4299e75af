use std::io;

use actix_web::web::Payload;
use bytes::Bytes;
use domain_storage::model::vo::BodyStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Moves a request body from the connection to a detached upload task.
///
/// Dropping the forwarder before the body is fully read cancels the upload, so a client that
/// disconnects mid-body never ends up with a completed object.
pub struct BodyForwarder {
    cancel: CancellationToken,
    finished: bool,
    sender: mpsc::Sender<io::Result<Bytes>>,
}

impl BodyForwarder {
    pub fn channel(capacity: usize, cancel: CancellationToken) -> (Self, BodyStream) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let forwarder = Self {
            cancel,
            finished: false,
            sender,
        };
        (forwarder, ReceiverStream::new(receiver).boxed())
    }

    /// Pump `payload` into the channel until it ends, fails or the receiver is gone.
    ///
    /// The channel closes once this returns, which ends the body stream.
    pub async fn forward(mut self, mut payload: Payload) {
        loop {
            let item = tokio::select! {
                biased;
                _ = self.sender.closed() => break,
                item = payload.next() => item,
            };
            let Some(item) = item else {
                break;
            };
            let failed = item.is_err();
            let item = item.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()));
            if self.sender.send(item).await.is_err() || failed {
                break;
            }
        }
        self.finished = true;
    }
}

impl Drop for BodyForwarder {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel.cancel();
        }
    }
}
