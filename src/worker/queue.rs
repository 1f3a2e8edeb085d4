//! The shared hand-off point between the accept loop and the workers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// One accepted connection waiting to be served.
///
/// Ownership moves from the acceptor into the queue and from there to
/// exactly one worker. Dropping the handle closes the connection.
#[derive(Debug)]
pub struct ConnectionHandle<S> {
    stream: S,
    peer: SocketAddr,
}

impl<S> ConnectionHandle<S> {
    pub fn new(stream: S, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn into_parts(self) -> (S, SocketAddr) {
        (self.stream, self.peer)
    }
}

/// Unbounded multi-producer, multi-consumer queue of connections.
///
/// There is no capacity limit and no backpressure: a burst of connections
/// simply waits here until a worker is free.
///
/// Closing the queue stops new additions; workers keep taking whatever is
/// already queued and receive `None` once it is empty.
#[derive(Debug)]
pub struct ConnectionQueue<S> {
    sender: Mutex<Option<UnboundedSender<ConnectionHandle<S>>>>,
    receiver: AsyncMutex<UnboundedReceiver<ConnectionHandle<S>>>,
    depth: AtomicUsize,
}

impl<S> Default for ConnectionQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ConnectionQueue<S> {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: AsyncMutex::new(receiver),
            depth: AtomicUsize::new(0),
        }
    }

    /// Enqueues a connection.
    ///
    /// # Errors
    ///
    /// Hands the connection back if the queue has been closed; the caller
    /// decides whether to drop it.
    pub fn add(&self, handle: ConnectionHandle<S>) -> Result<(), ConnectionHandle<S>> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            return Err(handle);
        };
        // Count before sending so a fast worker never observes a negative depth.
        self.depth.fetch_add(1, Ordering::Relaxed);
        sender.send(handle).map_err(|rejected| {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            rejected.0
        })
    }

    /// Waits for the next connection.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn take(&self) -> Option<ConnectionHandle<S>> {
        let handle = self.receiver.lock().await.recv().await?;
        self.depth.fetch_sub(1, Ordering::Relaxed);
        Some(handle)
    }

    /// Stops accepting new connections.
    pub fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Connections queued but not yet taken by a worker.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn handle(id: u16) -> ConnectionHandle<u16> {
        ConnectionHandle::new(id, SocketAddr::from(([127, 0, 0, 1], id)))
    }

    #[tokio::test]
    async fn connections_come_out_in_fifo_order() {
        let queue = ConnectionQueue::new();
        for id in 1..=3 {
            queue.add(handle(id)).unwrap();
        }
        assert_eq!(queue.depth(), 3);

        for id in 1..=3 {
            let (stream, peer) = queue.take().await.unwrap().into_parts();
            assert_eq!(stream, id);
            assert_eq!(peer.port(), id);
        }
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn closed_queue_drains_then_ends() {
        let queue = ConnectionQueue::new();
        queue.add(handle(1)).unwrap();
        queue.close();
        assert!(queue.is_closed());

        let rejected = queue.add(handle(2)).unwrap_err();
        assert_eq!(rejected.peer_addr().port(), 2);

        assert!(queue.take().await.is_some());
        assert!(queue.take().await.is_none());
    }

    #[tokio::test]
    async fn close_wakes_a_waiting_consumer() {
        let queue: Arc<ConnectionQueue<u16>> = Arc::new(ConnectionQueue::new());
        let waiter = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.take().await.is_none() }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();
        let ended = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("consumer should wake on close")
            .unwrap();
        assert!(ended);
    }

    #[tokio::test]
    async fn every_connection_reaches_exactly_one_consumer() {
        let queue: Arc<ConnectionQueue<u16>> = Arc::new(ConnectionQueue::new());
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    while let Some(handle) = queue.take().await {
                        seen.push(handle.into_parts().0);
                    }
                    seen
                })
            })
            .collect();

        for id in 0..200 {
            queue.add(handle(id)).unwrap();
        }
        queue.close();

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..200).collect::<Vec<_>>());
    }
}
