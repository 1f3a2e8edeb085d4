use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{ConnectionQueue, ConnectionWorker};
use crate::dispatcher::RequestDispatcher;
use crate::router::RouteTable;

/// A fixed set of workers sharing one queue and one route table.
///
/// Workers are created up front by [`WorkerPool::new`] and only begin
/// pulling connections once [`WorkerPool::start`] spawns them onto the
/// current Tokio runtime.
#[derive(Debug)]
pub struct WorkerPool<S> {
    queue: Arc<ConnectionQueue<S>>,
    idle: Vec<ConnectionWorker<S>>,
    running: Vec<JoinHandle<()>>,
}

impl<S> WorkerPool<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Builds `size` workers bound to a fresh queue and to `table`.
    pub fn new(size: usize, table: Arc<RouteTable>, max_request_size: usize) -> Self {
        let queue = Arc::new(ConnectionQueue::new());
        let dispatcher = RequestDispatcher::new(table);
        let idle = (0..size)
            .map(|id| {
                ConnectionWorker::new(id, Arc::clone(&queue), dispatcher.clone(), max_request_size)
            })
            .collect();

        Self {
            queue,
            idle,
            running: Vec::with_capacity(size),
        }
    }

    /// The queue feeding every worker in this pool.
    pub fn queue(&self) -> &Arc<ConnectionQueue<S>> {
        &self.queue
    }

    pub fn size(&self) -> usize {
        self.idle.len() + self.running.len()
    }

    /// Spawns every worker that is not running yet.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        for worker in self.idle.drain(..) {
            debug!(worker = worker.id(), "spawning worker");
            self.running.push(tokio::spawn(worker.run()));
        }
        info!(workers = self.running.len(), "worker pool started");
    }

    /// Closes the queue and waits for every worker to finish.
    ///
    /// Connections already queued are still served before the workers exit.
    pub async fn shutdown(self) {
        self.queue.close();
        let pending = self.queue.depth();
        if pending > 0 {
            info!(pending, "draining queued connections");
        }

        for handle in self.running {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task failed");
            }
        }
        info!("worker pool stopped");
    }
}
