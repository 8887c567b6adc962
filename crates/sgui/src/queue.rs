//! Serial job scheduling.
//!
//! All engine work (the initial render and every queued update) runs as
//! jobs on a single-threaded executor, strictly one at a time in
//! submission order. A job may suspend on host futures; the next job
//! still waits for it to finish. The embedding host pumps the executor
//! with [`JobQueue::run_until_stalled`].

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::StreamExt;
use futures::channel::{mpsc, oneshot};
use futures::executor::LocalPool;
use futures::executor::LocalSpawner;
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;

/// The result of a submitted job. Poll it, or check it synchronously
/// with [`Task::try_take`] between pump cycles.
pub struct Task<R> {
    receiver: oneshot::Receiver<R>,
}

impl<R> Task<R> {
    pub(crate) fn from_receiver(receiver: oneshot::Receiver<R>) -> Self {
        Self { receiver }
    }

    /// Takes the result if the job has finished, without blocking.
    pub fn try_take(&mut self) -> Option<R> {
        self.receiver.try_recv().ok().flatten()
    }

    /// Drops the handle; the job still runs.
    pub fn detach(self) {}
}

impl<R> Future for Task<R> {
    type Output = Option<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|r| r.ok())
    }
}

type Job = LocalBoxFuture<'static, ()>;

/// A width-1 FIFO queue over a local executor.
pub struct JobQueue {
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    jobs: mpsc::UnboundedSender<Job>,
    pending: Rc<Cell<usize>>,
    _not_send: PhantomData<Rc<()>>,
}

impl JobQueue {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let (jobs, mut receiver) = mpsc::unbounded::<Job>();
        let pending = Rc::new(Cell::new(0));

        let drained = pending.clone();
        pool.spawner()
            .spawn_local(async move {
                while let Some(job) = receiver.next().await {
                    job.await;
                    drained.set(drained.get() - 1);
                }
            })
            .expect("job driver spawn failed");

        let spawner = pool.spawner();
        Self {
            pool: RefCell::new(pool),
            spawner,
            jobs,
            pending,
            _not_send: PhantomData,
        }
    }

    /// Enqueues a job behind everything already submitted.
    pub fn submit<R>(&self, future: impl Future<Output = R> + 'static) -> Task<R>
    where
        R: 'static,
    {
        let (sender, receiver) = oneshot::channel();
        self.pending.set(self.pending.get() + 1);
        let _ = self.jobs.unbounded_send(Box::pin(async move {
            let result = future.await;
            let _ = sender.send(result);
        }));
        Task::from_receiver(receiver)
    }

    /// Runs a future on the executor without queueing it behind jobs.
    /// Used for work that must not hold the queue, like the cooperative
    /// delay before an update pass is enqueued.
    pub fn spawn<R>(&self, future: impl Future<Output = R> + 'static) -> Task<R>
    where
        R: 'static,
    {
        let (sender, receiver) = oneshot::channel();
        self.spawner
            .spawn_local(async move {
                let result = future.await;
                let _ = sender.send(result);
            })
            .expect("spawn failed");
        Task::from_receiver(receiver)
    }

    /// Runs queued jobs until all are finished or the front job is
    /// waiting on an external future.
    pub fn run_until_stalled(&self) {
        self.pool.borrow_mut().run_until_stalled();
    }

    /// Whether every submitted job has run to completion.
    pub fn is_idle(&self) -> bool {
        self.pending.get() == 0
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
