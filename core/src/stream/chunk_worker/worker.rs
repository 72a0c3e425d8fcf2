// # 📂 `src/stream/chunk_worker/worker.rs`

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::constants::pool_defaults::WORKER_QUEUE_CAP;
use crate::stream::chunk_worker::types::{ChunkTransform, WorkerFailure, WorkerReply, WorkerRequest};
use crate::types::StreamError;

/// Single worker loop. Exits when its request channel closes.
///
/// A panic inside `prepare` is reported as a failed init. A panic inside
/// `apply` turns the worker into a bouncer: that chunk and every chunk still
/// queued for it go back to the orchestrator untouched.
pub fn run_chunk_worker<T: ChunkTransform>(
    worker: usize,
    rx: Receiver<WorkerRequest<T>>,
    tx: Sender<WorkerReply>,
    cancelled: Arc<AtomicBool>,
) {
    let mut transform: Option<Arc<T>> = None;
    let mut broken: Option<String> = None;

    while let Ok(req) = rx.recv() {
        match req {
            WorkerRequest::Init { transform: t } => {
                let reply = match panic::catch_unwind(AssertUnwindSafe(|| t.prepare())) {
                    Ok(Ok(())) => {
                        transform = Some(t);
                        WorkerReply::Ready { worker }
                    }
                    Ok(Err(reason)) => WorkerReply::InitFailed { worker, reason },
                    Err(_) => WorkerReply::InitFailed { worker, reason: "panicked during setup".into() },
                };
                let failed = matches!(reply, WorkerReply::InitFailed { .. });
                if tx.send(reply).is_err() || failed {
                    return;
                }
            }
            WorkerRequest::Process { index, buffer } => {
                if cancelled.load(Ordering::Relaxed) {
                    return;
                }

                let reply = match (&transform, &broken) {
                    (_, Some(reason)) => WorkerReply::Bounced { worker, index, buffer, reason: reason.clone() },
                    (None, None) => WorkerReply::Bounced {
                        worker,
                        index,
                        buffer,
                        reason: "worker not initialised".into(),
                    },
                    (Some(t), None) => {
                        let backup = buffer.clone();
                        match panic::catch_unwind(AssertUnwindSafe(|| t.apply(index, buffer))) {
                            Ok(Ok(out)) => WorkerReply::Done { index, buffer: out },
                            Ok(Err(error)) => WorkerReply::Failed { index, error },
                            Err(_) => {
                                let reason = format!("panicked on chunk {index}");
                                broken = Some(reason.clone());
                                WorkerReply::Bounced { worker, index, buffer: backup, reason }
                            }
                        }
                    }
                };

                if tx.send(reply).is_err() {
                    return;
                }
            }
        }
    }
}

/// Events the orchestrator acts on.
#[derive(Debug)]
pub enum PoolEvent {
    Done { index: u32, buffer: Vec<u8> },
    /// Hand back to the caller for in-process processing.
    Returned { index: u32, buffer: Vec<u8> },
}

struct Member<T: ChunkTransform> {
    tx: Option<Sender<WorkerRequest<T>>>,
    handle: Option<JoinHandle<()>>,
}

/// Fixed set of named worker threads owned by exactly one pipeline.
pub struct WorkerPool<T: ChunkTransform> {
    members: Vec<Member<T>>,
    replies: Receiver<WorkerReply>,
    cancelled: Arc<AtomicBool>,
    cursor: usize,
}

impl<T: ChunkTransform> WorkerPool<T> {
    /// Spawn up to `workers` threads and initialise them with `transform`.
    /// Members that fail to spawn or initialise are dropped with a warning;
    /// `NoneAvailable` means the caller must run in-process.
    pub fn start(transform: Arc<T>, workers: usize) -> Result<Self, WorkerFailure> {
        let (reply_tx, replies) = unbounded::<WorkerReply>();
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut pool = Self { members: Vec::with_capacity(workers), replies, cancelled, cursor: 0 };

        for n in 0..workers {
            let (tx, rx) = bounded::<WorkerRequest<T>>(WORKER_QUEUE_CAP);
            let reply_tx = reply_tx.clone();
            let cancelled = pool.cancelled.clone();
            let spawned = thread::Builder::new()
                .name(format!("chunk-worker-{n}"))
                .spawn(move || run_chunk_worker(n, rx, reply_tx, cancelled));

            match spawned {
                Ok(handle) => pool.members.push(Member { tx: Some(tx), handle: Some(handle) }),
                Err(source) => {
                    warn!("{}", WorkerFailure::Spawn { worker: n, source });
                    break;
                }
            }
        }
        // Only workers hold reply senders, so a dead pool disconnects the channel.
        drop(reply_tx);

        let mut awaiting = 0;
        for member in &pool.members {
            if let Some(tx) = &member.tx {
                if tx.send(WorkerRequest::Init { transform: transform.clone() }).is_ok() {
                    awaiting += 1;
                }
            }
        }

        while awaiting > 0 {
            match pool.replies.recv() {
                Ok(WorkerReply::Ready { worker }) => {
                    debug!(worker, "chunk worker ready");
                    awaiting -= 1;
                }
                Ok(WorkerReply::InitFailed { worker, reason }) => {
                    warn!("{}", WorkerFailure::Init { worker, reason });
                    pool.retire(worker);
                    awaiting -= 1;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }

        if pool.alive() == 0 {
            return Err(WorkerFailure::NoneAvailable);
        }
        Ok(pool)
    }

    /// Members still accepting work.
    pub fn alive(&self) -> usize {
        self.members.iter().filter(|m| m.tx.is_some()).count()
    }

    /// Stop dispatching to `worker`. Its queue drains back as bounces.
    pub fn retire(&mut self, worker: usize) {
        if let Some(member) = self.members.get_mut(worker) {
            member.tx = None;
        }
    }

    /// Round-robin dispatch. If no member can take the chunk it is handed back.
    pub fn submit(&mut self, index: u32, buffer: Vec<u8>) -> Result<(), (u32, Vec<u8>)> {
        let mut request = WorkerRequest::Process { index, buffer };
        for _ in 0..self.members.len() {
            let n = self.cursor;
            self.cursor = (self.cursor + 1) % self.members.len();

            let Some(tx) = &self.members[n].tx else { continue };
            match tx.send(request) {
                Ok(()) => {
                    debug!(index, worker = n, "chunk dispatched");
                    return Ok(());
                }
                Err(err) => {
                    warn!(worker = n, "chunk worker gone, retiring");
                    self.members[n].tx = None;
                    request = err.into_inner();
                }
            }
        }
        match request {
            WorkerRequest::Process { index, buffer } => Err((index, buffer)),
            WorkerRequest::Init { .. } => Ok(()),
        }
    }

    /// Block for the next completion. Chunk errors are returned as-is.
    pub fn next_event(&mut self) -> Result<PoolEvent, StreamError> {
        loop {
            match self.replies.recv() {
                Ok(WorkerReply::Done { index, buffer }) => return Ok(PoolEvent::Done { index, buffer }),
                Ok(WorkerReply::Failed { index, error }) => {
                    debug!(index, "chunk failed: {error}");
                    return Err(error);
                }
                Ok(WorkerReply::Bounced { worker, index, buffer, reason }) => {
                    if self.members.get(worker).is_some_and(|m| m.tx.is_some()) {
                        warn!(worker, "chunk worker failed ({reason}); retiring");
                        self.retire(worker);
                    }
                    return Ok(PoolEvent::Returned { index, buffer });
                }
                Ok(WorkerReply::Ready { .. }) | Ok(WorkerReply::InitFailed { .. }) => continue,
                Err(_) => return Err(StreamError::Pipeline("all chunk workers disconnected".into())),
            }
        }
    }
}

impl<T: ChunkTransform> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        for member in &mut self.members {
            member.tx = None;
        }
        for member in &mut self.members {
            if let Some(handle) = member.handle.take() {
                let _ = handle.join();
            }
        }
    }
}
