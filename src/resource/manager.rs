use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{debug, info, warn};

use super::{
    handle::{LoadError, LoadState, ResourceHandle},
    path::ResourcePath,
};
use crate::utils::{Acquired, DataCache};

/// A type the resource manager can load.
pub trait Resource: Send + 'static {
    /// Short label used in logs.
    const KIND: &'static str;
}

/// Produces a resource from its path. Runs on the manager's loader thread.
pub trait ResourceLoader<T>: Send + Sync + 'static {
    fn load(&self, path: &ResourcePath) -> Result<T, LoadError>;
}

impl<T, F> ResourceLoader<T> for F
where
    F: Fn(&ResourcePath) -> Result<T, LoadError> + Send + Sync + 'static,
{
    fn load(&self, path: &ResourcePath) -> Result<T, LoadError> {
        self(path)
    }
}

/// The capability an editing session needs from a resource manager.
pub trait ResourceProvider<T> {
    /// Returns the shared handle for `path`, queuing a load on first reference.
    fn get(&mut self, path: &ResourcePath) -> ResourceHandle<T>;

    /// Drops one reference taken by [`ResourceProvider::get`].
    fn release(&mut self, path: &ResourcePath);

    /// Delivers finished loads on the calling thread. Returns how many
    /// handles settled.
    fn pump(&mut self) -> usize;
}

#[derive(Debug, Clone)]
pub struct ResourceManagerInfo {
    /// How long an unreferenced entry lingers before `unload_pulse` drops it.
    pub unload_delay: Duration,
}

impl Default for ResourceManagerInfo {
    fn default() -> Self {
        Self {
            unload_delay: Duration::from_secs(2),
        }
    }
}

struct LoadJob {
    path: ResourcePath,
    generation: u64,
}

struct LoadCompletion<T> {
    path: ResourcePath,
    generation: u64,
    result: Result<T, LoadError>,
}

////////////////////////////////////////////////
/// ResourceManager
/// * Reference-counted, path-keyed cache of resource handles.
///
/// * Loads run on a dedicated loader thread. Finished payloads are queued and
///   only applied to their handles by `pump`, so handles settle and observers
///   fire on the thread that owns the manager.
///
/// * Released entries unload on a timer (`unload_delay`) so a quick
///   release/get cycle keeps the loaded payload. An unreferenced entry whose
///   load failed is dropped on the next `get`, which loads it afresh.
///
/// * Every load carries the generation of the entry it was queued for;
///   completions for an entry that was since dropped are discarded.
////////////////////////////////////////////////
pub struct ResourceManager<T: Resource> {
    cache: DataCache<ResourceHandle<T>>,
    jobs: Option<Sender<LoadJob>>,
    completions: Receiver<LoadCompletion<T>>,
    in_flight: usize,
    unload_delay: Duration,
    worker: Option<JoinHandle<()>>,
}

impl<T: Resource> ResourceManager<T> {
    pub fn new(loader: impl ResourceLoader<T>, info: &ResourceManagerInfo) -> io::Result<Self> {
        let (job_tx, job_rx) = unbounded::<LoadJob>();
        let (done_tx, done_rx) = unbounded::<LoadCompletion<T>>();
        let loader = Arc::new(loader);

        let worker = thread::Builder::new()
            .name(format!("{}-loader", T::KIND))
            .spawn(move || run_loader(loader, job_rx, done_tx))?;

        Ok(Self {
            cache: DataCache::new(),
            jobs: Some(job_tx),
            completions: done_rx,
            in_flight: 0,
            unload_delay: info.unload_delay,
            worker: Some(worker),
        })
    }

    /// Loads queued on the worker, including ones whose entry was dropped.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Entries still waiting for their load.
    pub fn pending(&self) -> usize {
        self.cache.pending()
    }

    pub fn is_loaded(&self, path: &ResourcePath) -> bool {
        self.cache.contains(path)
    }

    pub fn refcount(&self, path: &ResourcePath) -> usize {
        self.cache.get(path).map(|entry| entry.refcount).unwrap_or(0)
    }

    /// Blocks until every queued load has been delivered or `timeout` passes.
    pub fn wait_for_pending(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut settled = self.pump();
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.completions.recv_timeout(remaining) {
                Ok(done) => {
                    if self.apply(done) {
                        settled += 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(resource = T::KIND, in_flight = self.in_flight, "timed out waiting for loads");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        settled
    }

    /// Drops entries whose unload deadline has passed.
    pub fn unload_pulse(&mut self) -> usize {
        let expired = self.cache.drain_expired(Instant::now());
        for (path, _) in &expired {
            info!(resource = T::KIND, path = %path, "unloaded");
        }
        expired.len()
    }

    fn apply(&mut self, done: LoadCompletion<T>) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Some(entry) = self.cache.complete(&done.path, done.generation) else {
            debug!(
                resource = T::KIND,
                path = %done.path,
                generation = done.generation,
                "discarding load for a dropped entry"
            );
            return false;
        };
        match &done.result {
            Ok(_) => info!(resource = T::KIND, path = %done.path, "loaded"),
            Err(err) => warn!(resource = T::KIND, path = %done.path, error = %err.reason, "load failed"),
        }
        let handle = entry.payload.clone();
        handle.settle(done.result);
        true
    }

    fn queue(&mut self, path: &ResourcePath, generation: u64) -> bool {
        let Some(jobs) = self.jobs.as_ref() else {
            return false;
        };
        let queued = jobs
            .send(LoadJob {
                path: path.clone(),
                generation,
            })
            .is_ok();
        if queued {
            self.in_flight += 1;
        }
        queued
    }
}

impl<T: Resource> ResourceProvider<T> for ResourceManager<T> {
    fn get(&mut self, path: &ResourcePath) -> ResourceHandle<T> {
        if self
            .cache
            .evict_unreferenced(path, |entry| entry.payload.state() == LoadState::Error)
            .is_some()
        {
            debug!(resource = T::KIND, path = %path, "dropped failed entry for a retry");
        }

        let (handle, generation) = match self
            .cache
            .acquire(path, || ResourceHandle::loading(path.clone()))
        {
            Acquired::Shared(entry) => return entry.payload.clone(),
            Acquired::Created(entry) => (entry.payload.clone(), entry.generation),
        };
        debug!(resource = T::KIND, path = %path, generation, "queued load");
        if !self.queue(path, generation) {
            self.cache.complete(path, generation);
            handle.settle(Err(LoadError::new(path.clone(), "loader thread is not running")));
        }
        handle
    }

    fn release(&mut self, path: &ResourcePath) {
        let deadline = Instant::now() + self.unload_delay;
        match self.cache.release(path, deadline) {
            Some(entry) if entry.refcount == 0 => {
                debug!(resource = T::KIND, path = %path, "scheduled for unload");
            }
            Some(_) => {}
            None => warn!(resource = T::KIND, path = %path, "release of an unknown resource"),
        }
    }

    fn pump(&mut self) -> usize {
        let mut settled = 0;
        while let Ok(done) = self.completions.try_recv() {
            if self.apply(done) {
                settled += 1;
            }
        }
        settled
    }
}

impl<T: Resource> Drop for ResourceManager<T> {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(resource = T::KIND, "loader thread panicked");
            }
        }
    }
}

fn run_loader<T, L>(loader: Arc<L>, jobs: Receiver<LoadJob>, done: Sender<LoadCompletion<T>>)
where
    L: ResourceLoader<T>,
{
    for job in jobs.iter() {
        let result = loader.load(&job.path);
        if done
            .send(LoadCompletion {
                path: job.path,
                generation: job.generation,
                result,
            })
            .is_err()
        {
            break;
        }
    }
}
