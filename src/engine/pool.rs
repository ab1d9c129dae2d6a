use std::sync::{Arc, Condvar, Mutex, PoisonError};

use rayon::{ThreadPool, ThreadPoolBuilder};

/// A count shared between the pool and its worker threads, with a way to
/// block until it changes.
#[derive(Default)]
struct Counter {
    count: Mutex<usize>,
    changed: Condvar,
}

impl Counter {
    fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            changed: Condvar::new(),
        }
    }

    /// Takes one off the count, waiting while it is zero.
    fn acquire(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count == 0 {
            count = self
                .changed
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *count -= 1;
    }

    fn release(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count += 1;
        self.changed.notify_all();
    }

    fn wait_for(&self, target: usize) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count < target {
            count = self
                .changed
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    #[cfg(test)]
    fn get(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Hands the worker back to the idle count once its job is done, even if the
/// job unwinds.
struct Slot(Arc<Counter>);

impl Drop for Slot {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// A fixed set of worker threads running at most `size` jobs at a time.
///
/// [`WorkerPool::execute`] blocks only until a worker is idle, not until the
/// job finishes.
pub(crate) struct WorkerPool {
    pool: ThreadPool,
    idle: Arc<Counter>,
    exited: Arc<Counter>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let size = size.max(1);
        let exited = Arc::new(Counter::default());

        let on_exit = exited.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|index| format!("construct-worker-{index}"))
            .exit_handler(move |_| on_exit.release())
            .build()?;

        Ok(Self {
            pool,
            idle: Arc::new(Counter::new(size)),
            exited,
            size,
        })
    }

    /// Hands `job` to an idle worker, waiting for one if all are busy.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.idle.acquire();
        let slot = Slot(self.idle.clone());
        self.pool.spawn(move || {
            let _slot = slot;
            job();
        });
    }

    /// Waits for every job in flight, then stops the workers and waits until
    /// each of them has left its loop.
    ///
    /// Dropping a rayon pool only signals its threads, so the exit handler
    /// counts them out.
    pub fn drain_and_shutdown(self) {
        self.idle.wait_for(self.size);
        drop(self.pool);
        self.exited.wait_for(self.size);
    }
}
