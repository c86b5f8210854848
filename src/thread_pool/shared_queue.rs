use crossbeam::channel::{unbounded, Receiver, Sender};
use std::thread;

use crate::thread_pool::ThreadPool;
use crate::Result;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of workers pulling jobs off one shared channel. The accept
/// loop stays responsive while slow connections queue up behind the
/// workers.
pub struct SharedQueueThreadPool {
    tx: Sender<Job>,
}

impl ThreadPool for SharedQueueThreadPool {
    fn new(threads: u32) -> Result<Self> {
        let (tx, rx) = unbounded::<Job>();
        for i in 0..threads.max(1) {
            let rx: Receiver<Job> = rx.clone();
            thread::Builder::new()
                .name(format!("pool-worker-{}", i))
                .spawn(move || {
                    // exits when the pool (the only sender) is dropped
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                })?;
        }
        Ok(SharedQueueThreadPool { tx })
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx
            .send(Box::new(job))
            .expect("thread pool has shut down");
    }
}
