use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;

use crate::filtering::domain::filter_config::FilterConfig;
use crate::pipeline::job::Job;
use crate::pipeline::job_error::JobError;

/// Messages sent from a job's worker thread to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum JobMessage {
    /// Fraction of frames done, `0.0..=1.0`.
    Progress(f64),
    Completed(PathBuf),
    Canceled,
    Failed(String),
}

/// A job running on its own thread.
pub struct JobHandle {
    pub messages: Receiver<JobMessage>,
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<Job>,
}

impl JobHandle {
    /// Asks the job to stop after the frame in flight.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Waits for the worker and hands the finished job back, e.g. for
    /// promotion.
    pub fn join(self) -> thread::Result<Job> {
        self.thread.join()
    }
}

/// Runs `job` on a new thread. The last message is always one of
/// `Completed`, `Canceled` or `Failed`.
pub fn spawn_job(mut job: Job, config: FilterConfig) -> JobHandle {
    let (tx, rx) = crossbeam_channel::unbounded::<JobMessage>();
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_flag = Arc::clone(&cancel);

    let thread = thread::spawn(move || {
        let progress_tx = tx.clone();
        let result = job.run(
            &config,
            &mut |fraction| {
                let _ = progress_tx.send(JobMessage::Progress(fraction));
            },
            &|| cancel_flag.load(Ordering::Relaxed),
        );

        let last = match result {
            Ok(path) => JobMessage::Completed(path),
            Err(JobError::Canceled) => JobMessage::Canceled,
            Err(e) => JobMessage::Failed(e.to_string()),
        };
        // The receiver may be gone already; the job result still stands.
        let _ = tx.send(last);
        job
    });

    JobHandle {
        messages: rx,
        cancel,
        thread,
    }
}
