use std::path::PathBuf;

use thiserror::Error;

use crate::video::domain::video_reader::VideoError;

/// Why a [`Job`](crate::pipeline::job::Job) did not complete.
///
/// Open and create failures happen before any output exists. Frame
/// failures and cancellation discard the partial output.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("cannot open source {path}: {source}")]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: VideoError,
    },
    #[error("cannot create output {path}: {source}")]
    OutputCreate {
        path: PathBuf,
        #[source]
        source: VideoError,
    },
    #[error("failed to read frame {index}: {source}")]
    FrameRead {
        index: usize,
        #[source]
        source: VideoError,
    },
    #[error("failed to write frame {index}: {source}")]
    FrameWrite {
        index: usize,
        #[source]
        source: VideoError,
    },
    #[error("job canceled")]
    Canceled,
    #[error("job has already run")]
    AlreadyRun,
}
