use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::pipeline::job::Job;
use crate::pipeline::job_state::JobState;
use crate::shared::constants::PROMOTED_FILE_PREFIX;

#[derive(Error, Debug)]
pub enum PromoteError {
    #[error("job is {0:?}, only completed jobs can be promoted")]
    NotCompleted(JobState),
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Copies a completed job's output into `dest_dir` as
/// `output_video_<YYYYmmddHHMMSS>.<ext>`, stamped in local time.
pub fn promote_output(job: &Job, dest_dir: &Path) -> Result<PathBuf, PromoteError> {
    if job.state() != JobState::Completed {
        return Err(PromoteError::NotCompleted(job.state()));
    }
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let now = OffsetDateTime::now_utc().to_offset(offset);
    copy_stamped(job.output_path(), dest_dir, now)
}

fn copy_stamped(
    source: &Path,
    dest_dir: &Path,
    at: OffsetDateTime,
) -> Result<PathBuf, PromoteError> {
    let stamp = at.format(format_description!(
        "[year][month][day][hour][minute][second]"
    ))?;
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    let dest = dest_dir.join(format!("{PROMOTED_FILE_PREFIX}_{stamp}.{ext}"));

    fs::create_dir_all(dest_dir)
        .and_then(|()| fs::copy(source, &dest))
        .map_err(|e| PromoteError::Copy {
            from: source.to_path_buf(),
            to: dest.clone(),
            source: e,
        })?;
    log::info!("Promoted {} to {}", source.display(), dest.display());
    Ok(dest)
}
