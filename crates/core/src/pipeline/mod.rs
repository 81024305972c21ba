pub mod job;
pub mod job_error;
pub mod job_state;
pub mod job_worker;
pub mod output_promoter;
pub mod pipeline_logger;
