//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `JobStatus`: lifecycle of a crawl job (pending, processing, completed, failed, cancelled)
//! - `PageStatus`: outcome of a single visited URL (discovered, analyzed, failed)

mod job_status;
mod page_status;

pub use job_status::JobStatus;
pub use page_status::PageStatus;
