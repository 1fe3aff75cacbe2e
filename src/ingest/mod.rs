//! Upload ingestion: archive expansion and the per-file batch pipeline

pub mod archive;
pub mod pipeline;

pub use archive::{expand, is_archive, ArchiveError, ExpandedArchive};
pub use pipeline::{clean_stale_staging, process_upload, BatchProgress, BatchReport, FailedFile, FailureStage};
