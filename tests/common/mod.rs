//! Common test utilities
//!
//! This module is shared across all integration tests

pub mod fixtures;
pub mod sink;

#[allow(unused_imports)]
pub use fixtures::{minimal_docx, minimal_pdf, minimal_xlsx, zip_bytes, TestEnvironment};
#[allow(unused_imports)]
pub use sink::{RecordingSink, SentDocument};
