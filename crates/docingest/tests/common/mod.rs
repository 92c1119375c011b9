//! Shared test utilities for docingest integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution with temp directories
//! - `DocxBuilder` for assembling DOCX containers with embedded images
//! - `StubPartitioner` for scripting partitioner output and recording calls

pub mod builders;
pub mod harness;
pub mod stub;

pub use builders::*;
pub use harness::TestHarness;
pub use stub::StubPartitioner;
