//! Analysis passes: replay stored points through the detection pipeline and
//! persist the outcome.

pub mod runner;

pub use self::runner::{analyze_batch, analyze_recent, AnalysisReport};
