//! Retail transaction analytics: cleaning, sales facts and RFM customer
//! segmentation.
//!
//! The crate is a batch pipeline: it reads a delimited retail transaction
//! log, removes invalid and administrative rows, derives a sales-facts
//! table and an RFM (Recency/Frequency/Monetary) segmentation table, and
//! persists both as Parquet snapshots for a downstream dashboard.

pub mod pipeline;

pub use pipeline::error::PipelineError;
pub use pipeline::model::PipelineOutput;
pub use pipeline::run;
