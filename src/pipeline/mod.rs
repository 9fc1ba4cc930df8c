//! Offline analytics pipeline: raw transaction log in, two columnar
//! snapshots out. Single-threaded, run-once-then-cache; a failed run writes
//! nothing and is simply rerun.
//!
//! ```text
//!  raw CSV (ISO-8859-1)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → Vec<RawTransaction>
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  clean    │  drop invalid / non-product rows → Vec<CleanedTransaction>
//!   └──────────┘
//!        │
//!        ├────────────────────┐
//!        ▼                    ▼
//!   ┌──────────┐        ┌──────────┐
//!   │  facts    │        │   rfm     │  group by customer, quintile scores,
//!   └──────────┘        └──────────┘  segment labels
//!        │                    │
//!        ▼                    ▼
//!   ┌───────────────────────────────┐
//!   │           snapshot             │  sales_data.parquet / rfm_data.parquet
//!   └───────────────────────────────┘
//! ```

pub mod clean;
pub mod error;
pub mod facts;
pub mod loader;
pub mod model;
pub mod rfm;
pub mod snapshot;

use std::path::Path;

use log::info;

use error::PipelineError;
use model::PipelineOutput;

/// Run the full pipeline end-to-end and write both snapshots.
///
/// Nothing is written unless every stage succeeds; there are no partial
/// outputs and no retries.
pub fn run(input: &Path, out_dir: &Path) -> Result<PipelineOutput, PipelineError> {
    let loaded = loader::load_transactions(input)?;
    info!(
        "loaded {} raw transactions from {}",
        loaded.rows.len(),
        input.display()
    );

    let (cleaned, report) = clean::clean(loaded.rows);
    info!(
        "cleaning kept {} rows (removed {} non-product, {} cancelled, \
         {} without customer id, {} with non-positive amounts)",
        cleaned.len(),
        report.non_product,
        report.cancelled,
        report.missing_customer,
        report.non_positive
    );
    if cleaned.is_empty() {
        return Err(PipelineError::EmptyAfterCleaning);
    }

    let sales = facts::derive_sales_facts(&cleaned);
    let customers = rfm::compute_rfm(&cleaned)?;
    snapshot::write_snapshots(out_dir, &sales, &customers)?;

    Ok(PipelineOutput { sales, customers })
}
