use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Date32Array, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use super::error::PipelineError;
use super::model::{CustomerRfm, SalesFact, Segment, YearMonth};

pub const SALES_SNAPSHOT: &str = "sales_data.parquet";
pub const RFM_SNAPSHOT: &str = "rfm_data.parquet";

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Persist both derived tables under `out_dir`, creating the directory if
/// needed. Rerunning overwrites the previous snapshots in place.
pub fn write_snapshots(
    out_dir: &Path,
    sales: &[SalesFact],
    customers: &[CustomerRfm],
) -> Result<(), PipelineError> {
    std::fs::create_dir_all(out_dir).map_err(|source| PipelineError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;
    write_batch(&out_dir.join(SALES_SNAPSHOT), sales_batch(sales)?)?;
    write_batch(&out_dir.join(RFM_SNAPSHOT), rfm_batch(customers)?)?;
    info!(
        "wrote {} sales facts and {} customer rows to {}",
        sales.len(),
        customers.len(),
        out_dir.display()
    );
    Ok(())
}

fn write_batch(path: &Path, batch: RecordBatch) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Sales-facts schema. `InvoiceYearMonth` is a real `Date32` (first of the
/// month) so the consumer can range-filter it, never free text.
fn sales_batch(sales: &[SalesFact]) -> Result<RecordBatch, PipelineError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("Country", DataType::Utf8, false),
        Field::new("Customer ID", DataType::Utf8, false),
        Field::new("InvoiceYearMonth", DataType::Date32, false),
        Field::new("Description", DataType::Utf8, false),
        Field::new("Quantity", DataType::Int64, false),
        Field::new("TotalPrice", DataType::Float64, false),
    ]));

    let country = StringArray::from(sales.iter().map(|s| s.country.as_str()).collect::<Vec<_>>());
    let customer = StringArray::from(
        sales
            .iter()
            .map(|s| s.customer_id.as_str())
            .collect::<Vec<_>>(),
    );
    let month = Date32Array::from(
        sales
            .iter()
            .map(|s| s.invoice_year_month.days_from_epoch())
            .collect::<Vec<_>>(),
    );
    let description = StringArray::from(
        sales
            .iter()
            .map(|s| s.description.as_str())
            .collect::<Vec<_>>(),
    );
    let quantity = Int64Array::from(sales.iter().map(|s| s.quantity).collect::<Vec<_>>());
    let total = Float64Array::from(
        sales
            .iter()
            .map(|s| s.total_price.to_f64().unwrap_or(f64::NAN))
            .collect::<Vec<_>>(),
    );

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(country),
            Arc::new(customer),
            Arc::new(month),
            Arc::new(description),
            Arc::new(quantity),
            Arc::new(total),
        ],
    )
    .map_err(Into::into)
}

/// RFM schema, keyed uniquely by `Customer ID`.
fn rfm_batch(customers: &[CustomerRfm]) -> Result<RecordBatch, PipelineError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("Customer ID", DataType::Utf8, false),
        Field::new("Recency", DataType::Int64, false),
        Field::new("Frequency", DataType::Int64, false),
        Field::new("MonetaryValue", DataType::Float64, false),
        Field::new("R_Score", DataType::Int32, false),
        Field::new("F_Score", DataType::Int32, false),
        Field::new("M_Score", DataType::Int32, false),
        Field::new("Segment", DataType::Utf8, false),
    ]));

    let customer = StringArray::from(
        customers
            .iter()
            .map(|c| c.customer_id.as_str())
            .collect::<Vec<_>>(),
    );
    let recency = Int64Array::from(customers.iter().map(|c| c.recency).collect::<Vec<_>>());
    let frequency = Int64Array::from(customers.iter().map(|c| c.frequency).collect::<Vec<_>>());
    let monetary = Float64Array::from(
        customers
            .iter()
            .map(|c| c.monetary.to_f64().unwrap_or(f64::NAN))
            .collect::<Vec<_>>(),
    );
    let r_score = Int32Array::from(customers.iter().map(|c| i32::from(c.r_score)).collect::<Vec<_>>());
    let f_score = Int32Array::from(customers.iter().map(|c| i32::from(c.f_score)).collect::<Vec<_>>());
    let m_score = Int32Array::from(customers.iter().map(|c| i32::from(c.m_score)).collect::<Vec<_>>());
    let segment = StringArray::from(
        customers
            .iter()
            .map(|c| c.segment.label())
            .collect::<Vec<_>>(),
    );

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(customer),
            Arc::new(recency),
            Arc::new(frequency),
            Arc::new(monetary),
            Arc::new(r_score),
            Arc::new(f_score),
            Arc::new(m_score),
            Arc::new(segment),
        ],
    )
    .map_err(Into::into)
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Load a sales snapshot back into memory (used by tests and by the
/// presentation layer).
pub fn read_sales_snapshot(path: &Path) -> Result<Vec<SalesFact>, PipelineError> {
    let mut out = Vec::new();
    for batch in open_reader(path)? {
        let batch = batch?;
        let country = column::<StringArray>(&batch, path, "Country")?;
        let customer = column::<StringArray>(&batch, path, "Customer ID")?;
        let month = column::<Date32Array>(&batch, path, "InvoiceYearMonth")?;
        let description = column::<StringArray>(&batch, path, "Description")?;
        let quantity = column::<Int64Array>(&batch, path, "Quantity")?;
        let total = column::<Float64Array>(&batch, path, "TotalPrice")?;

        for row in 0..batch.num_rows() {
            let invoice_year_month = YearMonth::from_days_since_epoch(month.value(row))
                .ok_or_else(|| schema_err(path, "InvoiceYearMonth out of range"))?;
            out.push(SalesFact {
                country: country.value(row).to_string(),
                customer_id: customer.value(row).to_string(),
                invoice_year_month,
                description: description.value(row).to_string(),
                quantity: quantity.value(row),
                total_price: Decimal::from_f64(total.value(row))
                    .ok_or_else(|| schema_err(path, "TotalPrice is not a finite number"))?,
            });
        }
    }
    Ok(out)
}

/// Load an RFM snapshot back into memory.
pub fn read_rfm_snapshot(path: &Path) -> Result<Vec<CustomerRfm>, PipelineError> {
    let mut out = Vec::new();
    for batch in open_reader(path)? {
        let batch = batch?;
        let customer = column::<StringArray>(&batch, path, "Customer ID")?;
        let recency = column::<Int64Array>(&batch, path, "Recency")?;
        let frequency = column::<Int64Array>(&batch, path, "Frequency")?;
        let monetary = column::<Float64Array>(&batch, path, "MonetaryValue")?;
        let r_score = column::<Int32Array>(&batch, path, "R_Score")?;
        let f_score = column::<Int32Array>(&batch, path, "F_Score")?;
        let m_score = column::<Int32Array>(&batch, path, "M_Score")?;
        let segment = column::<StringArray>(&batch, path, "Segment")?;

        for row in 0..batch.num_rows() {
            out.push(CustomerRfm {
                customer_id: customer.value(row).to_string(),
                recency: recency.value(row),
                frequency: frequency.value(row),
                monetary: Decimal::from_f64(monetary.value(row))
                    .ok_or_else(|| schema_err(path, "MonetaryValue is not a finite number"))?,
                r_score: score_value(r_score.value(row), path)?,
                f_score: score_value(f_score.value(row), path)?,
                m_score: score_value(m_score.value(row), path)?,
                segment: Segment::from_label(segment.value(row))
                    .ok_or_else(|| schema_err(path, "unknown segment label"))?,
            });
        }
    }
    Ok(out)
}

fn open_reader(
    path: &Path,
) -> Result<parquet::arrow::arrow_reader::ParquetRecordBatchReader, PipelineError> {
    let file = File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ParquetRecordBatchReaderBuilder::try_new(file)?.build()?)
}

fn column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    path: &Path,
    name: &str,
) -> Result<&'a T, PipelineError> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| schema_err(path, &format!("missing column '{name}'")))?;
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| schema_err(path, &format!("column '{name}' has an unexpected type")))
}

fn score_value(raw: i32, path: &Path) -> Result<u8, PipelineError> {
    u8::try_from(raw)
        .ok()
        .filter(|score| (1..=5).contains(score))
        .ok_or_else(|| schema_err(path, "score outside 1..=5"))
}

fn schema_err(path: &Path, reason: &str) -> PipelineError {
    PipelineError::SnapshotSchema {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
