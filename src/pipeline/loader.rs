use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;
use csv::ByteRecord;
use log::{debug, warn};
use rust_decimal::Decimal;

use super::error::PipelineError;
use super::model::RawTransaction;

/// Columns the input file must carry. Extra columns (the real dataset also
/// ships `StockCode`) are ignored.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "Invoice",
    "Customer ID",
    "Description",
    "Quantity",
    "Price",
    "InvoiceDate",
    "Country",
];

/// Timestamp formats seen across published exports of the retail dataset.
const DATE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Loader result: parsed rows plus the count of rows skipped under the
/// lenient malformed-row policy.
#[derive(Debug)]
pub struct LoadedTransactions {
    pub rows: Vec<RawTransaction>,
    pub malformed: usize,
}

/// Read a raw transaction log into memory.
///
/// The file is ISO-8859-1 encoded, so records are read as bytes and decoded
/// byte-for-byte. Invoice and customer ids are kept as opaque strings.
/// Rows whose quantity, price or timestamp fail to parse are skipped and
/// counted (lenient policy); a missing file or missing column is fatal.
pub fn load_transactions(path: &Path) -> Result<LoadedTransactions, PipelineError> {
    let file = File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(latin1_to_string)
        .collect();
    let column = |name: &str| -> Result<usize, PipelineError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::Schema(name.to_string()))
    };
    let invoice_col = column("Invoice")?;
    let customer_col = column("Customer ID")?;
    let description_col = column("Description")?;
    let quantity_col = column("Quantity")?;
    let price_col = column("Price")?;
    let date_col = column("InvoiceDate")?;
    let country_col = column("Country")?;

    let mut rows = Vec::new();
    let mut malformed = 0usize;
    let mut record = ByteRecord::new();
    let mut row_no = 0usize;

    while reader.read_byte_record(&mut record)? {
        row_no += 1;
        let field = |col: usize| record.get(col).map(latin1_to_string).unwrap_or_default();

        let quantity = field(quantity_col).trim().parse::<i64>();
        let unit_price = field(price_col).trim().parse::<Decimal>();
        let invoice_date = parse_invoice_date(field(date_col).trim());

        let (Ok(quantity), Ok(unit_price), Some(invoice_date)) =
            (quantity, unit_price, invoice_date)
        else {
            debug!("skipping malformed row {row_no}");
            malformed += 1;
            continue;
        };

        let customer = field(customer_col).trim().to_string();
        let customer_id = if customer.is_empty() {
            None
        } else {
            Some(customer)
        };

        rows.push(RawTransaction {
            invoice: field(invoice_col),
            customer_id,
            description: field(description_col),
            quantity,
            unit_price,
            invoice_date,
            country: field(country_col),
        });
    }

    if malformed > 0 {
        warn!(
            "skipped {malformed} malformed rows while loading {}",
            path.display()
        );
    }
    Ok(LoadedTransactions { rows, malformed })
}

fn parse_invoice_date(s: &str) -> Option<NaiveDateTime> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// ISO-8859-1 maps each byte directly to the matching Unicode code point.
fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
