//! Generate a deterministic synthetic transaction log for trying out the
//! pipeline without the real dataset:
//!
//! ```sh
//! cargo run --bin generate_sample
//! cargo run -- data/sample_transactions.csv
//! ```

use chrono::{Duration, NaiveDate};

/// Minimal deterministic PRNG (splitmix64), enough for sample data.
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        SimpleRng { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }
}

const PRODUCTS: [(&str, &str); 6] = [
    ("WHITE HANGING HEART T-LIGHT HOLDER", "2.55"),
    ("REGENCY CAKESTAND 3 TIER", "12.75"),
    ("JUMBO BAG RED RETROSPOT", "1.95"),
    ("ASSORTED COLOUR BIRD ORNAMENT", "1.69"),
    ("PARTY BUNTING", "4.95"),
    ("LUNCH BAG SPACEBOY DESIGN", "1.65"),
];

const COUNTRIES: [&str; 4] = ["United Kingdom", "France", "Germany", "Netherlands"];

fn main() {
    let mut rng = SimpleRng::new(42);
    std::fs::create_dir_all("data").expect("create data directory");

    let path = "data/sample_transactions.csv";
    let mut writer = csv::Writer::from_path(path).expect("create sample CSV");
    writer
        .write_record([
            "Invoice",
            "Customer ID",
            "Description",
            "Quantity",
            "Price",
            "InvoiceDate",
            "Country",
        ])
        .expect("write header");

    let start = NaiveDate::from_ymd_opt(2010, 12, 1)
        .expect("valid date")
        .and_hms_opt(8, 0, 0)
        .expect("valid time");

    let mut invoice_no = 536_365u32;
    let mut rows = 0usize;

    for customer in 0..60u32 {
        let customer_id = (12_346 + customer * 7).to_string();
        let country = COUNTRIES[rng.below(COUNTRIES.len())];
        let invoices = 1 + rng.below(8);

        for _ in 0..invoices {
            let when = start
                + Duration::days(rng.below(365) as i64)
                + Duration::minutes(rng.below(600) as i64);
            // sprinkle in cancellations so the cleaner has work to do
            let invoice = if rng.below(20) == 0 {
                format!("C{invoice_no}")
            } else {
                invoice_no.to_string()
            };
            invoice_no += 1;

            let when = when.format("%Y-%m-%d %H:%M:%S").to_string();
            for _ in 0..1 + rng.below(4) {
                let (description, price) = PRODUCTS[rng.below(PRODUCTS.len())];
                let quantity = (1 + rng.below(24)).to_string();
                writer
                    .write_record([
                        invoice.as_str(),
                        customer_id.as_str(),
                        description,
                        quantity.as_str(),
                        price,
                        when.as_str(),
                        country,
                    ])
                    .expect("write row");
                rows += 1;
            }
        }
    }

    // administrative rows the cleaner should drop
    let when = (start + Duration::days(100)).format("%Y-%m-%d %H:%M:%S").to_string();
    for (invoice, customer, description, quantity, price) in [
        ("599001", "12346", "POSTAGE", "1", "18.00"),
        ("599002", "12353", "Manual adjustment fee", "1", "9.99"),
        ("599003", "", "PARTY BUNTING", "6", "4.95"),
        ("599004", "12360", "JUMBO BAG RED RETROSPOT", "-6", "1.95"),
    ] {
        writer
            .write_record([invoice, customer, description, quantity, price, when.as_str(), "United Kingdom"])
            .expect("write row");
        rows += 1;
    }

    writer.flush().expect("flush sample CSV");
    println!("Wrote {rows} transactions to {path}");
}
