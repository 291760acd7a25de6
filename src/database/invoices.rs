/// Invoice store
///
/// Owns the `invoices` table definition, deterministic sample data for local
/// runs, and the handful of aggregate queries behind the dashboard endpoint.

use anyhow::Result;
use serde::Serialize;
use sqlx::{sqlite::SqlitePool, Sqlite};

/// One invoice as stored in the `invoices` table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvoiceRecord {
    pub invoice_number: String,
    /// YYYY-MM-DD
    pub invoice_date: String,
    pub due_date: Option<String>,
    pub seller_information: String,
    pub buyer_information: String,
    pub purchase_order_number: String,
    /// Comma separated, aligned with `quantities` and `unit_prices`
    pub products_services: String,
    pub quantities: String,
    pub unit_prices: String,
    pub subtotal: f64,
    pub service_charges: f64,
    pub net_total: f64,
    pub discount: String,
    pub tax: f64,
    /// Percentage as text, e.g. "6"
    pub tax_rate: String,
    pub shipping_costs: f64,
    pub grand_total: f64,
    pub currency: String,
    pub payment_terms: String,
    pub payment_method: String,
    pub bank_information: String,
    pub invoice_notes: String,
    pub shipping_address: String,
    pub billing_address: String,
}

/// Create the invoices table
///
/// Safe to call multiple times (uses IF NOT EXISTS).
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS invoices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            invoice_number TEXT NOT NULL UNIQUE,
            invoice_date DATE,
            due_date DATE,
            seller_information TEXT,
            buyer_information TEXT,
            purchase_order_number TEXT,
            products_services TEXT,
            quantities TEXT,
            unit_prices TEXT,
            subtotal NUMERIC,
            service_charges NUMERIC,
            net_total NUMERIC,
            discount TEXT,
            tax NUMERIC,
            tax_rate TEXT,
            shipping_costs NUMERIC,
            grand_total NUMERIC,
            currency TEXT,
            payment_terms TEXT,
            payment_method TEXT,
            bank_information TEXT,
            invoice_notes TEXT,
            shipping_address TEXT,
            billing_address TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_invoices_date ON invoices(invoice_date)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Insert a single invoice
pub async fn insert_invoice(pool: &SqlitePool, invoice: &InvoiceRecord) -> Result<()> {
    insert_with(pool, invoice).await
}

async fn insert_with<'e, E>(executor: E, invoice: &InvoiceRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO invoices (
            invoice_number, invoice_date, due_date, seller_information, buyer_information,
            purchase_order_number, products_services, quantities, unit_prices, subtotal,
            service_charges, net_total, discount, tax, tax_rate, shipping_costs, grand_total,
            currency, payment_terms, payment_method, bank_information, invoice_notes,
            shipping_address, billing_address
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&invoice.invoice_number)
    .bind(&invoice.invoice_date)
    .bind(&invoice.due_date)
    .bind(&invoice.seller_information)
    .bind(&invoice.buyer_information)
    .bind(&invoice.purchase_order_number)
    .bind(&invoice.products_services)
    .bind(&invoice.quantities)
    .bind(&invoice.unit_prices)
    .bind(invoice.subtotal)
    .bind(invoice.service_charges)
    .bind(invoice.net_total)
    .bind(&invoice.discount)
    .bind(invoice.tax)
    .bind(&invoice.tax_rate)
    .bind(invoice.shipping_costs)
    .bind(invoice.grand_total)
    .bind(&invoice.currency)
    .bind(&invoice.payment_terms)
    .bind(&invoice.payment_method)
    .bind(&invoice.bank_information)
    .bind(&invoice.invoice_notes)
    .bind(&invoice.shipping_address)
    .bind(&invoice.billing_address)
    .execute(executor)
    .await?;

    Ok(())
}

/// Replace the table contents with the given invoices in one transaction
pub async fn reset_with(pool: &SqlitePool, invoices: &[InvoiceRecord]) -> Result<usize> {
    init_schema(pool).await?;

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM invoices").execute(&mut *tx).await?;
    for invoice in invoices {
        insert_with(&mut *tx, invoice).await?;
    }
    tx.commit().await?;

    Ok(invoices.len())
}

/// Reset the table to the built-in sample invoices
///
/// Deterministic: re-running leaves the same rows behind.
pub async fn seed_sample_invoices(pool: &SqlitePool) -> Result<usize> {
    let records: Vec<InvoiceRecord> = SAMPLES.iter().map(Sample::to_record).collect();
    let count = reset_with(pool, &records).await?;
    tracing::info!("🌱 Seeded {} sample invoices", count);
    Ok(count)
}

/// Headline numbers for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub year: i32,
    /// Total `grand_total` of invoices dated in `year`, all currencies
    pub ytd_spend: f64,
    pub top_vendor: Option<String>,
    pub last_food: Option<FoodInvoice>,
    /// e.g. "USD: 5097.10, INR: 601.40"
    pub currency_mix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodInvoice {
    pub date: String,
    pub seller: String,
}

/// Compute dashboard metrics for one calendar year
pub async fn dashboard_metrics(pool: &SqlitePool, year: i32) -> Result<DashboardMetrics> {
    let ytd_spend: f64 = sqlx::query_scalar(
        "SELECT CAST(IFNULL(SUM(grand_total), 0) AS REAL) FROM invoices \
         WHERE invoice_date >= ? AND invoice_date <= ?",
    )
    .bind(format!("{:04}-01-01", year))
    .bind(format!("{:04}-12-31", year))
    .fetch_one(pool)
    .await?;

    let top_vendor: Option<String> = sqlx::query_scalar::<_, Option<String>>(
        "SELECT seller_information FROM invoices \
         GROUP BY seller_information ORDER BY SUM(grand_total) DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?
    .flatten();

    // Crude heuristic on product names
    let last_food = sqlx::query_as::<_, (Option<String>, Option<String>)>(
        "SELECT invoice_date, seller_information FROM invoices \
         WHERE LOWER(products_services) LIKE '%pizza%' \
            OR LOWER(products_services) LIKE '%burger%' \
            OR LOWER(products_services) LIKE '%biryani%' \
            OR LOWER(products_services) LIKE '%food%' \
         ORDER BY invoice_date DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?
    .map(|(date, seller)| FoodInvoice {
        date: date.unwrap_or_default(),
        seller: seller.unwrap_or_default(),
    });

    let currencies = sqlx::query_as::<_, (Option<String>, f64)>(
        "SELECT currency, CAST(IFNULL(SUM(grand_total), 0) AS REAL) AS total FROM invoices \
         GROUP BY currency ORDER BY total DESC",
    )
    .fetch_all(pool)
    .await?;

    let currency_mix = currencies
        .iter()
        .map(|(code, total)| format!("{}: {:.2}", code.as_deref().unwrap_or("unknown"), total))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(DashboardMetrics {
        year,
        ytd_spend: (ytd_spend * 100.0).round() / 100.0,
        top_vendor,
        last_food,
        currency_mix,
    })
}

const SAMPLE_BUYER_US: &str = "Sample Buyer, 123 Personal St, Philadelphia, PA, USA";
const SAMPLE_BUYER_IN: &str = "Sample Buyer, 45 Residency Rd, Bengaluru, KA, India";
const SAMPLE_BANK: &str = "Bank of Example, Routing 123456789, Account 000123456";

/// Compact sample row; buyer and address fields are filled in by `to_record`
struct Sample {
    number: &'static str,
    date: &'static str,
    due: &'static str,
    seller: &'static str,
    po: &'static str,
    products: &'static str,
    quantities: &'static str,
    unit_prices: &'static str,
    amounts: Amounts,
    discount: &'static str,
    tax_rate: &'static str,
    currency: &'static str,
    terms: &'static str,
    method: &'static str,
    bank: &'static str,
    notes: &'static str,
    india: bool,
}

/// subtotal, service charges, net total, tax, shipping, grand total
#[derive(Clone, Copy)]
struct Amounts(f64, f64, f64, f64, f64, f64);

impl Sample {
    fn to_record(&self) -> InvoiceRecord {
        let buyer = if self.india { SAMPLE_BUYER_IN } else { SAMPLE_BUYER_US };
        let Amounts(subtotal, service_charges, net_total, tax, shipping_costs, grand_total) = self.amounts;
        InvoiceRecord {
            invoice_number: self.number.to_string(),
            invoice_date: self.date.to_string(),
            due_date: Some(self.due.to_string()),
            seller_information: self.seller.to_string(),
            buyer_information: buyer.to_string(),
            purchase_order_number: self.po.to_string(),
            products_services: self.products.to_string(),
            quantities: self.quantities.to_string(),
            unit_prices: self.unit_prices.to_string(),
            subtotal,
            service_charges,
            net_total,
            discount: self.discount.to_string(),
            tax,
            tax_rate: self.tax_rate.to_string(),
            shipping_costs,
            grand_total,
            currency: self.currency.to_string(),
            payment_terms: self.terms.to_string(),
            payment_method: self.method.to_string(),
            bank_information: self.bank.to_string(),
            invoice_notes: self.notes.to_string(),
            shipping_address: buyer.to_string(),
            billing_address: buyer.to_string(),
        }
    }
}

const SAMPLES: &[Sample] = &[
    Sample {
        number: "INV-2024-0001", date: "2024-01-05", due: "2024-02-04",
        seller: "Amazon.com, Seattle, WA, USA", po: "PO-TECH-0001",
        products: "Laptop,USB-C Dock,Wireless Mouse", quantities: "1,1,2", unit_prices: "1500.00,200.00,40.00",
        amounts: Amounts(1780.00, 0.00, 1780.00, 106.80, 25.00, 1911.80),
        discount: "", tax_rate: "6", currency: "USD", terms: "Net 30", method: "Credit Card",
        bank: SAMPLE_BANK, notes: "Home office setup.", india: false,
    },
    Sample {
        number: "INV-2024-0002", date: "2024-01-20", due: "2024-02-19",
        seller: "Apple Store, New York, NY, USA", po: "PO-TECH-0002",
        products: "MacBook Pro,USB-C Hub", quantities: "1,1", unit_prices: "2400.00,80.00",
        amounts: Amounts(2480.00, 0.00, 2480.00, 148.80, 0.00, 2628.80),
        discount: "", tax_rate: "6", currency: "USD", terms: "Due on Receipt", method: "Credit Card",
        bank: SAMPLE_BANK, notes: "Laptop upgrade.", india: false,
    },
    Sample {
        number: "INV-2024-0003", date: "2024-02-10", due: "2024-03-11",
        seller: "Amazon Web Services, Inc.", po: "PO-CLOUD-0001",
        products: "AWS EC2,AWS S3", quantities: "50,5", unit_prices: "10.00,5.00",
        amounts: Amounts(525.00, 0.00, 525.00, 31.50, 0.00, 556.50),
        discount: "", tax_rate: "6", currency: "USD", terms: "Net 30", method: "Bank transfer",
        bank: SAMPLE_BANK, notes: "January AWS usage.", india: false,
    },
    Sample {
        number: "INV-2024-0004", date: "2024-03-05", due: "2024-04-04",
        seller: "Google Cloud Platform", po: "PO-CLOUD-0002",
        products: "Google Cloud Compute,Google Cloud Storage", quantities: "40,4", unit_prices: "12.00,4.00",
        amounts: Amounts(496.00, 0.00, 496.00, 29.76, 0.00, 525.76),
        discount: "", tax_rate: "6", currency: "USD", terms: "Net 30", method: "Credit Card",
        bank: SAMPLE_BANK, notes: "February GCP usage.", india: false,
    },
    Sample {
        number: "INV-2024-0005", date: "2024-03-15", due: "2024-03-15",
        seller: "McDonald's, Philadelphia, PA, USA", po: "PO-FOOD-0001",
        products: "Burger Meal,Fries,Soft Drink", quantities: "1,1,1", unit_prices: "8.00,3.00,2.00",
        amounts: Amounts(13.00, 0.00, 13.00, 0.78, 0.00, 13.78),
        discount: "", tax_rate: "6", currency: "USD", terms: "Paid", method: "Credit Card",
        bank: "", notes: "Late-night snack.", india: false,
    },
    Sample {
        number: "INV-2024-0006", date: "2024-04-02", due: "2024-04-02",
        seller: "Uber Eats", po: "PO-FOOD-0002",
        products: "Pizza,Soda", quantities: "1,2", unit_prices: "20.00,3.00",
        amounts: Amounts(26.00, 0.00, 26.00, 1.56, 4.99, 32.55),
        discount: "", tax_rate: "6", currency: "USD", terms: "Paid", method: "Credit Card",
        bank: "", notes: "Weekend dinner.", india: false,
    },
    Sample {
        number: "INV-2024-0007", date: "2024-05-10", due: "2024-06-09",
        seller: "Office Depot", po: "PO-OFFICE-0001",
        products: "Office Chair,Standing Desk", quantities: "1,1", unit_prices: "300.00,600.00",
        amounts: Amounts(900.00, 0.00, 900.00, 54.00, 40.00, 994.00),
        discount: "Promo discount 50.00 already applied to subtotal", tax_rate: "6", currency: "USD",
        terms: "Net 30", method: "Credit Card", bank: "", notes: "Home office ergonomics.", india: false,
    },
    Sample {
        number: "INV-2024-0008", date: "2024-06-01", due: "2024-07-01",
        seller: "DHL Express", po: "PO-SHIP-0001",
        products: "International shipping", quantities: "1", unit_prices: "120.00",
        amounts: Amounts(120.00, 0.00, 120.00, 7.20, 25.00, 152.20),
        discount: "", tax_rate: "6", currency: "USD", terms: "Net 15", method: "Credit Card",
        bank: "", notes: "Prototype shipment to EU.", india: false,
    },
    Sample {
        number: "INV-2024-0009", date: "2024-07-15", due: "2024-08-14",
        seller: "ACME Corp Consulting", po: "PO-CONSULT-0001",
        products: "Consulting,Design Review", quantities: "20,5", unit_prices: "200.00,150.00",
        amounts: Amounts(4750.00, 250.00, 5000.00, 300.00, 0.00, 5300.00),
        discount: "Loyalty discount 250.00 applied", tax_rate: "6", currency: "USD", terms: "Net 30",
        method: "Wire transfer", bank: SAMPLE_BANK, notes: "Quarterly strategy workshop.", india: false,
    },
    Sample {
        number: "INV-2024-0010", date: "2024-08-20", due: "2024-09-19",
        seller: "ACME Corp Consulting", po: "PO-CONSULT-0002",
        products: "Consulting", quantities: "15", unit_prices: "220.00",
        amounts: Amounts(3300.00, 0.00, 3300.00, 198.00, 0.00, 3498.00),
        discount: "", tax_rate: "6", currency: "USD", terms: "Net 30", method: "Wire transfer",
        bank: SAMPLE_BANK, notes: "Follow-up engagement.", india: false,
    },
    Sample {
        number: "INV-2024-0011", date: "2024-09-05", due: "2024-10-05",
        seller: "Spotify AB", po: "PO-SUB-0001",
        products: "Spotify Subscription", quantities: "1", unit_prices: "9.99",
        amounts: Amounts(9.99, 0.00, 9.99, 2.10, 0.00, 12.09),
        discount: "", tax_rate: "21", currency: "EUR", terms: "Monthly", method: "Credit Card",
        bank: "", notes: "Music subscription.", india: false,
    },
    Sample {
        number: "INV-2024-0012", date: "2024-10-10", due: "2024-11-09",
        seller: "Zomato, Bengaluru, KA, India", po: "PO-FOOD-IN-0001",
        products: "Biryani,Soft Drink", quantities: "2,2", unit_prices: "200.00,40.00",
        amounts: Amounts(480.00, 0.00, 480.00, 86.40, 35.00, 601.40),
        discount: "", tax_rate: "18", currency: "INR", terms: "Paid", method: "UPI",
        bank: "", notes: "Dinner with friends.", india: true,
    },
    Sample {
        number: "INV-2024-0013", date: "2024-11-01", due: "2024-12-01",
        seller: "Amazon India", po: "PO-TECH-IN-0001",
        products: "Mechanical Keyboard,USB-C Cable", quantities: "1,3", unit_prices: "4500.00,300.00",
        amounts: Amounts(5400.00, 0.00, 5400.00, 972.00, 100.00, 6472.00),
        discount: "", tax_rate: "18", currency: "INR", terms: "Net 30", method: "Credit Card",
        bank: "", notes: "Accessories for home office.", india: true,
    },
    Sample {
        number: "INV-2023-0101", date: "2023-09-15", due: "2023-10-15",
        seller: "Microsoft Corporation", po: "PO-SUB-2023-0001",
        products: "Microsoft 365 Subscription", quantities: "1", unit_prices: "99.00",
        amounts: Amounts(99.00, 0.00, 99.00, 5.94, 0.00, 104.94),
        discount: "", tax_rate: "6", currency: "USD", terms: "Annual", method: "Credit Card",
        bank: "", notes: "Office suite subscription.", india: false,
    },
    Sample {
        number: "INV-2023-0102", date: "2023-11-22", due: "2023-12-22",
        seller: "Nike Store", po: "PO-FASHION-2023-0001",
        products: "Nike shoes,Nike socks", quantities: "1,3", unit_prices: "120.00,10.00",
        amounts: Amounts(150.00, 0.00, 150.00, 9.00, 0.00, 159.00),
        discount: "", tax_rate: "6", currency: "USD", terms: "Paid", method: "Credit Card",
        bank: "", notes: "Running gear.", india: false,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteAdapter;

    #[tokio::test]
    async fn seeding_is_deterministic() {
        let adapter = SqliteAdapter::in_memory().await.unwrap();
        let first = seed_sample_invoices(adapter.pool()).await.unwrap();
        let second = seed_sample_invoices(adapter.pool()).await.unwrap();
        assert_eq!(first, second);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(adapter.pool())
            .await
            .unwrap();
        assert_eq!(count as usize, SAMPLES.len());
    }

    #[tokio::test]
    async fn duplicate_invoice_numbers_are_rejected() {
        let adapter = SqliteAdapter::in_memory().await.unwrap();
        init_schema(adapter.pool()).await.unwrap();
        let record = InvoiceRecord { invoice_number: "INV-1".into(), ..Default::default() };
        insert_invoice(adapter.pool(), &record).await.unwrap();
        assert!(insert_invoice(adapter.pool(), &record).await.is_err());
    }

    #[tokio::test]
    async fn dashboard_metrics_over_samples() {
        let adapter = SqliteAdapter::in_memory().await.unwrap();
        seed_sample_invoices(adapter.pool()).await.unwrap();

        let metrics = dashboard_metrics(adapter.pool(), 2023).await.unwrap();
        assert_eq!(metrics.ytd_spend, 263.94);
        assert_eq!(metrics.top_vendor.as_deref(), Some("ACME Corp Consulting"));
        assert_eq!(
            metrics.last_food,
            Some(FoodInvoice { date: "2024-10-10".into(), seller: "Zomato, Bengaluru, KA, India".into() })
        );
        assert!(metrics.currency_mix.starts_with("USD: "));
        assert!(metrics.currency_mix.contains("EUR: 12.09"));
    }

    #[tokio::test]
    async fn dashboard_metrics_on_empty_table() {
        let adapter = SqliteAdapter::in_memory().await.unwrap();
        init_schema(adapter.pool()).await.unwrap();

        let metrics = dashboard_metrics(adapter.pool(), 2024).await.unwrap();
        assert_eq!(metrics.ytd_spend, 0.0);
        assert_eq!(metrics.top_vendor, None);
        assert_eq!(metrics.last_food, None);
        assert_eq!(metrics.currency_mix, "");
    }
}
