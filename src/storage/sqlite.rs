// SQLite storage backend for receipts and their products
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::models::ExtractedReceipt;

pub struct ReceiptStore {
    pub(crate) conn: Connection,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptSummary {
    pub id: i64,
    pub supermarket: String,
    pub date: String,
    pub total: f64,
    pub products_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredProduct {
    pub id: i64,
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredReceipt {
    pub id: i64,
    pub supermarket: String,
    pub date: String,
    pub total: f64,
    pub products_count: usize,
    pub products: Vec<StoredProduct>,
}

/// A product joined to its parent receipt, for the flat products listing.
#[derive(Debug, Clone, Serialize)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
    pub receipt: ReceiptRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptRef {
    pub id: i64,
    pub supermarket: String,
    pub date: String,
}

/// Partial update of a stored receipt's mutable fields.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReceiptUpdate {
    pub supermarket_name: Option<String>,
    pub date: Option<String>,
    pub total_amount: Option<f64>,
}

impl ReceiptStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("opening database at {}", path.display()))?;
        Self::create_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::create_schema(&conn)?;
        Ok(Self { conn })
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        // quantity is REAL: weight-counted items carry fractional amounts
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS receipts (
                id INTEGER PRIMARY KEY,
                supermarket_name TEXT NOT NULL,
                date TEXT NOT NULL,
                total_amount REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                unit_price REAL NOT NULL,
                quantity REAL NOT NULL,
                receipt_id INTEGER NOT NULL
                    REFERENCES receipts(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_products_receipt
                ON products(receipt_id);
            CREATE INDEX IF NOT EXISTS idx_products_name
                ON products(name);
            CREATE INDEX IF NOT EXISTS idx_receipts_date
                ON receipts(date);
            "#,
        )?;
        Ok(())
    }

    /// Persist one extraction result. Undetermined fields take their safe
    /// defaults here, at the storage boundary: unknown merchant, today,
    /// zero total.
    pub fn insert_receipt(&mut self, record: &ExtractedReceipt) -> Result<StoredReceipt> {
        let supermarket = record
            .merchant
            .clone()
            .unwrap_or_else(|| "Unknown".to_string());
        let date = record
            .timestamp
            .map(|t| t.date())
            .unwrap_or_else(|| chrono::Local::now().date_naive())
            .format("%Y-%m-%d")
            .to_string();
        let total = record.total_amount.unwrap_or(0.0);

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO receipts (supermarket_name, date, total_amount) VALUES (?, ?, ?)",
            params![supermarket, date, total],
        )?;
        let receipt_id = tx.last_insert_rowid();

        for item in &record.items {
            tx.execute(
                "INSERT INTO products (name, unit_price, quantity, receipt_id) VALUES (?, ?, ?, ?)",
                params![item.name, item.unit_price, item.quantity, receipt_id],
            )?;
        }
        tx.commit()?;

        self.get_receipt(receipt_id)?
            .context("receipt vanished right after insert")
    }

    pub fn list_receipts(&self) -> Result<Vec<ReceiptSummary>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT r.id, r.supermarket_name, r.date, r.total_amount, COUNT(p.id)
               FROM receipts r
               LEFT JOIN products p ON p.receipt_id = r.id
               GROUP BY r.id
               ORDER BY r.date DESC"#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ReceiptSummary {
                id: row.get(0)?,
                supermarket: row.get(1)?,
                date: row.get(2)?,
                total: row.get(3)?,
                products_count: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn get_receipt(&self, receipt_id: i64) -> Result<Option<StoredReceipt>> {
        let header = self
            .conn
            .query_row(
                "SELECT id, supermarket_name, date, total_amount FROM receipts WHERE id = ?",
                params![receipt_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, supermarket, date, total)) = header else {
            return Ok(None);
        };

        let products = self.products_of(id)?;
        Ok(Some(StoredReceipt {
            id,
            supermarket,
            date,
            total,
            products_count: products.len(),
            products,
        }))
    }

    fn products_of(&self, receipt_id: i64) -> Result<Vec<StoredProduct>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, quantity, unit_price FROM products WHERE receipt_id = ? ORDER BY id",
        )?;
        let rows = stmt.query_map(params![receipt_id], |row| {
            let quantity: f64 = row.get(2)?;
            let unit_price: f64 = row.get(3)?;
            Ok(StoredProduct {
                id: row.get(0)?,
                name: row.get(1)?,
                quantity,
                unit_price,
                total_price: quantity * unit_price,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Apply a partial update. The date, when present, must already be
    /// validated as ISO `YYYY-MM-DD`.
    pub fn update_receipt(
        &mut self,
        receipt_id: i64,
        update: &ReceiptUpdate,
    ) -> Result<Option<StoredReceipt>> {
        if let Some(date) = &update.date {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("invalid date {date}, expected YYYY-MM-DD"))?;
        }

        if self.get_receipt(receipt_id)?.is_none() {
            return Ok(None);
        }

        if let Some(name) = &update.supermarket_name {
            self.conn.execute(
                "UPDATE receipts SET supermarket_name = ? WHERE id = ?",
                params![name, receipt_id],
            )?;
        }
        if let Some(date) = &update.date {
            self.conn.execute(
                "UPDATE receipts SET date = ? WHERE id = ?",
                params![date, receipt_id],
            )?;
        }
        if let Some(total) = update.total_amount {
            self.conn.execute(
                "UPDATE receipts SET total_amount = ? WHERE id = ?",
                params![total, receipt_id],
            )?;
        }

        self.get_receipt(receipt_id)
    }

    /// Delete a receipt; products go with it through the cascade. Returns
    /// the receipt as it was, so callers can report what was removed.
    pub fn delete_receipt(&mut self, receipt_id: i64) -> Result<Option<StoredReceipt>> {
        let Some(receipt) = self.get_receipt(receipt_id)? else {
            return Ok(None);
        };
        self.conn
            .execute("DELETE FROM receipts WHERE id = ?", params![receipt_id])?;
        Ok(Some(receipt))
    }

    pub fn list_products(&self) -> Result<Vec<ProductRow>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT p.id, p.name, p.quantity, p.unit_price,
                      r.id, r.supermarket_name, r.date
               FROM products p
               JOIN receipts r ON p.receipt_id = r.id
               ORDER BY r.date DESC, p.id"#,
        )?;
        let rows = stmt.query_map([], |row| {
            let quantity: f64 = row.get(2)?;
            let unit_price: f64 = row.get(3)?;
            Ok(ProductRow {
                id: row.get(0)?,
                name: row.get(1)?,
                quantity,
                unit_price,
                total_price: quantity * unit_price,
                receipt: ReceiptRef {
                    id: row.get(4)?,
                    supermarket: row.get(5)?,
                    date: row.get(6)?,
                },
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Delete one product, returning its parent receipt id.
    pub fn delete_product(&mut self, product_id: i64) -> Result<Option<i64>> {
        let receipt_id = self
            .conn
            .query_row(
                "SELECT receipt_id FROM products WHERE id = ?",
                params![product_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        let Some(receipt_id) = receipt_id else {
            return Ok(None);
        };
        self.conn
            .execute("DELETE FROM products WHERE id = ?", params![product_id])?;
        Ok(Some(receipt_id))
    }
}
