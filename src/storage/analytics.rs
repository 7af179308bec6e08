// Aggregate analytics over stored receipts
use std::collections::BTreeMap;

use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::sqlite::ReceiptStore;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendPeriod {
    Monthly,
    Weekly,
    Yearly,
}

impl TrendPeriod {
    fn bucket_format(self) -> &'static str {
        match self {
            TrendPeriod::Monthly => "%Y-%m",
            TrendPeriod::Weekly => "%Y-%W",
            TrendPeriod::Yearly => "%Y",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrendPeriod::Monthly => "monthly",
            TrendPeriod::Weekly => "weekly",
            TrendPeriod::Yearly => "yearly",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub period: String,
    pub total_spending: f64,
    pub receipt_count: i64,
    pub avg_per_receipt: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HighestPeriod {
    pub period: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpendingTrend {
    pub period: &'static str,
    pub trends: Vec<TrendPoint>,
    pub highest_spending_period: Option<HighestPeriod>,
    pub total_periods: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceObservation {
    pub price: f64,
    pub date: String,
    pub receipt_id: i64,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupermarketComparison {
    pub supermarket: String,
    pub min_price: f64,
    pub max_price: f64,
    pub avg_price: f64,
    pub occurrences: usize,
    pub last_seen: String,
    pub price_history: Vec<PriceObservation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceComparison {
    pub product_name: String,
    pub total_occurrences: usize,
    pub supermarkets_found: usize,
    pub cheapest_supermarket: Option<String>,
    pub comparisons: Vec<SupermarketComparison>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastPurchase {
    pub date: String,
    pub supermarket: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopProduct {
    pub rank: usize,
    pub name: String,
    pub total_spent: f64,
    pub total_quantity: f64,
    pub occurrences: i64,
    pub avg_price: f64,
    pub supermarkets: Vec<String>,
    pub last_purchase: Option<LastPurchase>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopProducts {
    pub top_products: Vec<TopProduct>,
    pub total_products_analyzed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceChangePoint {
    pub date: String,
    pub price: f64,
    pub supermarket: String,
    pub quantity: f64,
    pub receipt_id: i64,
    pub price_change: Option<f64>,
    pub price_change_percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceStatistics {
    pub min_price: f64,
    pub max_price: f64,
    pub avg_price: f64,
    pub price_range: f64,
    pub total_observations: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceChanges {
    pub product_name: String,
    pub price_statistics: Option<PriceStatistics>,
    pub biggest_increase: Option<PriceChangePoint>,
    pub biggest_decrease: Option<PriceChangePoint>,
    pub price_history: Vec<PriceChangePoint>,
}

fn default_quantity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasketEntry {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BasketProduct {
    pub name: String,
    pub unit_price: f64,
    pub quantity: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissingProduct {
    pub name: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BasketQuote {
    pub supermarket: String,
    pub total_cost: f64,
    pub products_found: usize,
    pub products_missing: usize,
    pub products_detail: Vec<BasketProduct>,
    pub missing_products: Vec<MissingProduct>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheapestBasket {
    pub requested_products: usize,
    pub cheapest_complete_basket: Option<BasketQuote>,
    pub complete_baskets: Vec<BasketQuote>,
    pub partial_baskets: Vec<BasketQuote>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupermarketRank {
    pub rank: usize,
    pub supermarket: String,
    pub score: f64,
    pub avg_receipt_amount: f64,
    pub total_receipts: i64,
    pub total_spent: f64,
    pub total_products_bought: f64,
    pub unique_products: i64,
    pub avg_product_price: f64,
    pub last_visit: Option<String>,
    pub top_products: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneralStats {
    pub total_supermarkets: usize,
    pub total_receipts: i64,
    pub total_spent_overall: f64,
    pub avg_receipt_overall: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupermarketRanking {
    pub ranking: Vec<SupermarketRank>,
    pub cheapest_supermarket: Option<SupermarketRank>,
    pub most_expensive_supermarket: Option<SupermarketRank>,
    pub general_statistics: GeneralStats,
}

impl ReceiptStore {
    /// Spending bucketed by month, week, or year.
    pub fn spending_trend(&self, period: TrendPeriod) -> Result<SpendingTrend> {
        let mut stmt = self.conn.prepare(
            r#"SELECT strftime(?1, date) AS bucket, SUM(total_amount), COUNT(*)
               FROM receipts
               GROUP BY bucket
               ORDER BY bucket"#,
        )?;
        let rows = stmt.query_map(params![period.bucket_format()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut trends = Vec::new();
        for row in rows {
            let (bucket, total_spending, receipt_count) = row?;
            trends.push(TrendPoint {
                period: bucket,
                total_spending,
                receipt_count,
                avg_per_receipt: if receipt_count > 0 {
                    round2(total_spending / receipt_count as f64)
                } else {
                    0.0
                },
            });
        }

        let highest_spending_period = trends
            .iter()
            .max_by(|a, b| a.total_spending.total_cmp(&b.total_spending))
            .map(|point| HighestPeriod {
                period: point.period.clone(),
                amount: point.total_spending,
            });

        Ok(SpendingTrend {
            period: period.as_str(),
            total_periods: trends.len(),
            trends,
            highest_spending_period,
        })
    }

    /// Where has a product been seen, and for how much. Substring match,
    /// case-insensitive, grouped per supermarket.
    pub fn compare_prices(&self, product_name: &str) -> Result<PriceComparison> {
        let pattern = format!("%{product_name}%");
        let mut stmt = self.conn.prepare(
            r#"SELECT p.unit_price, p.quantity, r.id, r.supermarket_name, r.date
               FROM products p
               JOIN receipts r ON p.receipt_id = r.id
               WHERE p.name LIKE ?1
               ORDER BY r.date"#,
        )?;
        let rows = stmt.query_map(params![pattern], |row| {
            Ok((
                row.get::<_, f64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut by_supermarket: BTreeMap<String, Vec<PriceObservation>> = BTreeMap::new();
        let mut total_occurrences = 0_usize;
        for row in rows {
            let (price, quantity, receipt_id, supermarket, date) = row?;
            total_occurrences += 1;
            by_supermarket
                .entry(supermarket)
                .or_default()
                .push(PriceObservation {
                    price,
                    date,
                    receipt_id,
                    quantity,
                });
        }

        let mut comparisons: Vec<SupermarketComparison> = by_supermarket
            .into_iter()
            .map(|(supermarket, history)| {
                let prices: Vec<f64> = history.iter().map(|o| o.price).collect();
                let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
                let max_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let avg_price = prices.iter().sum::<f64>() / prices.len() as f64;
                let last_seen = history
                    .iter()
                    .map(|o| o.date.clone())
                    .max()
                    .unwrap_or_default();
                SupermarketComparison {
                    supermarket,
                    min_price,
                    max_price,
                    avg_price: round2(avg_price),
                    occurrences: history.len(),
                    last_seen,
                    price_history: history,
                }
            })
            .collect();
        comparisons.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));

        Ok(PriceComparison {
            product_name: product_name.to_string(),
            total_occurrences,
            supermarkets_found: comparisons.len(),
            cheapest_supermarket: comparisons.first().map(|c| c.supermarket.clone()),
            comparisons,
        })
    }

    /// Top 3 products by summed unit price across all receipts.
    pub fn top_products(&self) -> Result<TopProducts> {
        let mut stmt = self.conn.prepare(
            r#"SELECT name, SUM(unit_price), SUM(quantity), COUNT(*), AVG(unit_price)
               FROM products
               GROUP BY name
               ORDER BY SUM(unit_price) DESC
               LIMIT 3"#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })?;

        let mut top_products = Vec::new();
        for (index, row) in rows.enumerate() {
            let (name, total_spent, total_quantity, occurrences, avg_price) = row?;

            let mut supermarket_stmt = self.conn.prepare(
                r#"SELECT DISTINCT r.supermarket_name
                   FROM products p JOIN receipts r ON p.receipt_id = r.id
                   WHERE p.name = ?1"#,
            )?;
            let supermarkets = supermarket_stmt
                .query_map(params![name], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let last_purchase = self
                .conn
                .query_row(
                    r#"SELECT r.date, r.supermarket_name, p.unit_price
                       FROM products p JOIN receipts r ON p.receipt_id = r.id
                       WHERE p.name = ?1
                       ORDER BY r.date DESC
                       LIMIT 1"#,
                    params![name],
                    |row| {
                        Ok(LastPurchase {
                            date: row.get(0)?,
                            supermarket: row.get(1)?,
                            price: row.get(2)?,
                        })
                    },
                )
                .optional()?;

            top_products.push(TopProduct {
                rank: index + 1,
                name,
                total_spent: round2(total_spent),
                total_quantity,
                occurrences,
                avg_price: round2(avg_price),
                supermarkets,
                last_purchase,
            });
        }

        let total_products_analyzed =
            self.conn
                .query_row("SELECT COUNT(DISTINCT name) FROM products", [], |row| {
                    row.get(0)
                })?;

        Ok(TopProducts {
            top_products,
            total_products_analyzed,
        })
    }

    /// Chronological price history for a product with step deltas.
    pub fn price_changes(&self, product_name: &str) -> Result<PriceChanges> {
        let pattern = format!("%{product_name}%");
        let mut stmt = self.conn.prepare(
            r#"SELECT p.unit_price, p.quantity, r.id, r.supermarket_name, r.date
               FROM products p
               JOIN receipts r ON p.receipt_id = r.id
               WHERE p.name LIKE ?1
               ORDER BY r.date"#,
        )?;
        let rows = stmt.query_map(params![pattern], |row| {
            Ok((
                row.get::<_, f64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut price_history = Vec::new();
        let mut previous_price: Option<f64> = None;
        for row in rows {
            let (price, quantity, receipt_id, supermarket, date) = row?;
            let price_change = previous_price.map(|prev| round2(price - prev));
            let price_change_percentage = previous_price
                .filter(|prev| *prev != 0.0)
                .map(|prev| round2((price - prev) / prev * 100.0));
            price_history.push(PriceChangePoint {
                date,
                price,
                supermarket,
                quantity,
                receipt_id,
                price_change,
                price_change_percentage,
            });
            previous_price = Some(price);
        }

        let price_statistics = if price_history.is_empty() {
            None
        } else {
            let prices: Vec<f64> = price_history.iter().map(|p| p.price).collect();
            let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
            let max_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let avg_price = prices.iter().sum::<f64>() / prices.len() as f64;
            Some(PriceStatistics {
                min_price,
                max_price,
                avg_price: round2(avg_price),
                price_range: round2(max_price - min_price),
                total_observations: price_history.len(),
            })
        };

        let changes: Vec<&PriceChangePoint> = price_history
            .iter()
            .filter(|p| p.price_change.is_some())
            .collect();
        let biggest_increase = changes
            .iter()
            .max_by(|a, b| a.price_change.unwrap_or(0.0).total_cmp(&b.price_change.unwrap_or(0.0)))
            .map(|p| (*p).clone());
        let biggest_decrease = changes
            .iter()
            .min_by(|a, b| a.price_change.unwrap_or(0.0).total_cmp(&b.price_change.unwrap_or(0.0)))
            .map(|p| (*p).clone());

        Ok(PriceChanges {
            product_name: product_name.to_string(),
            price_statistics,
            biggest_increase,
            biggest_decrease,
            price_history,
        })
    }

    /// Price a shopping cart at every known supermarket using each
    /// product's most recent observed price.
    pub fn cheapest_basket(&self, cart: &[BasketEntry]) -> Result<CheapestBasket> {
        let mut supermarket_stmt = self
            .conn
            .prepare("SELECT DISTINCT supermarket_name FROM receipts")?;
        let supermarkets = supermarket_stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        let mut quotes: BTreeMap<String, BasketQuote> = supermarkets
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    BasketQuote {
                        supermarket: name.clone(),
                        total_cost: 0.0,
                        products_found: 0,
                        products_missing: 0,
                        products_detail: Vec::new(),
                        missing_products: Vec::new(),
                    },
                )
            })
            .collect();

        for entry in cart {
            if entry.name.is_empty() {
                continue;
            }
            let pattern = format!("%{}%", entry.name);
            for supermarket in &supermarkets {
                let latest_price = self
                    .conn
                    .query_row(
                        r#"SELECT p.unit_price
                           FROM products p
                           JOIN receipts r ON p.receipt_id = r.id
                           WHERE p.name LIKE ?1 AND r.supermarket_name = ?2
                           ORDER BY r.date DESC
                           LIMIT 1"#,
                        params![pattern, supermarket],
                        |row| row.get::<_, f64>(0),
                    )
                    .optional()?;

                let Some(quote) = quotes.get_mut(supermarket) else {
                    continue;
                };
                match latest_price {
                    Some(price) => {
                        let total_price = price * entry.quantity;
                        quote.total_cost += total_price;
                        quote.products_detail.push(BasketProduct {
                            name: entry.name.clone(),
                            unit_price: price,
                            quantity: entry.quantity,
                            total_price: round2(total_price),
                        });
                    }
                    None => quote.missing_products.push(MissingProduct {
                        name: entry.name.clone(),
                        quantity: entry.quantity,
                    }),
                }
            }
        }

        let mut complete_baskets = Vec::new();
        let mut partial_baskets = Vec::new();
        for (_, mut quote) in quotes {
            quote.total_cost = round2(quote.total_cost);
            quote.products_found = quote.products_detail.len();
            quote.products_missing = quote.missing_products.len();
            if quote.products_missing == 0 && quote.products_found > 0 {
                complete_baskets.push(quote);
            } else {
                partial_baskets.push(quote);
            }
        }
        complete_baskets.sort_by(|a, b| a.total_cost.total_cmp(&b.total_cost));
        partial_baskets.sort_by(|a, b| a.total_cost.total_cmp(&b.total_cost));

        let message = if complete_baskets.is_empty() {
            "No complete baskets found".to_string()
        } else {
            "Complete baskets found".to_string()
        };

        Ok(CheapestBasket {
            requested_products: cart.len(),
            cheapest_complete_basket: complete_baskets.first().cloned(),
            complete_baskets,
            partial_baskets,
            message,
        })
    }

    /// Rank supermarkets by average product price, cheapest first.
    pub fn supermarket_ranking(&self) -> Result<SupermarketRanking> {
        let mut stmt = self.conn.prepare(
            r#"SELECT supermarket_name, COUNT(*), SUM(total_amount), AVG(total_amount)
               FROM receipts
               GROUP BY supermarket_name
               ORDER BY AVG(total_amount)"#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;

        let mut ranking = Vec::new();
        for (index, row) in rows.enumerate() {
            let (supermarket, total_receipts, total_spent, avg_receipt_amount) = row?;

            let (total_products_bought, unique_products, avg_product_price): (f64, i64, f64) =
                self.conn.query_row(
                    r#"SELECT COALESCE(SUM(p.quantity), 0),
                              COUNT(DISTINCT p.name),
                              COALESCE(AVG(p.unit_price), 0)
                       FROM products p
                       JOIN receipts r ON p.receipt_id = r.id
                       WHERE r.supermarket_name = ?1"#,
                    params![supermarket],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?;

            let last_visit = self
                .conn
                .query_row(
                    "SELECT MAX(date) FROM receipts WHERE supermarket_name = ?1",
                    params![supermarket],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?
                .flatten();

            let mut top_stmt = self.conn.prepare(
                r#"SELECT p.name
                   FROM products p
                   JOIN receipts r ON p.receipt_id = r.id
                   WHERE r.supermarket_name = ?1
                   GROUP BY p.name
                   ORDER BY COUNT(*) DESC
                   LIMIT 3"#,
            )?;
            let top_products = top_stmt
                .query_map(params![supermarket], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            ranking.push(SupermarketRank {
                rank: index + 1,
                supermarket,
                score: round2(avg_product_price),
                avg_receipt_amount: round2(avg_receipt_amount),
                total_receipts,
                total_spent: round2(total_spent),
                total_products_bought,
                unique_products,
                avg_product_price: round2(avg_product_price),
                last_visit,
                top_products,
            });
        }

        let general_statistics = {
            let (total_receipts, total_spent_overall, avg_receipt_overall): (i64, f64, f64) =
                self.conn.query_row(
                    r#"SELECT COUNT(*),
                              COALESCE(SUM(total_amount), 0),
                              COALESCE(AVG(total_amount), 0)
                       FROM receipts"#,
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?;
            GeneralStats {
                total_supermarkets: ranking.len(),
                total_receipts,
                total_spent_overall: round2(total_spent_overall),
                avg_receipt_overall: round2(avg_receipt_overall),
            }
        };

        Ok(SupermarketRanking {
            cheapest_supermarket: ranking.first().cloned(),
            most_expensive_supermarket: ranking.last().cloned(),
            ranking,
            general_statistics,
        })
    }
}
