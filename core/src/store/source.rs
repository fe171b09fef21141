use super::ReorderStore;
use crate::{
    error::{PipelineError, PipelineResult},
    records::{Category, EvalSet, Order, OrderLine, Product, RecordStore},
};
use rusqlite::params;

/// Columns every source table must carry. Checked before anything is read.
pub const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    (
        "orders",
        &["order_id", "user_id", "eval_set", "order_number", "days_since_prior_order"],
    ),
    (
        "order_products_prior",
        &["order_id", "product_id", "add_to_cart_order", "reordered"],
    ),
    (
        "order_products_train",
        &["order_id", "product_id", "add_to_cart_order", "reordered"],
    ),
    ("products", &["product_id", "product_name", "category_id"]),
    ("categories", &["category_id", "category_name"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSet {
    Prior,
    Train,
}

impl LineSet {
    fn table(&self) -> &'static str {
        match self {
            Self::Prior => "order_products_prior",
            Self::Train => "order_products_train",
        }
    }
}

impl ReorderStore {
    // ── Schema ─────────────────────────────────────────────────

    /// Verify every source table exists with its required columns.
    pub fn check_schema(&self) -> PipelineResult<()> {
        for (table, columns) in REQUIRED_COLUMNS {
            let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({table})"))?;
            let present = stmt
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<Result<Vec<_>, _>>()?;
            if present.is_empty() {
                return Err(PipelineError::Schema {
                    table: (*table).to_string(),
                    detail: "table does not exist".into(),
                });
            }
            for column in columns.iter() {
                if !present.iter().any(|c| c == column) {
                    return Err(PipelineError::MissingColumn {
                        table: (*table).to_string(),
                        column: (*column).to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    // ── Inserts ────────────────────────────────────────────────

    pub fn insert_orders(&self, orders: &[Order]) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO orders (order_id, user_id, eval_set, order_number, days_since_prior_order)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for o in orders {
                stmt.execute(params![
                    o.order_id as i64,
                    o.user_id as i64,
                    o.eval_set.as_str(),
                    o.order_number as i64,
                    o.days_since_prior_order,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_order_lines(&self, set: LineSet, lines: &[OrderLine]) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (order_id, product_id, add_to_cart_order, reordered)
                 VALUES (?1, ?2, ?3, ?4)",
                set.table()
            ))?;
            for l in lines {
                stmt.execute(params![
                    l.order_id as i64,
                    l.product_id as i64,
                    l.add_to_cart_order as i64,
                    if l.reordered { 1 } else { 0 },
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_products(&self, products: &[Product]) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO products (product_id, product_name, category_id) VALUES (?1, ?2, ?3)",
            )?;
            for p in products {
                stmt.execute(params![p.product_id as i64, p.product_name, p.category_id as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_categories(&self, categories: &[Category]) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO categories (category_id, category_name) VALUES (?1, ?2)",
            )?;
            for c in categories {
                stmt.execute(params![c.category_id as i64, c.category_name])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // ── Load ───────────────────────────────────────────────────

    /// Read the full source snapshot into a validated RecordStore.
    /// Runs check_schema() first so missing columns abort before any read.
    pub fn load_records(&self) -> PipelineResult<RecordStore> {
        self.check_schema()?;

        let orders = self.load_orders()?;
        let prior = self.load_lines(LineSet::Prior)?;
        let train = self.load_lines(LineSet::Train)?;
        let products = self.load_products()?;
        let categories = self.load_categories()?;

        log::info!(
            "store: loaded orders={} prior_lines={} train_lines={} products={} categories={}",
            orders.len(),
            prior.len(),
            train.len(),
            products.len(),
            categories.len(),
        );

        RecordStore::new(orders, prior, train, products, categories)
    }

    fn load_orders(&self) -> PipelineResult<Vec<Order>> {
        let mut stmt = self.conn.prepare(
            "SELECT order_id, user_id, eval_set, order_number, days_since_prior_order
             FROM orders ORDER BY order_id ASC",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(order_id, user_id, eval_set, order_number, days)| {
                let eval_set = EvalSet::parse(&eval_set).ok_or_else(|| {
                    invalid("orders", "eval_set", format!("order {order_id}: '{eval_set}'"))
                })?;
                Ok(Order {
                    order_id: to_id("orders", "order_id", order_id)?,
                    user_id: to_id("orders", "user_id", user_id)?,
                    eval_set,
                    order_number: to_u32("orders", "order_number", order_number)?,
                    days_since_prior_order: days,
                })
            })
            .collect()
    }

    fn load_lines(&self, set: LineSet) -> PipelineResult<Vec<OrderLine>> {
        let table = set.table();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT order_id, product_id, add_to_cart_order, reordered
             FROM {table} ORDER BY rowid ASC"
        ))?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(order_id, product_id, cart, reordered)| {
                let reordered = match reordered {
                    0 => false,
                    1 => true,
                    other => {
                        return Err(invalid(table, "reordered", format!(
                            "order {order_id} product {product_id}: {other}"
                        )))
                    }
                };
                Ok(OrderLine {
                    order_id: to_id(table, "order_id", order_id)?,
                    product_id: to_id(table, "product_id", product_id)?,
                    add_to_cart_order: to_u32(table, "add_to_cart_order", cart)?,
                    reordered,
                })
            })
            .collect()
    }

    fn load_products(&self) -> PipelineResult<Vec<Product>> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, product_name, category_id FROM products ORDER BY product_id ASC",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(product_id, product_name, category_id)| {
                Ok(Product {
                    product_id: to_id("products", "product_id", product_id)?,
                    product_name,
                    category_id: to_id("products", "category_id", category_id)?,
                })
            })
            .collect()
    }

    fn load_categories(&self) -> PipelineResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(
            "SELECT category_id, category_name FROM categories ORDER BY category_id ASC",
        )?;
        let raw = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(category_id, category_name)| {
                Ok(Category {
                    category_id: to_id("categories", "category_id", category_id)?,
                    category_name,
                })
            })
            .collect()
    }
}

fn to_id(table: &str, field: &str, raw: i64) -> PipelineResult<u64> {
    u64::try_from(raw).map_err(|_| invalid(table, field, format!("negative id {raw}")))
}

fn to_u32(table: &str, field: &str, raw: i64) -> PipelineResult<u32> {
    u32::try_from(raw).map_err(|_| invalid(table, field, format!("out of range: {raw}")))
}

fn invalid(table: &str, field: &str, detail: String) -> PipelineError {
    PipelineError::InvalidValue {
        table: table.into(),
        field: field.into(),
        detail,
    }
}
