//! Raw entities as loaded from the source tables.
//!
//! RULE: Records are immutable once a RecordStore is built.
//! Prior and train order lines are kept in separate collections;
//! train lines define labels, prior lines define history.

use crate::{
    error::{PipelineError, PipelineResult},
    types::{CategoryId, OrderId, ProductId, UserId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvalSet {
    Prior,
    Train,
    Test,
}

impl EvalSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prior => "prior",
            Self::Train => "train",
            Self::Test => "test",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "prior" => Some(Self::Prior),
            "train" => Some(Self::Train),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub eval_set: EvalSet,
    pub order_number: u32,
    /// None only for a user's first order.
    pub days_since_prior_order: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub add_to_cart_order: u32,
    pub reordered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub product_id: ProductId,
    pub product_name: String,
    pub category_id: CategoryId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub category_id: CategoryId,
    pub category_name: String,
}

/// Validated, keyed view over the raw entities.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    orders: BTreeMap<OrderId, Order>,
    prior_lines: Vec<OrderLine>,
    train_lines: Vec<OrderLine>,
    products: BTreeMap<ProductId, Product>,
    categories: BTreeMap<CategoryId, Category>,
}

impl RecordStore {
    /// Build a store, rejecting malformed input before any aggregation runs.
    ///
    /// Fatal: duplicate order/product/category keys, order_number < 1,
    /// add_to_cart_order < 1, negative or non-finite day gaps. Lines whose
    /// order is unknown or sits in the other eval set are kept here and
    /// dropped by the join.
    pub fn new(
        orders: Vec<Order>,
        prior_lines: Vec<OrderLine>,
        train_lines: Vec<OrderLine>,
        products: Vec<Product>,
        categories: Vec<Category>,
    ) -> PipelineResult<Self> {
        let mut order_map = BTreeMap::new();
        for order in orders {
            if order.order_number < 1 {
                return Err(invalid("orders", "order_number", format!(
                    "order {} has order_number 0", order.order_id
                )));
            }
            if let Some(days) = order.days_since_prior_order {
                if !days.is_finite() || days < 0.0 {
                    return Err(invalid("orders", "days_since_prior_order", format!(
                        "order {} has gap {days}", order.order_id
                    )));
                }
            }
            let id = order.order_id;
            if order_map.insert(id, order).is_some() {
                return Err(PipelineError::DuplicateKey {
                    table: "orders".into(),
                    key: id.to_string(),
                });
            }
        }

        check_lines("order_products_prior", &prior_lines)?;
        check_lines("order_products_train", &train_lines)?;

        let mut product_map = BTreeMap::new();
        for product in products {
            let id = product.product_id;
            if product_map.insert(id, product).is_some() {
                return Err(PipelineError::DuplicateKey {
                    table: "products".into(),
                    key: id.to_string(),
                });
            }
        }

        let mut category_map = BTreeMap::new();
        for category in categories {
            let id = category.category_id;
            if category_map.insert(id, category).is_some() {
                return Err(PipelineError::DuplicateKey {
                    table: "categories".into(),
                    key: id.to_string(),
                });
            }
        }

        let dangling = product_map
            .values()
            .filter(|p| !category_map.contains_key(&p.category_id))
            .count();
        if dangling > 0 {
            log::warn!("records: {dangling} products reference an unknown category");
        }

        Ok(Self {
            orders: order_map,
            prior_lines,
            train_lines,
            products: product_map,
            categories: category_map,
        })
    }

    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    /// All orders in order_id order.
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn orders_in(&self, sets: &[EvalSet]) -> impl Iterator<Item = &Order> + '_ {
        let sets = sets.to_vec();
        self.orders.values().filter(move |o| sets.contains(&o.eval_set))
    }

    pub fn prior_lines(&self) -> &[OrderLine] {
        &self.prior_lines
    }

    pub fn train_lines(&self) -> &[OrderLine] {
        &self.train_lines
    }

    pub fn product(&self, product_id: ProductId) -> Option<&Product> {
        self.products.get(&product_id)
    }

    /// Category name for a product, if both ends of the reference resolve.
    pub fn category_of(&self, product_id: ProductId) -> Option<&Category> {
        self.product(product_id)
            .and_then(|p| self.categories.get(&p.category_id))
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

fn check_lines(table: &str, lines: &[OrderLine]) -> PipelineResult<()> {
    if let Some(bad) = lines.iter().find(|l| l.add_to_cart_order < 1) {
        return Err(invalid(table, "add_to_cart_order", format!(
            "order {} product {} has add_to_cart_order 0",
            bad.order_id, bad.product_id
        )));
    }
    Ok(())
}

fn invalid(table: &str, field: &str, detail: String) -> PipelineError {
    PipelineError::InvalidValue {
        table: table.into(),
        field: field.into(),
        detail,
    }
}
