use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::Arc;

use super::repository::{self, OrderWithItems};
use crate::modules::meal;
use crate::modules::user::repository::User;
use crate::types::Context;

pub const FREE_DELIVERY_THRESHOLD: &str = "25";
pub const STANDARD_DELIVERY_FEE: &str = "3.99";
pub const EXPRESS_DELIVERY_FEE: &str = "5.99";
pub const TAX_RATE: &str = "0.08";

pub const STANDARD_ETA: &str = "30-45 minutes";
pub const EXPRESS_ETA: &str = "15-25 minutes";

#[derive(Debug)]
pub enum Error {
    /// A requested meal doesn't exist or is no longer on the catalog. The
    /// whole order is rejected; nothing is persisted.
    MealUnavailable(String),
    InvalidQuantity(String),
    UnexpectedError,
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq)]
pub struct Pricing {
    pub subtotal: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub tax: BigDecimal,
    pub total: BigDecimal,
}

/// Recomputes every monetary field from the current catalog prices. Client
/// submitted amounts are never consulted.
pub fn price_cart(lines: &[(BigDecimal, i32)], is_express: bool) -> Pricing {
    let subtotal: BigDecimal = lines
        .iter()
        .map(|(unit_price, quantity)| unit_price * BigDecimal::from(*quantity))
        .sum();

    let threshold = BigDecimal::from_str(FREE_DELIVERY_THRESHOLD).unwrap();
    let delivery_fee = if is_express {
        BigDecimal::from_str(EXPRESS_DELIVERY_FEE).unwrap()
    } else if subtotal >= threshold {
        BigDecimal::from(0)
    } else {
        BigDecimal::from_str(STANDARD_DELIVERY_FEE).unwrap()
    };

    let tax = &subtotal * BigDecimal::from_str(TAX_RATE).unwrap();
    let total = &subtotal + &delivery_fee + &tax;

    Pricing {
        subtotal,
        delivery_fee,
        tax,
        total,
    }
}

pub fn eta_label(is_express: bool) -> &'static str {
    if is_express {
        EXPRESS_ETA
    } else {
        STANDARD_ETA
    }
}

pub struct PlaceOrderPayload {
    pub user: User,
    pub items: Vec<(String, i32)>,
    pub delivery_notes: Option<String>,
    pub is_express: bool,
}

/// Places an order in one transaction: every requested meal is resolved
/// against the live catalog, pricing is recomputed server-side, and the
/// order plus its line items land together or not at all.
pub async fn place(ctx: Arc<Context>, payload: PlaceOrderPayload) -> Result<OrderWithItems> {
    let mut tx = ctx.db_conn.pool.begin().await.map_err(|err| {
        tracing::error!("Failed to start database transaction: {}", err);
        Error::UnexpectedError
    })?;

    let mut lines: Vec<(meal::repository::Meal, i32)> = Vec::with_capacity(payload.items.len());

    for (meal_id, quantity) in payload.items {
        if quantity < 1 {
            return Err(Error::InvalidQuantity(meal_id));
        }

        let meal = meal::repository::find_active_by_id(&mut *tx, meal_id.clone())
            .await
            .map_err(|_| Error::UnexpectedError)?
            .ok_or(Error::MealUnavailable(meal_id))?;

        lines.push((meal, quantity));
    }

    let priced: Vec<(BigDecimal, i32)> = lines
        .iter()
        .map(|(meal, quantity)| (meal.price.clone(), *quantity))
        .collect();
    let pricing = price_cart(&priced, payload.is_express);

    let order = repository::create(
        &mut *tx,
        repository::CreateOrderPayload {
            user_id: payload.user.id,
            subtotal: pricing.subtotal,
            delivery_fee: pricing.delivery_fee,
            tax: pricing.tax,
            total: pricing.total,
            eta: eta_label(payload.is_express).to_string(),
            delivery_notes: payload.delivery_notes,
            is_express: payload.is_express,
        },
    )
    .await
    .map_err(|_| Error::UnexpectedError)?;

    let mut items = Vec::with_capacity(lines.len());

    for (meal, quantity) in lines {
        let item = repository::create_item(
            &mut *tx,
            repository::CreateOrderItemPayload {
                order_id: order.id.clone(),
                meal_id: meal.id,
                quantity,
                // Snapshotted: later catalog price changes leave placed
                // orders untouched.
                unit_price: meal.price,
            },
        )
        .await
        .map_err(|_| Error::UnexpectedError)?;

        items.push(item);
    }

    tx.commit().await.map_err(|err| {
        tracing::error!("Failed to commit database transaction: {}", err);
        Error::UnexpectedError
    })?;

    Ok(order.with_items(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    #[test]
    fn small_cart_pays_standard_delivery() {
        let pricing = price_cart(&[(money("10.00"), 2)], false);
        assert_eq!(pricing.subtotal, money("20.00"));
        assert_eq!(pricing.delivery_fee, money("3.99"));
        assert_eq!(pricing.tax, money("1.60"));
        assert_eq!(pricing.total, money("25.59"));
    }

    #[test]
    fn express_fee_overrides_the_subtotal_rule() {
        let pricing = price_cart(&[(money("10.00"), 2)], true);
        assert_eq!(pricing.delivery_fee, money("5.99"));
        assert_eq!(pricing.total, money("27.59"));

        // even a cart over the free-delivery threshold pays the express fee
        let pricing = price_cart(&[(money("30.00"), 1)], true);
        assert_eq!(pricing.delivery_fee, money("5.99"));
    }

    #[test]
    fn subtotal_at_threshold_ships_free() {
        let pricing = price_cart(&[(money("30.00"), 1)], false);
        assert_eq!(pricing.delivery_fee, money("0"));
        assert_eq!(pricing.tax, money("2.40"));
        assert_eq!(pricing.total, money("32.40"));

        let pricing = price_cart(&[(money("25.00"), 1)], false);
        assert_eq!(pricing.delivery_fee, money("0"));
    }

    #[test]
    fn empty_cart_prices_to_the_delivery_fee() {
        let pricing = price_cart(&[], false);
        assert_eq!(pricing.subtotal, money("0"));
        assert_eq!(pricing.total, money("3.99"));
    }

    #[test]
    fn eta_is_a_fixed_label() {
        assert_eq!(eta_label(false), "30-45 minutes");
        assert_eq!(eta_label(true), "15-25 minutes");
    }
}
