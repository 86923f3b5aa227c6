use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use std::str::FromStr;
use ulid::Ulid;

use crate::utils::pagination::{Paginated, Pagination};

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "CONFIRMED")]
    Confirmed,
    #[serde(rename = "PREPARING")]
    Preparing,
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "DELIVERING")]
    Delivering,
    #[serde(rename = "DELIVERED")]
    Delivered,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl ToString for OrderStatus {
    fn to_string(&self) -> String {
        match self {
            OrderStatus::Pending => String::from("PENDING"),
            OrderStatus::Confirmed => String::from("CONFIRMED"),
            OrderStatus::Preparing => String::from("PREPARING"),
            OrderStatus::Ready => String::from("READY"),
            OrderStatus::Delivering => String::from("DELIVERING"),
            OrderStatus::Delivered => String::from("DELIVERED"),
            OrderStatus::Cancelled => String::from("CANCELLED"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "PREPARING" => Ok(OrderStatus::Preparing),
            "READY" => Ok(OrderStatus::Ready),
            "DELIVERING" => Ok(OrderStatus::Delivering),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            _ => Err(format!("'{}' is not a valid OrderStatus", s)),
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The delivery pipeline advances one step at a time; cancellation is
    /// reachable from any non-terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match (self, next) {
            (OrderStatus::Pending, OrderStatus::Confirmed)
            | (OrderStatus::Confirmed, OrderStatus::Preparing)
            | (OrderStatus::Preparing, OrderStatus::Ready)
            | (OrderStatus::Ready, OrderStatus::Delivering)
            | (OrderStatus::Delivering, OrderStatus::Delivered) => true,
            (from, OrderStatus::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, sqlx::FromRow)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub subtotal: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub tax: BigDecimal,
    pub total: BigDecimal,
    pub eta: String,
    pub delivery_notes: Option<String>,
    pub is_express: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Serialize, Deserialize, Clone, Debug, sqlx::FromRow)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub meal_id: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Serialize, Clone, Debug)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn with_items(self, items: Vec<OrderItem>) -> OrderWithItems {
        OrderWithItems { order: self, items }
    }
}

pub struct CreateOrderPayload {
    pub user_id: String,
    pub subtotal: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub tax: BigDecimal,
    pub total: BigDecimal,
    pub eta: String,
    pub delivery_notes: Option<String>,
    pub is_express: bool,
}

pub async fn create<'e, E>(e: E, payload: CreateOrderPayload) -> Result<Order>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Order>(
        "
        INSERT INTO orders (
            id, user_id, subtotal, delivery_fee, tax, total, eta,
            delivery_notes, is_express
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.user_id.clone())
    .bind(payload.subtotal)
    .bind(payload.delivery_fee)
    .bind(payload.tax)
    .bind(payload.total)
    .bind(payload.eta)
    .bind(payload.delivery_notes)
    .bind(payload.is_express)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while creating an order for user with id {}: {}",
            payload.user_id,
            err
        );
        Error::UnexpectedError
    })
}

pub struct CreateOrderItemPayload {
    pub order_id: String,
    pub meal_id: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

pub async fn create_item<'e, E: PgExecutor<'e>>(
    e: E,
    payload: CreateOrderItemPayload,
) -> Result<OrderItem> {
    sqlx::query_as::<_, OrderItem>(
        "
        INSERT INTO order_items (id, order_id, meal_id, quantity, unit_price)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.order_id.clone())
    .bind(payload.meal_id)
    .bind(payload.quantity)
    .bind(payload.unit_price)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while creating an item for order with id {}: {}",
            payload.order_id,
            err
        );
        Error::UnexpectedError
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<Option<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id.clone())
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while fetching order with id {}: {}",
                id,
                err
            );
            Error::UnexpectedError
        })
}

pub async fn find_items_by_order_id<'e, E: PgExecutor<'e>>(
    e: E,
    order_id: String,
) -> Result<Vec<OrderItem>> {
    sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id.clone())
        .fetch_all(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while fetching items for order with id {}: {}",
                order_id,
                err
            );
            Error::UnexpectedError
        })
}

pub async fn find_many_by_user_id<'e, E: PgExecutor<'e> + Clone>(
    e: E,
    pagination: Pagination,
    user_id: String,
) -> Result<Paginated<Order>> {
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id.clone())
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(e.clone())
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while fetching orders for user with id {}: {}",
            user_id,
            err
        );
        Error::UnexpectedError
    })?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user_id.clone())
        .fetch_one(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while counting orders for user with id {}: {}",
                user_id,
                err
            );
            Error::UnexpectedError
        })?;

    Ok(Paginated::new(
        orders,
        total as u32,
        pagination.page,
        pagination.per_page,
    ))
}

/// Orders visible to a chef: those containing at least one item whose meal
/// the chef owns, each order listed once.
pub async fn find_many_by_chef_id<'e, E: PgExecutor<'e> + Clone>(
    e: E,
    pagination: Pagination,
    chef_id: String,
) -> Result<Paginated<Order>> {
    let orders = sqlx::query_as::<_, Order>(
        "
        SELECT o.* FROM orders o
        WHERE EXISTS (
            SELECT 1 FROM order_items oi
            JOIN meals m ON m.id = oi.meal_id
            WHERE oi.order_id = o.id AND m.chef_id = $1
        )
        ORDER BY o.created_at DESC
        LIMIT $2 OFFSET $3
        ",
    )
    .bind(chef_id.clone())
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(e.clone())
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while fetching orders for chef with id {}: {}",
            chef_id,
            err
        );
        Error::UnexpectedError
    })?;

    let (total,): (i64,) = sqlx::query_as(
        "
        SELECT COUNT(*) FROM orders o
        WHERE EXISTS (
            SELECT 1 FROM order_items oi
            JOIN meals m ON m.id = oi.meal_id
            WHERE oi.order_id = o.id AND m.chef_id = $1
        )
        ",
    )
    .bind(chef_id.clone())
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while counting orders for chef with id {}: {}",
            chef_id,
            err
        );
        Error::UnexpectedError
    })?;

    Ok(Paginated::new(
        orders,
        total as u32,
        pagination.page,
        pagination.per_page,
    ))
}

pub async fn chef_owns_item_in_order<'e, E: PgExecutor<'e>>(
    e: E,
    order_id: String,
    chef_id: String,
) -> Result<bool> {
    let (owns,): (bool,) = sqlx::query_as(
        "
        SELECT EXISTS (
            SELECT 1 FROM order_items oi
            JOIN meals m ON m.id = oi.meal_id
            WHERE oi.order_id = $1 AND m.chef_id = $2
        )
        ",
    )
    .bind(order_id.clone())
    .bind(chef_id)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while checking chef ownership for order with id {}: {}",
            order_id,
            err
        );
        Error::UnexpectedError
    })?;

    Ok(owns)
}

pub async fn update_status_by_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: String,
    status: OrderStatus,
) -> Result<()> {
    sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status.to_string())
        .bind(id.clone())
        .execute(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while updating status of order with id {}: {}",
                id,
                err
            );
            Error::UnexpectedError
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_string_form() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Delivering,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let parsed = status.to_string().parse::<OrderStatus>().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn pipeline_advances_one_step_at_a_time() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Preparing));
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::Ready));
        assert!(OrderStatus::Ready.can_transition_to(OrderStatus::Delivering));
        assert!(OrderStatus::Delivering.can_transition_to(OrderStatus::Delivered));

        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Preparing));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Confirmed));
    }

    #[test]
    fn cancellation_is_reachable_from_any_non_terminal_state() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Delivering,
        ] {
            assert!(status.can_transition_to(OrderStatus::Cancelled));
        }

        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }
}
