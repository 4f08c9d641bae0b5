use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;
use tfn_common::Paise;

use crate::{
    db_types::{
        CustomerAddress,
        LiveOrder,
        NewOrder,
        OrderLine,
        OrderStatus,
        PastOrder,
        PastOrderItem,
        RestaurantStatus,
    },
    traits::{MarketplaceError, OrderLineView},
};

/// Inserts a live order with its item lines. Not atomic on its own; run it inside a transaction.
pub async fn insert_live_order(
    order: &NewOrder,
    ticket: i64,
    otp: i64,
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<LiveOrder, MarketplaceError> {
    let live: LiveOrder = sqlx::query_as(
        r#"
            INSERT INTO live_orders (ticket, otp, customer_id, hotel_id, payment_id, location_index, total_price, remarks)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(ticket)
    .bind(otp)
    .bind(order.customer_id)
    .bind(order.hotel_id)
    .bind(payment_id)
    .bind(order.location_index)
    .bind(order.total_price)
    .bind(order.remarks.as_deref())
    .fetch_one(&mut *conn)
    .await?;
    insert_live_items(live.id, &order.lines, conn).await?;
    trace!("🗃️ Live order {} inserted with id {}", live.ticket, live.id);
    Ok(live)
}

pub async fn insert_live_items(
    order_id: i64,
    lines: &[OrderLine],
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    for line in lines {
        sqlx::query("INSERT INTO live_order_items (order_id, listing_id, quantity) VALUES ($1, $2, $3)")
            .bind(order_id)
            .bind(line.listing_id)
            .bind(line.quantity)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn fetch_live_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<LiveOrder>, MarketplaceError> {
    let order = sqlx::query_as("SELECT * FROM live_orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn live_orders_for_customer(
    customer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<LiveOrder>, MarketplaceError> {
    let orders = sqlx::query_as("SELECT * FROM live_orders WHERE customer_id = $1 ORDER BY ordered_at ASC")
        .bind(customer_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

pub async fn live_orders_for_hotel(
    hotel_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<LiveOrder>, MarketplaceError> {
    let orders = sqlx::query_as("SELECT * FROM live_orders WHERE hotel_id = $1 ORDER BY ordered_at ASC")
        .bind(hotel_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Orders a rider may bid on: the kitchen is at least `ALMOST_READY` and no claim has succeeded yet.
pub async fn biddable_orders(conn: &mut SqliteConnection) -> Result<Vec<LiveOrder>, MarketplaceError> {
    let orders = sqlx::query_as(
        r#"
        SELECT * FROM live_orders
        WHERE status = 'PREPARING' AND restaurant_status IN ('ALMOST_READY', 'READY')
        ORDER BY ordered_at ASC
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// The rider-claim compare-and-swap. One conditional UPDATE; SQLite serialises writers, so of N racing riders
/// exactly one sees a row come back. Matches either the unclaimed biddable state or an idempotent re-claim by the
/// holder while the order is still `ACCEPTED`.
pub async fn try_claim(
    rider_id: i64,
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<LiveOrder>, MarketplaceError> {
    let order = sqlx::query_as(
        r#"
        UPDATE live_orders
        SET status = 'ACCEPTED', rider_id = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2
          AND (
            (rider_id IS NULL AND status = 'PREPARING' AND restaurant_status IN ('ALMOST_READY', 'READY'))
            OR (rider_id = $1 AND status = 'ACCEPTED')
          )
        RETURNING *;
        "#,
    )
    .bind(rider_id)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn set_rider_meta(
    order_id: i64,
    meta_id: i64,
    conn: &mut SqliteConnection,
) -> Result<LiveOrder, MarketplaceError> {
    let order = sqlx::query_as("UPDATE live_orders SET rider_meta_id = $1 WHERE id = $2 RETURNING *")
        .bind(meta_id)
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    order.ok_or(MarketplaceError::OrderNotFound(order_id))
}

pub async fn restaurant_accept(
    order_id: i64,
    preparation_minutes: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<LiveOrder>, MarketplaceError> {
    let order = sqlx::query_as(
        r#"
        UPDATE live_orders
        SET status = 'PREPARING', preparation_minutes = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND status = 'PENDING'
        RETURNING *;
        "#,
    )
    .bind(preparation_minutes)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Kitchen sub-state transition, forward only. `READY` stamps `served_at` the first time it is reached.
pub async fn advance_restaurant_status(
    order_id: i64,
    to: RestaurantStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<LiveOrder>, MarketplaceError> {
    let allowed_from = match to {
        RestaurantStatus::Preparing => return Ok(None),
        RestaurantStatus::AlmostReady => "('PREPARING')",
        RestaurantStatus::Ready => "('PREPARING', 'ALMOST_READY')",
    };
    let sql = format!(
        r#"
        UPDATE live_orders
        SET restaurant_status = $1,
            served_at = CASE WHEN $1 = 'READY' THEN COALESCE(served_at, CURRENT_TIMESTAMP) ELSE served_at END,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND status IN ('PREPARING', 'ACCEPTED') AND restaurant_status IN {allowed_from}
        RETURNING *;
        "#
    );
    let order = sqlx::query_as(&sql).bind(to).bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

/// Pickup confirmation, gated on the kitchen being `READY`.
pub async fn confirm_pickup(
    rider_id: i64,
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<LiveOrder>, MarketplaceError> {
    let order = sqlx::query_as(
        r#"
        UPDATE live_orders
        SET status = 'PICKEDUP', updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND rider_id = $2 AND status = 'ACCEPTED' AND restaurant_status = 'READY'
        RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(rider_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn confirm_drop(
    rider_id: i64,
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<LiveOrder>, MarketplaceError> {
    let order = sqlx::query_as(
        r#"
        UPDATE live_orders
        SET status = 'DROP', arrived_at = COALESCE(arrived_at, CURRENT_TIMESTAMP), updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND rider_id = $2 AND status = 'PICKEDUP'
        RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(rider_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn order_lines(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderLineView>, MarketplaceError> {
    let lines = sqlx::query_as(
        r#"
        SELECT listings.name AS name, live_order_items.quantity AS quantity
        FROM live_order_items JOIN listings ON live_order_items.listing_id = listings.id
        WHERE live_order_items.order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

pub async fn delete_live_order(order_id: i64, conn: &mut SqliteConnection) -> Result<(), MarketplaceError> {
    sqlx::query("DELETE FROM live_order_items WHERE order_id = $1").bind(order_id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM live_orders WHERE id = $1").bind(order_id).execute(conn).await?;
    Ok(())
}

/// A denormalised item line headed for the archive: (listing id, captured name, captured unit price, quantity).
pub type ArchivedLine = (i64, String, Paise, i64);

/// Snapshots the live order's item lines against the *current* catalog. This is the moment the archival record
/// decouples from the mutable listings.
pub async fn archived_lines(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<ArchivedLine>, MarketplaceError> {
    let lines: Vec<ArchivedLine> = sqlx::query_as(
        r#"
        SELECT live_order_items.listing_id, listings.name, listings.price, live_order_items.quantity
        FROM live_order_items JOIN listings ON live_order_items.listing_id = listings.id
        WHERE live_order_items.order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

/// Writes the archival snapshot of a live order. The address is embedded and the items carry the name/price
/// captured by the caller at archive time.
#[allow(clippy::too_many_arguments)]
pub async fn insert_past_from_live(
    live: &LiveOrder,
    status: OrderStatus,
    reason: Option<&str>,
    address: &CustomerAddress,
    items: &[ArchivedLine],
    delivered_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<PastOrder, MarketplaceError> {
    let past: PastOrder = sqlx::query_as(
        r#"
        INSERT INTO past_orders (
            ticket, otp, status, reason, customer_id, hotel_id, rider_id, rider_meta_id, payment_id,
            addr_title, addr_latitude, addr_longitude, addr_house_no, addr_building, addr_landmark,
            total_price, remarks, preparation_minutes, ordered_at, served_at, arrived_at, delivered_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
        RETURNING *;
        "#,
    )
    .bind(live.ticket)
    .bind(live.otp)
    .bind(status)
    .bind(reason)
    .bind(live.customer_id)
    .bind(live.hotel_id)
    .bind(live.rider_id)
    .bind(live.rider_meta_id)
    .bind(live.payment_id)
    .bind(&address.title)
    .bind(address.latitude)
    .bind(address.longitude)
    .bind(address.house_no.as_deref())
    .bind(address.building.as_deref())
    .bind(address.landmark.as_deref())
    .bind(live.total_price)
    .bind(live.remarks.as_deref())
    .bind(live.preparation_minutes)
    .bind(live.ordered_at)
    .bind(live.served_at)
    .bind(live.arrived_at)
    .bind(delivered_at)
    .fetch_one(&mut *conn)
    .await?;
    for (listing_id, name, unit_price, quantity) in items {
        sqlx::query("INSERT INTO past_order_items (order_id, listing_id, name, unit_price, quantity) VALUES ($1, $2, $3, $4, $5)")
            .bind(past.id)
            .bind(listing_id)
            .bind(name)
            .bind(*unit_price)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;
    }
    Ok(past)
}

pub async fn past_orders_for_customer(
    customer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PastOrder>, MarketplaceError> {
    let orders = sqlx::query_as("SELECT * FROM past_orders WHERE customer_id = $1 ORDER BY ordered_at DESC")
        .bind(customer_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

pub async fn fetch_past_order_by_payment(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PastOrder>, MarketplaceError> {
    let order =
        sqlx::query_as("SELECT * FROM past_orders WHERE payment_id = $1").bind(payment_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn past_order_items(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PastOrderItem>, MarketplaceError> {
    let items = sqlx::query_as("SELECT * FROM past_order_items WHERE order_id = $1")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

pub async fn fetch_live_order_by_payment(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<LiveOrder>, MarketplaceError> {
    let order =
        sqlx::query_as("SELECT * FROM live_orders WHERE payment_id = $1").bind(payment_id).fetch_optional(conn).await?;
    Ok(order)
}
