use log::trace;
use sqlx::SqliteConnection;
use tfn_common::Paise;

use crate::{
    db_types::{ClaimTelemetry, LiveOrder, Rider, RiderMetaData},
    traits::{MarketplaceError, UnsettledOrder},
};

pub async fn fetch_rider(id: i64, conn: &mut SqliteConnection) -> Result<Option<Rider>, MarketplaceError> {
    let rider = sqlx::query_as("SELECT * FROM riders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(rider)
}

pub async fn fetch_serving_order(
    rider_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<LiveOrder>, MarketplaceError> {
    let order = sqlx::query_as("SELECT * FROM live_orders WHERE rider_id = $1 LIMIT 1")
        .bind(rider_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn insert_meta(
    rider_id: i64,
    telemetry: &ClaimTelemetry,
    conn: &mut SqliteConnection,
) -> Result<RiderMetaData, MarketplaceError> {
    let meta = sqlx::query_as(
        r#"
            INSERT INTO rider_meta (rider_id, accepted_latitude, accepted_longitude, restaurant_distance_m, customer_distance_m)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(rider_id)
    .bind(telemetry.latitude)
    .bind(telemetry.longitude)
    .bind(telemetry.restaurant_distance_m)
    .bind(telemetry.customer_distance_m)
    .fetch_one(conn)
    .await?;
    Ok(meta)
}

pub async fn latest_meta_for_rider(
    rider_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<RiderMetaData>, MarketplaceError> {
    let meta = sqlx::query_as("SELECT * FROM rider_meta WHERE rider_id = $1 ORDER BY id DESC LIMIT 1")
        .bind(rider_id)
        .fetch_optional(conn)
        .await?;
    Ok(meta)
}

/// The monotone timestamp columns on `rider_meta`. Each is set once via COALESCE and never reverted.
#[derive(Debug, Clone, Copy)]
pub enum MetaStamp {
    ReachedRestaurant,
    PickupConfirmed,
    Drop,
    Delivered,
}

impl MetaStamp {
    fn column(self) -> &'static str {
        match self {
            MetaStamp::ReachedRestaurant => "reached_restaurant_at",
            MetaStamp::PickupConfirmed => "pickup_confirmed_at",
            MetaStamp::Drop => "drop_at",
            MetaStamp::Delivered => "delivered_at",
        }
    }
}

pub async fn stamp_meta(
    meta_id: i64,
    stamp: MetaStamp,
    conn: &mut SqliteConnection,
) -> Result<Option<RiderMetaData>, MarketplaceError> {
    let column = stamp.column();
    let sql =
        format!("UPDATE rider_meta SET {column} = COALESCE({column}, CURRENT_TIMESTAMP) WHERE id = $1 RETURNING *");
    let meta = sqlx::query_as(&sql).bind(meta_id).fetch_optional(conn).await?;
    Ok(meta)
}

pub async fn set_selfie(
    meta_id: i64,
    selfie_url: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<RiderMetaData>, MarketplaceError> {
    let meta = sqlx::query_as(
        r#"
        UPDATE rider_meta
        SET selfie_url = $1, reached_restaurant_at = COALESCE(reached_restaurant_at, CURRENT_TIMESTAMP)
        WHERE id = $2
        RETURNING *;
        "#,
    )
    .bind(selfie_url)
    .bind(meta_id)
    .fetch_optional(conn)
    .await?;
    Ok(meta)
}

/// Best-effort secondary state after a won claim.
pub async fn mark_serving(rider_id: i64, order_id: i64, conn: &mut SqliteConnection) -> Result<(), MarketplaceError> {
    sqlx::query(
        "UPDATE riders SET is_available = 0, serving_order = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
    )
    .bind(order_id)
    .bind(rider_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Frees the rider once their order leaves the live set.
pub async fn free_rider(rider_id: i64, conn: &mut SqliteConnection) -> Result<(), MarketplaceError> {
    sqlx::query(
        "UPDATE riders SET is_available = 1, serving_order = NULL, updated_at = CURRENT_TIMESTAMP WHERE id = $1",
    )
    .bind(rider_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn toggle_duty(rider_id: i64, conn: &mut SqliteConnection) -> Result<Option<Rider>, MarketplaceError> {
    let rider = sqlx::query_as(
        "UPDATE riders SET on_duty = NOT on_duty, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
    )
    .bind(rider_id)
    .fetch_optional(conn)
    .await?;
    Ok(rider)
}

pub async fn set_blocked(
    rider_id: i64,
    blocked: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<Rider>, MarketplaceError> {
    let rider = sqlx::query_as("UPDATE riders SET is_blocked = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(blocked)
        .bind(rider_id)
        .fetch_optional(conn)
        .await?;
    Ok(rider)
}

/// Total delivered COD cash the rider has collected but not yet deposited.
pub async fn unsettled_cod_total(rider_id: i64, conn: &mut SqliteConnection) -> Result<Paise, MarketplaceError> {
    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(payments.amount), 0)
        FROM past_orders JOIN payments ON past_orders.payment_id = payments.id
        WHERE past_orders.rider_id = $1 AND past_orders.status = 'DELIVERED'
          AND payments.mode = 'COD' AND payments.status = 'SUCCESS' AND payments.is_settled = 0
        "#,
    )
    .bind(rider_id)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Rider {rider_id} unsettled COD total: {total}");
    Ok(Paise::from(total))
}

pub async fn unsettled_cod_orders(
    rider_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<UnsettledOrder>, MarketplaceError> {
    let orders = sqlx::query_as(
        r#"
        SELECT past_orders.id AS order_id,
               past_orders.ticket AS ticket,
               hotels.name AS hotel_name,
               payments.amount AS amount,
               past_orders.delivered_at AS delivered_at
        FROM past_orders
        JOIN payments ON past_orders.payment_id = payments.id
        JOIN hotels ON past_orders.hotel_id = hotels.id
        WHERE past_orders.rider_id = $1 AND past_orders.status = 'DELIVERED'
          AND payments.mode = 'COD' AND payments.status = 'SUCCESS' AND payments.is_settled = 0
        ORDER BY past_orders.delivered_at DESC
        "#,
    )
    .bind(rider_id)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
