use chrono::Duration;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{DraftOrder, DraftStatus, NewOrder, OrderLine},
    traits::MarketplaceError,
};

/// Inserts the draft with its item lines. Exactly one draft may reference a payment; the unique constraint turns a
/// duplicate attempt into [`MarketplaceError::DraftAlreadyExists`] instead of a silent overwrite.
pub async fn insert_draft(
    payment_id: i64,
    order: &NewOrder,
    ticket: i64,
    otp: i64,
    conn: &mut SqliteConnection,
) -> Result<DraftOrder, MarketplaceError> {
    let draft: DraftOrder = sqlx::query_as(
        r#"
            INSERT INTO draft_orders (ticket, otp, customer_id, hotel_id, payment_id, location_index, total_price, remarks)
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
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => MarketplaceError::DraftAlreadyExists(payment_id),
        _ => MarketplaceError::from(e),
    })?;
    for line in &order.lines {
        sqlx::query("INSERT INTO draft_order_items (draft_id, listing_id, quantity) VALUES ($1, $2, $3)")
            .bind(draft.id)
            .bind(line.listing_id)
            .bind(line.quantity)
            .execute(&mut *conn)
            .await?;
    }
    debug!("🗃️ Draft order {} created for payment {payment_id}", draft.ticket);
    Ok(draft)
}

pub async fn fetch_draft_by_payment(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<DraftOrder>, MarketplaceError> {
    let draft = sqlx::query_as("SELECT * FROM draft_orders WHERE payment_id = $1")
        .bind(payment_id)
        .fetch_optional(conn)
        .await?;
    Ok(draft)
}

/// Atomically claims the draft for promotion: `AWAITING_PAYMENT` → `CREATING_ORDER`. A replayed webhook loses this
/// race and gets `None` back, which the caller resolves to an idempotent no-op.
pub async fn claim_draft(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<DraftOrder>, MarketplaceError> {
    let draft = sqlx::query_as(
        r#"
        UPDATE draft_orders SET status = 'CREATING_ORDER', updated_at = CURRENT_TIMESTAMP
        WHERE payment_id = $1 AND status = 'AWAITING_PAYMENT'
        RETURNING *;
        "#,
    )
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    Ok(draft)
}

pub async fn set_draft_status(
    draft_id: i64,
    status: DraftStatus,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    sqlx::query("UPDATE draft_orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(status)
        .bind(draft_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Marks an awaiting draft as failed when the gateway reports a failed payment.
pub async fn mark_failed_by_payment(payment_id: i64, conn: &mut SqliteConnection) -> Result<(), MarketplaceError> {
    sqlx::query(
        "UPDATE draft_orders SET status = 'FAILED', updated_at = CURRENT_TIMESTAMP WHERE payment_id = $1 AND status = 'AWAITING_PAYMENT'",
    )
    .bind(payment_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn draft_lines(draft_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderLine>, MarketplaceError> {
    let rows: Vec<(i64, i64)> =
        sqlx::query_as("SELECT listing_id, quantity FROM draft_order_items WHERE draft_id = $1")
            .bind(draft_id)
            .fetch_all(conn)
            .await?;
    Ok(rows.into_iter().map(|(listing_id, quantity)| OrderLine { listing_id, quantity }).collect())
}

/// Cancels drafts that have waited for a payment confirmation longer than the TTL. Expired drafts stay in the table
/// (status `CANCELLED`) for audit; they are never resurrected.
pub async fn expire_stale(ttl: Duration, conn: &mut SqliteConnection) -> Result<Vec<DraftOrder>, MarketplaceError> {
    let rows = sqlx::query_as(
        format!(
            "UPDATE draft_orders SET status = 'CANCELLED', updated_at = CURRENT_TIMESTAMP WHERE status = \
             'AWAITING_PAYMENT' AND (unixepoch(CURRENT_TIMESTAMP) - unixepoch(created_at)) > {} RETURNING *;",
            ttl.num_seconds()
        )
        .as_str(),
    )
    .fetch_all(conn)
    .await?;
    trace!("🗃️ {} stale drafts expired", rows.len());
    Ok(rows)
}
