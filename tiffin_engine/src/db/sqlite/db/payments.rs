use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayment, PaymentLog, PaymentStatus},
    traits::MarketplaceError,
};

pub async fn insert_payment(
    payment: NewPayment,
    conn: &mut SqliteConnection,
) -> Result<PaymentLog, MarketplaceError> {
    let merchant_ref = payment.merchant_ref.clone();
    let log = sqlx::query_as(
        r#"
            INSERT INTO payments (txid, merchant_ref, mode, status, customer_id, amount, gateway_order_id, gateway_token)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(payment.txid)
    .bind(payment.merchant_ref)
    .bind(payment.mode)
    .bind(payment.status)
    .bind(payment.customer_id)
    .bind(payment.amount)
    .bind(payment.gateway_order_id)
    .bind(payment.gateway_token)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            MarketplaceError::PaymentAlreadyExists(merchant_ref)
        },
        _ => MarketplaceError::from(e),
    })?;
    Ok(log)
}

pub async fn fetch_payment(id: i64, conn: &mut SqliteConnection) -> Result<Option<PaymentLog>, MarketplaceError> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_by_merchant_ref(
    merchant_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentLog>, MarketplaceError> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE merchant_ref = $1")
        .bind(merchant_ref)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

/// Webhook lookups match the merchant reference first and fall back to the gateway's own order id.
pub async fn fetch_by_ref_or_gateway_id(
    merchant_ref: &str,
    gateway_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentLog>, MarketplaceError> {
    let payment = sqlx::query_as(
        "SELECT * FROM payments WHERE merchant_ref = $1 OR gateway_order_id = $2 ORDER BY merchant_ref = $1 DESC LIMIT 1",
    )
    .bind(merchant_ref)
    .bind(gateway_order_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// Conditional status transition, keyed off the current value. Returns the updated row, or `None` when the payment
/// was not in `from` (the caller decides whether that is a no-op or an error).
pub async fn transition_status(
    id: i64,
    from: PaymentStatus,
    to: PaymentStatus,
    gateway_state: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentLog>, MarketplaceError> {
    let payment = sqlx::query_as(
        r#"
        UPDATE payments SET status = $1, gateway_state = COALESCE($2, gateway_state)
        WHERE id = $3 AND status = $4
        RETURNING *;
        "#,
    )
    .bind(to)
    .bind(gateway_state)
    .bind(id)
    .bind(from)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// Refreshes the stored raw gateway state without touching the status (used on idempotent webhook replays).
pub async fn record_gateway_state(
    id: i64,
    gateway_state: &str,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    sqlx::query("UPDATE payments SET gateway_state = $1 WHERE id = $2")
        .bind(gateway_state)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Marks every delivered-but-unsettled COD payment for the rider as settled by `admin_id`. Returns the count.
pub async fn settle_cod_for_rider(
    rider_id: i64,
    admin_id: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, MarketplaceError> {
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET is_settled = 1, settled_at = CURRENT_TIMESTAMP, settled_by = $1
        WHERE is_settled = 0 AND mode = 'COD' AND status = 'SUCCESS'
          AND id IN (SELECT payment_id FROM past_orders WHERE rider_id = $2)
        "#,
    )
    .bind(admin_id)
    .bind(rider_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
