use sqlx::SqliteConnection;

use crate::{
    db_types::{NewSettlement, PastOrder, Settlement, SettlementProof},
    helpers::SettlementWindow,
    traits::MarketplaceError,
};

pub async fn settlement_exists(
    hotel_id: i64,
    window: &SettlementWindow,
    conn: &mut SqliteConnection,
) -> Result<bool, MarketplaceError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM settlements WHERE hotel_id = $1 AND week_start = $2 AND week_end = $3 LIMIT 1",
    )
    .bind(hotel_id)
    .bind(window.start)
    .bind(window.end)
    .fetch_optional(conn)
    .await?;
    Ok(row.is_some())
}

/// Delivered past orders whose order time falls inside the window. Timestamps are compared via `unixepoch` so the
/// two ISO-8601 spellings SQLite stores (with and without a zone suffix) collate correctly.
pub async fn delivered_orders_in_window(
    hotel_id: i64,
    window: &SettlementWindow,
    conn: &mut SqliteConnection,
) -> Result<Vec<PastOrder>, MarketplaceError> {
    let orders = sqlx::query_as(
        r#"
        SELECT * FROM past_orders
        WHERE hotel_id = $1 AND status = 'DELIVERED'
          AND unixepoch(ordered_at) >= unixepoch($2)
          AND unixepoch(ordered_at) <= unixepoch($3)
        ORDER BY ordered_at ASC
        "#,
    )
    .bind(hotel_id)
    .bind(window.start)
    .bind(window.end)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

pub async fn insert_settlement(
    settlement: NewSettlement,
    conn: &mut SqliteConnection,
) -> Result<Settlement, MarketplaceError> {
    let hotel_id = settlement.hotel_id;
    let row = sqlx::query_as(
        r#"
        INSERT INTO settlements (hotel_id, week_start, week_end, total_orders, gross_revenue, commission_amount, tax_on_commission, net_revenue)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *;
        "#,
    )
    .bind(settlement.hotel_id)
    .bind(settlement.week_start)
    .bind(settlement.week_end)
    .bind(settlement.total_orders)
    .bind(settlement.gross_revenue)
    .bind(settlement.commission_amount)
    .bind(settlement.tax_on_commission)
    .bind(settlement.net_revenue)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            MarketplaceError::SettlementAlreadyExists { hotel_id }
        },
        _ => MarketplaceError::from(e),
    })?;
    Ok(row)
}

/// `PENDING` → `PAID`, re-verified at write time so two admin sessions cannot both pay the same settlement.
pub async fn mark_paid(
    settlement_id: i64,
    admin_id: i64,
    proof: &SettlementProof,
    conn: &mut SqliteConnection,
) -> Result<Option<Settlement>, MarketplaceError> {
    let row = sqlx::query_as(
        r#"
        UPDATE settlements
        SET status = 'PAID',
            proof_image_url = $1,
            payment_mode = $2,
            remarks = COALESCE($3, remarks),
            paid_at = CURRENT_TIMESTAMP,
            paid_by = $4
        WHERE id = $5 AND status = 'PENDING'
        RETURNING *;
        "#,
    )
    .bind(&proof.proof_image_url)
    .bind(proof.payment_mode.as_deref())
    .bind(proof.remarks.as_deref())
    .bind(admin_id)
    .bind(settlement_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_settlement(
    settlement_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Settlement>, MarketplaceError> {
    let row =
        sqlx::query_as("SELECT * FROM settlements WHERE id = $1").bind(settlement_id).fetch_optional(conn).await?;
    Ok(row)
}

pub async fn settlements_for_hotel(
    hotel_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Settlement>, MarketplaceError> {
    let rows = sqlx::query_as("SELECT * FROM settlements WHERE hotel_id = $1 ORDER BY week_start DESC")
        .bind(hotel_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}
