//! Customers, hotels, listings, the address book and device tokens.
use sqlx::{QueryBuilder, SqliteConnection};
use tfn_common::Paise;

use crate::{
    db_types::{Customer, CustomerAddress, Hotel, Listing},
    traits::{MarketplaceError, TokenOwner},
};

pub async fn fetch_customer(id: i64, conn: &mut SqliteConnection) -> Result<Option<Customer>, MarketplaceError> {
    let customer = sqlx::query_as("SELECT * FROM customers WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(customer)
}

pub async fn insert_customer(
    name: &str,
    phone: &str,
    conn: &mut SqliteConnection,
) -> Result<Customer, MarketplaceError> {
    let customer = sqlx::query_as("INSERT INTO customers (name, phone) VALUES ($1, $2) RETURNING *")
        .bind(name)
        .bind(phone)
        .fetch_one(conn)
        .await?;
    Ok(customer)
}

pub async fn toggle_notifications(
    customer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Customer>, MarketplaceError> {
    let customer = sqlx::query_as(
        "UPDATE customers SET notifications_enabled = NOT notifications_enabled, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $1 RETURNING *",
    )
    .bind(customer_id)
    .fetch_optional(conn)
    .await?;
    Ok(customer)
}

pub async fn fetch_address(
    customer_id: i64,
    position: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CustomerAddress>, MarketplaceError> {
    let address = sqlx::query_as("SELECT * FROM customer_addresses WHERE customer_id = $1 AND position = $2")
        .bind(customer_id)
        .bind(position)
        .fetch_optional(conn)
        .await?;
    Ok(address)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_address(
    customer_id: i64,
    title: &str,
    latitude: f64,
    longitude: f64,
    house_no: Option<&str>,
    building: Option<&str>,
    landmark: Option<&str>,
    is_default: bool,
    conn: &mut SqliteConnection,
) -> Result<CustomerAddress, MarketplaceError> {
    let address = sqlx::query_as(
        r#"
        INSERT INTO customer_addresses (customer_id, position, title, latitude, longitude, house_no, building, landmark, is_default)
        VALUES ($1, (SELECT COALESCE(MAX(position) + 1, 0) FROM customer_addresses WHERE customer_id = $1), $2, $3, $4, $5, $6, $7, $8)
        RETURNING *;
        "#,
    )
    .bind(customer_id)
    .bind(title)
    .bind(latitude)
    .bind(longitude)
    .bind(house_no)
    .bind(building)
    .bind(landmark)
    .bind(is_default)
    .fetch_one(conn)
    .await?;
    Ok(address)
}

pub async fn fetch_hotel(id: i64, conn: &mut SqliteConnection) -> Result<Option<Hotel>, MarketplaceError> {
    let hotel = sqlx::query_as("SELECT * FROM hotels WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(hotel)
}

pub async fn serving_hotels(conn: &mut SqliteConnection) -> Result<Vec<Hotel>, MarketplaceError> {
    let hotels = sqlx::query_as("SELECT * FROM hotels WHERE is_serving = 1 ORDER BY name ASC").fetch_all(conn).await?;
    Ok(hotels)
}

pub async fn hotel_ids(conn: &mut SqliteConnection) -> Result<Vec<i64>, MarketplaceError> {
    let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM hotels ORDER BY id ASC").fetch_all(conn).await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

pub async fn insert_hotel(
    name: &str,
    phone: &str,
    address: &str,
    latitude: f64,
    longitude: f64,
    conn: &mut SqliteConnection,
) -> Result<Hotel, MarketplaceError> {
    let hotel = sqlx::query_as(
        "INSERT INTO hotels (name, phone, address, latitude, longitude, is_serving) VALUES ($1, $2, $3, $4, $5, 1) RETURNING *",
    )
    .bind(name)
    .bind(phone)
    .bind(address)
    .bind(latitude)
    .bind(longitude)
    .fetch_one(conn)
    .await?;
    Ok(hotel)
}

pub async fn insert_listing(
    hotel_id: i64,
    name: &str,
    price: Paise,
    conn: &mut SqliteConnection,
) -> Result<Listing, MarketplaceError> {
    let listing = sqlx::query_as("INSERT INTO listings (hotel_id, name, price) VALUES ($1, $2, $3) RETURNING *")
        .bind(hotel_id)
        .bind(name)
        .bind(price)
        .fetch_one(conn)
        .await?;
    Ok(listing)
}

/// In-stock listings matching the given ids. Absent ids are simply not in the result.
pub async fn in_stock_listings(ids: &[i64], conn: &mut SqliteConnection) -> Result<Vec<Listing>, MarketplaceError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM listings WHERE in_stock = 1 AND id IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    builder.push(")");
    let listings = builder.build_query_as::<Listing>().fetch_all(conn).await?;
    Ok(listings)
}

/// Nightly reset: every hotel goes off-serving at IST midnight and must opt back in next morning.
pub async fn reset_all_serving(conn: &mut SqliteConnection) -> Result<u64, MarketplaceError> {
    let result = sqlx::query("UPDATE hotels SET is_serving = 0 WHERE is_serving = 1").execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn insert_rider(
    name: &str,
    phone: &str,
    deposit_amount: Paise,
    conn: &mut SqliteConnection,
) -> Result<crate::db_types::Rider, MarketplaceError> {
    let rider = sqlx::query_as("INSERT INTO riders (name, phone, deposit_amount) VALUES ($1, $2, $3) RETURNING *")
        .bind(name)
        .bind(phone)
        .bind(deposit_amount)
        .fetch_one(conn)
        .await?;
    Ok(rider)
}

//--------------------------------------   Device tokens   -----------------------------------------------------------

pub async fn register_token(
    owner: TokenOwner,
    owner_id: i64,
    token: &str,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    sqlx::query("INSERT OR IGNORE INTO device_tokens (owner_kind, owner_id, token) VALUES ($1, $2, $3)")
        .bind(owner.to_string())
        .bind(owner_id)
        .bind(token)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn tokens_for(
    owner: TokenOwner,
    owner_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<String>, MarketplaceError> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT token FROM device_tokens WHERE owner_kind = $1 AND owner_id = $2")
            .bind(owner.to_string())
            .bind(owner_id)
            .fetch_all(conn)
            .await?;
    Ok(rows.into_iter().map(|(t,)| t).collect())
}

pub async fn prune_tokens(
    owner: TokenOwner,
    owner_id: i64,
    invalid: &[String],
    conn: &mut SqliteConnection,
) -> Result<u64, MarketplaceError> {
    if invalid.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::new("DELETE FROM device_tokens WHERE owner_kind = ");
    builder.push_bind(owner.to_string());
    builder.push(" AND owner_id = ");
    builder.push_bind(owner_id);
    builder.push(" AND token IN (");
    let mut separated = builder.separated(", ");
    for token in invalid {
        separated.push_bind(token);
    }
    builder.push(")");
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}
