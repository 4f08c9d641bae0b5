//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause
//! the current worker to stop processing new requests. For this reason, any long, non-cpu-bound operation (I/O,
//! database operations, etc.) is expressed as an async function and awaited.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;
use tiffin_engine::{
    db_types::OrderStatus,
    helpers::GeoPoint,
    traits::GatewayEvent,
    DispatchApi,
    MarketplaceDatabase,
    OrderFlowApi,
    OrderFlowError,
    PaymentFlowApi,
    PaymentGateway,
    SettlementApi,
    TokenManagement,
};

use crate::{
    config::{AppChannel, ServerConfig},
    data_objects::{
        AcceptOrderRequest,
        AdminActionRequest,
        CancelOrderRequest,
        ClaimRequest,
        CompleteRequest,
        Coords,
        JsonResponse,
        MarkPaidRequest,
        OrderActionRequest,
        PlaceOrderRequest,
        ReachedRequest,
        RegisterTokenRequest,
        WebhookEnvelope,
        WEBHOOK_ORDER_COMPLETED,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health   ---------------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ---------------------------------------------   Customer   --------------------------------------------------------

route!(serviceable_hotels => Get "/customer/hotels" impl MarketplaceDatabase);
/// Hotels serving the given coordinate, restricted to its exact service zone and enriched with distance/ETA
/// estimates. A coordinate outside every area is refused explicitly.
pub async fn serviceable_hotels<B>(
    api: web::Data<DispatchApi<B>>,
    query: web::Query<Coords>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let hotels = api.serviceable_hotels(GeoPoint::new(query.latitude, query.longitude)).await?;
    Ok(HttpResponse::Ok().json(hotels))
}

route!(place_cod_order => Post "/customer/orders/cod" impl MarketplaceDatabase, PaymentGateway);
/// Cash on delivery: the payment log and the live order are created in one atomic step.
pub async fn place_cod_order<B, G>(
    api: web::Data<PaymentFlowApi<B, G>>,
    body: web::Json<PlaceOrderRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    trace!("💻️ COD order request from customer {}", body.customer_id);
    let (order, payment) = api.place_cod_order(body.into_inner().into(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "order": order, "payment": payment })))
}

route!(place_online_order => Post "/customer/orders/online" impl MarketplaceDatabase, PaymentGateway);
/// Online payment: asks the gateway for an order token first, then records the pending payment and its draft.
/// Returns the handoff credentials the client needs to open the payment sheet.
pub async fn place_online_order<B, G>(
    api: web::Data<PaymentFlowApi<B, G>>,
    body: web::Json<PlaceOrderRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    trace!("💻️ Online order request from customer {}", body.customer_id);
    let handoff = api.initiate_online_payment(body.into_inner().into(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(handoff))
}

route!(payment_status => Get "/customer/payments/{merchant_ref}/status" impl MarketplaceDatabase, PaymentGateway);
/// The client's reconciliation poll while it waits for the gateway confirmation to land.
pub async fn payment_status<B, G>(
    api: web::Data<PaymentFlowApi<B, G>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let resolution = api.payment_status(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(resolution))
}

route!(customer_live_orders => Get "/customer/{id}/orders/live" impl MarketplaceDatabase);
pub async fn customer_live_orders<B>(db: web::Data<B>, path: web::Path<i64>) -> Result<HttpResponse, ServerError>
where B: MarketplaceDatabase {
    let orders = db.fetch_live_orders_for_customer(path.into_inner()).await.map_err(OrderFlowError::from)?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(customer_past_orders => Get "/customer/{id}/orders/past" impl MarketplaceDatabase);
pub async fn customer_past_orders<B>(db: web::Data<B>, path: web::Path<i64>) -> Result<HttpResponse, ServerError>
where B: MarketplaceDatabase {
    let orders = db.fetch_past_orders_for_customer(path.into_inner()).await.map_err(OrderFlowError::from)?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(register_token => Post "/tokens" impl TokenManagement);
/// Idempotent device-token registration for any party.
pub async fn register_token<B>(
    db: web::Data<B>,
    body: web::Json<RegisterTokenRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: TokenManagement,
{
    db.register_token(body.owner, body.owner_id, &body.token)
        .await
        .map_err(OrderFlowError::from)?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Device token saved")))
}

route!(toggle_notifications => Post "/customer/{id}/notifications" impl TokenManagement);
/// Flips the customer's push-notification preference and reports the new value.
pub async fn toggle_notifications<B>(db: web::Data<B>, path: web::Path<i64>) -> Result<HttpResponse, ServerError>
where B: TokenManagement {
    let enabled = db.toggle_notifications(path.into_inner()).await.map_err(OrderFlowError::from)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "notifications_enabled": enabled })))
}

// ----------------------------------------------   Gateway   --------------------------------------------------------

route!(gateway_webhook => Post "/gateway/webhook" impl MarketplaceDatabase, PaymentGateway);
/// The asynchronous half of the online-payment path. Signature-checked, then idempotent: every well-formed delivery
/// is acknowledged with 200, including replays.
pub async fn gateway_webhook<B, G>(
    req: HttpRequest,
    api: web::Data<PaymentFlowApi<B, G>>,
    config: web::Data<ServerConfig>,
    body: web::Bytes,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    verify_webhook_signature(&req, &config, &body)?;
    let envelope: WebhookEnvelope =
        serde_json::from_slice(&body).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    if envelope.event != WEBHOOK_ORDER_COMPLETED {
        debug!("💻️ Ignoring gateway event '{}'", envelope.event);
        return Ok(HttpResponse::Ok().json(JsonResponse::success("Ignored event")));
    }
    let event =
        GatewayEvent::new(envelope.payload.merchant_order_id, envelope.payload.order_id, envelope.payload.state);
    let outcome = api.handle_gateway_event(event).await?;
    debug!("💻️ Gateway webhook processed: {outcome:?}");
    Ok(HttpResponse::Ok().json(JsonResponse::success("OK")))
}

/// HMAC-SHA256 of the raw body with the shared webhook secret, hex-encoded in `x-gateway-signature`.
/// The comparison runs in constant time inside the `hmac` crate.
fn verify_webhook_signature(req: &HttpRequest, config: &ServerConfig, body: &[u8]) -> Result<(), ServerError> {
    let secret = config.webhook_secret.reveal();
    if secret.is_empty() {
        warn!("💻️ Rejecting webhook: no TFN_WEBHOOK_SECRET configured");
        return Err(ServerError::InvalidWebhookSignature);
    }
    let signature = req
        .headers()
        .get("x-gateway-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::InvalidWebhookSignature)?;
    let expected = hex::decode(signature).map_err(|_| ServerError::InvalidWebhookSignature)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| ServerError::InvalidWebhookSignature)
}

// -----------------------------------------------   Rider   ---------------------------------------------------------

route!(rider_new_orders => Get "/rider/{id}/orders/new" impl MarketplaceDatabase);
/// Claimable orders with distance/travel estimates. Blocked riders get an explicit refusal.
pub async fn rider_new_orders<B>(
    api: web::Data<DispatchApi<B>>,
    path: web::Path<i64>,
    query: web::Query<Coords>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let offers = api.biddable_orders(path.into_inner(), GeoPoint::new(query.latitude, query.longitude)).await?;
    Ok(HttpResponse::Ok().json(offers))
}

route!(claim_order => Post "/rider/{id}/claim" impl MarketplaceDatabase);
/// The claim itself: one winner per order, losers observe 409 and must pick a different order.
pub async fn claim_order<B>(
    api: web::Data<OrderFlowApi<B>>,
    path: web::Path<i64>,
    body: web::Json<ClaimRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let rider_id = path.into_inner();
    let telemetry = tiffin_engine::db_types::ClaimTelemetry {
        latitude: body.latitude,
        longitude: body.longitude,
        restaurant_distance_m: body.restaurant_distance_m,
        customer_distance_m: body.customer_distance_m,
    };
    let order = api.claim_order(rider_id, body.order_id, telemetry).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(rider_reached => Post "/rider/{id}/reached" impl MarketplaceDatabase);
pub async fn rider_reached<B>(
    api: web::Data<OrderFlowApi<B>>,
    path: web::Path<i64>,
    body: web::Json<ReachedRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let meta = api.reached_restaurant(path.into_inner(), &body.selfie_url).await?;
    Ok(HttpResponse::Ok().json(meta))
}

route!(rider_pickup => Post "/rider/{id}/pickup" impl MarketplaceDatabase);
pub async fn rider_pickup<B>(
    api: web::Data<OrderFlowApi<B>>,
    path: web::Path<i64>,
    body: web::Json<OrderActionRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let order = api.confirm_pickup(path.into_inner(), body.order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(rider_drop => Post "/rider/{id}/drop" impl MarketplaceDatabase);
pub async fn rider_drop<B>(
    api: web::Data<OrderFlowApi<B>>,
    path: web::Path<i64>,
    body: web::Json<OrderActionRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let order = api.confirm_drop(path.into_inner(), body.order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(rider_complete => Post "/rider/{id}/complete" impl MarketplaceDatabase);
/// OTP-verified completion. The archived order is returned; the block recomputation happens via the archived-order
/// event, off the request path.
pub async fn rider_complete<B>(
    api: web::Data<OrderFlowApi<B>>,
    path: web::Path<i64>,
    body: web::Json<CompleteRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let otp = body.parsed_otp()?;
    let past = api.complete_order(path.into_inner(), body.order_id, otp).await?;
    Ok(HttpResponse::Ok().json(past))
}

route!(rider_duty => Post "/rider/{id}/duty" impl MarketplaceDatabase);
pub async fn rider_duty<B>(api: web::Data<DispatchApi<B>>, path: web::Path<i64>) -> Result<HttpResponse, ServerError>
where B: MarketplaceDatabase {
    let rider = api.toggle_duty(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rider))
}

route!(rider_collection_report => Get "/rider/{id}/collection-report" impl MarketplaceDatabase);
pub async fn rider_collection_report<B>(
    api: web::Data<DispatchApi<B>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let report = api.collection_report(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(report))
}

route!(rider_unsettled_orders => Get "/rider/{id}/orders/unsettled" impl MarketplaceDatabase);
pub async fn rider_unsettled_orders<B>(
    api: web::Data<DispatchApi<B>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let orders = api.unsettled_orders(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "count": orders.len(), "orders": orders })))
}

route!(rider_activity => Get "/rider/{id}/activity" impl MarketplaceDatabase);
/// The derived what-is-this-rider-doing projection.
pub async fn rider_activity<B>(
    api: web::Data<DispatchApi<B>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let activity = api.activity(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "activity": activity })))
}

// -----------------------------------------------   Hotel   ---------------------------------------------------------

route!(hotel_accept_order => Post "/hotel/orders/{id}/accept" impl MarketplaceDatabase);
pub async fn hotel_accept_order<B>(
    api: web::Data<OrderFlowApi<B>>,
    path: web::Path<i64>,
    body: web::Json<AcceptOrderRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let order = api.restaurant_accept(path.into_inner(), body.preparation_minutes).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(hotel_almost_ready => Post "/hotel/orders/{id}/almost-ready" impl MarketplaceDatabase);
pub async fn hotel_almost_ready<B>(
    api: web::Data<OrderFlowApi<B>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let order = api.restaurant_almost_ready(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(hotel_ready => Post "/hotel/orders/{id}/ready" impl MarketplaceDatabase);
pub async fn hotel_ready<B>(api: web::Data<OrderFlowApi<B>>, path: web::Path<i64>) -> Result<HttpResponse, ServerError>
where B: MarketplaceDatabase {
    let order = api.restaurant_ready(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(hotel_cancel_order => Post "/hotel/orders/{id}/cancel" impl MarketplaceDatabase);
pub async fn hotel_cancel_order<B>(
    api: web::Data<OrderFlowApi<B>>,
    path: web::Path<i64>,
    body: web::Json<CancelOrderRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    if !matches!(body.status, OrderStatus::Cancelled | OrderStatus::Rejected) {
        return Err(ServerError::InvalidRequestBody("status must be CANCELLED or REJECTED".to_string()));
    }
    let past = api.cancel_order(path.into_inner(), body.status, &body.reason).await?;
    Ok(HttpResponse::Ok().json(past))
}

route!(hotel_live_orders => Get "/hotel/{id}/orders" impl MarketplaceDatabase);
pub async fn hotel_live_orders<B>(db: web::Data<B>, path: web::Path<i64>) -> Result<HttpResponse, ServerError>
where B: MarketplaceDatabase {
    let orders =
        db.fetch_live_orders_for_hotel(path.into_inner()).await.map_err(OrderFlowError::from)?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(hotel_weekly_report => Get "/hotel/{id}/report/week" impl MarketplaceDatabase);
/// Revenue accumulated in the week currently in progress.
pub async fn hotel_weekly_report<B>(
    api: web::Data<SettlementApi<B>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let report = api.weekly_report(path.into_inner(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(report))
}

route!(hotel_settlements => Get "/hotel/{id}/settlements" impl MarketplaceDatabase);
pub async fn hotel_settlements<B>(
    api: web::Data<SettlementApi<B>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let settlements = api.settlements_for_hotel(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(settlements))
}

// -----------------------------------------------   Admin   ---------------------------------------------------------

route!(run_settlements => Post "/admin/settlements/run" impl MarketplaceDatabase);
/// Manual trigger for the weekly batch. Idempotent, so firing it alongside the scheduled worker is harmless.
pub async fn run_settlements<B>(api: web::Data<SettlementApi<B>>) -> Result<HttpResponse, ServerError>
where B: MarketplaceDatabase {
    let summary = api.run_weekly_batch(Utc::now()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(mark_settlement_paid => Post "/admin/settlements/{id}/paid" impl MarketplaceDatabase);
pub async fn mark_settlement_paid<B>(
    api: web::Data<SettlementApi<B>>,
    path: web::Path<i64>,
    body: web::Json<MarkPaidRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let body = body.into_inner();
    let proof = tiffin_engine::db_types::SettlementProof {
        proof_image_url: body.proof_image_url,
        payment_mode: body.payment_mode,
        remarks: body.remarks,
    };
    let settlement = api.mark_paid(path.into_inner(), body.admin_id, &proof).await?;
    Ok(HttpResponse::Ok().json(settlement))
}

route!(block_rider => Post "/admin/riders/{id}/block" impl MarketplaceDatabase);
pub async fn block_rider<B>(api: web::Data<DispatchApi<B>>, path: web::Path<i64>) -> Result<HttpResponse, ServerError>
where B: MarketplaceDatabase {
    let rider = api.set_blocked(path.into_inner(), true).await?;
    Ok(HttpResponse::Ok().json(rider))
}

route!(unblock_rider => Post "/admin/riders/{id}/unblock" impl MarketplaceDatabase);
pub async fn unblock_rider<B>(api: web::Data<DispatchApi<B>>, path: web::Path<i64>) -> Result<HttpResponse, ServerError>
where B: MarketplaceDatabase {
    let rider = api.set_blocked(path.into_inner(), false).await?;
    Ok(HttpResponse::Ok().json(rider))
}

route!(settle_rider_cash => Post "/admin/riders/{id}/settle" impl MarketplaceDatabase);
/// The rider deposited their collected COD cash; record it and re-evaluate the block.
pub async fn settle_rider_cash<B>(
    api: web::Data<DispatchApi<B>>,
    path: web::Path<i64>,
    body: web::Json<AdminActionRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
{
    let status = api.settle_cod(path.into_inner(), body.admin_id).await?;
    Ok(HttpResponse::Ok().json(status))
}

// ------------------------------------------------   Meta   ---------------------------------------------------------

#[get("/app-version/{channel}")]
pub async fn app_version(
    config: web::Data<ServerConfig>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let channel: AppChannel = path.into_inner().parse()?;
    Ok(HttpResponse::Ok().json(config.app_versions.for_channel(channel)))
}

#[get("/alert")]
pub async fn alert(config: web::Data<ServerConfig>) -> impl Responder {
    match &config.alert {
        Some(alert) => HttpResponse::Ok().json(alert),
        None => HttpResponse::NotFound().json(JsonResponse::failure("No alert at this moment")),
    }
}
