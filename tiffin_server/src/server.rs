use std::{future::Future, pin::Pin, time::Duration};

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};
use log::*;
use tiffin_engine::{
    db_types::OrderStatus,
    events::{EventHandlers, EventHooks, EventProducers},
    OrderFlowApi,
    PaymentFlowApi,
    PaymentGateway,
    RiderManagement,
    SettlementApi,
    SqliteDatabase,
};
use upi_tools::UpiApi;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{LogPushSender, NotificationRelay, UpiGateway},
    routes::{
        alert,
        app_version,
        health,
        BlockRiderRoute,
        ClaimOrderRoute,
        CustomerLiveOrdersRoute,
        CustomerPastOrdersRoute,
        GatewayWebhookRoute,
        HotelAcceptOrderRoute,
        HotelAlmostReadyRoute,
        HotelCancelOrderRoute,
        HotelLiveOrdersRoute,
        HotelReadyRoute,
        HotelSettlementsRoute,
        HotelWeeklyReportRoute,
        MarkSettlementPaidRoute,
        PaymentStatusRoute,
        PlaceCodOrderRoute,
        PlaceOnlineOrderRoute,
        RegisterTokenRoute,
        RiderActivityRoute,
        RiderCollectionReportRoute,
        RiderCompleteRoute,
        RiderDropRoute,
        RiderDutyRoute,
        RiderNewOrdersRoute,
        RiderPickupRoute,
        RiderReachedRoute,
        RiderUnsettledOrdersRoute,
        RunSettlementsRoute,
        ServiceableHotelsRoute,
        SettleRiderCashRoute,
        ToggleNotificationsRoute,
        UnblockRiderRoute,
    },
    workers,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let upi = UpiApi::new(config.upi.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = UpiGateway::new(upi);

    let handlers = build_event_handlers(db.clone(), LogPushSender);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let payment_flow = PaymentFlowApi::new(
        db.clone(),
        gateway.clone(),
        producers.clone(),
        config.service_areas.clone(),
        config.placement_policy(),
    );
    workers::start_draft_expiry_worker(payment_flow, config.draft_ttl);
    workers::start_settlement_worker(SettlementApi::new(db.clone(), producers.clone(), config.settlement_rates));
    workers::start_serving_reset_worker(db.clone());

    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance<G>(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: G,
    producers: EventProducers,
) -> Result<Server, ServerError>
where
    G: PaymentGateway + 'static,
{
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("tfn::access_log"))
            .configure(app_config(config.clone(), db.clone(), gateway.clone(), producers.clone()))
    })
    .keep_alive(Duration::from_secs(600))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Registers the API facades and every route on an actix app. Shared between the real server and the endpoint
/// tests, so both exercise the same wiring.
pub fn app_config<G>(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: G,
    producers: EventProducers,
) -> impl FnOnce(&mut web::ServiceConfig)
where
    G: PaymentGateway + 'static,
{
    move |cfg: &mut web::ServiceConfig| {
        let order_flow = OrderFlowApi::new(db.clone(), producers.clone());
        let payment_flow = PaymentFlowApi::new(
            db.clone(),
            gateway,
            producers.clone(),
            config.service_areas.clone(),
            config.placement_policy(),
        );
        let dispatch = tiffin_engine::DispatchApi::new(db.clone(), config.service_areas.clone());
        let settlements = SettlementApi::new(db.clone(), producers, config.settlement_rates);
        cfg.app_data(web::Data::new(db))
            .app_data(web::Data::new(order_flow))
            .app_data(web::Data::new(payment_flow))
            .app_data(web::Data::new(dispatch))
            .app_data(web::Data::new(settlements))
            .app_data(web::Data::new(config))
            .service(health)
            .service(app_version)
            .service(alert)
            .service(ServiceableHotelsRoute::<SqliteDatabase>::new())
            .service(PlaceCodOrderRoute::<SqliteDatabase, G>::new())
            .service(PlaceOnlineOrderRoute::<SqliteDatabase, G>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, G>::new())
            .service(CustomerLiveOrdersRoute::<SqliteDatabase>::new())
            .service(CustomerPastOrdersRoute::<SqliteDatabase>::new())
            .service(RegisterTokenRoute::<SqliteDatabase>::new())
            .service(ToggleNotificationsRoute::<SqliteDatabase>::new())
            .service(GatewayWebhookRoute::<SqliteDatabase, G>::new())
            .service(RiderNewOrdersRoute::<SqliteDatabase>::new())
            .service(ClaimOrderRoute::<SqliteDatabase>::new())
            .service(RiderReachedRoute::<SqliteDatabase>::new())
            .service(RiderPickupRoute::<SqliteDatabase>::new())
            .service(RiderDropRoute::<SqliteDatabase>::new())
            .service(RiderCompleteRoute::<SqliteDatabase>::new())
            .service(RiderDutyRoute::<SqliteDatabase>::new())
            .service(RiderCollectionReportRoute::<SqliteDatabase>::new())
            .service(RiderUnsettledOrdersRoute::<SqliteDatabase>::new())
            .service(RiderActivityRoute::<SqliteDatabase>::new())
            .service(HotelAcceptOrderRoute::<SqliteDatabase>::new())
            .service(HotelAlmostReadyRoute::<SqliteDatabase>::new())
            .service(HotelReadyRoute::<SqliteDatabase>::new())
            .service(HotelCancelOrderRoute::<SqliteDatabase>::new())
            .service(HotelLiveOrdersRoute::<SqliteDatabase>::new())
            .service(HotelWeeklyReportRoute::<SqliteDatabase>::new())
            .service(HotelSettlementsRoute::<SqliteDatabase>::new())
            .service(RunSettlementsRoute::<SqliteDatabase>::new())
            .service(MarkSettlementPaidRoute::<SqliteDatabase>::new())
            .service(BlockRiderRoute::<SqliteDatabase>::new())
            .service(UnblockRiderRoute::<SqliteDatabase>::new())
            .service(SettleRiderCashRoute::<SqliteDatabase>::new());
    }
}

/// Wires the post-commit event hooks: push-notification dispatch and the post-delivery rider block recomputation.
/// Both run on handler tasks, decoupled from the transactions that emitted them.
pub fn build_event_handlers<S>(db: SqliteDatabase, sender: S) -> EventHandlers
where S: tiffin_engine::PushSender + 'static {
    let mut hooks = EventHooks::default();
    let relay = NotificationRelay::new(db.clone(), sender);

    let status_relay = relay.clone();
    hooks.on_order_status_changed(move |event| {
        let relay = status_relay.clone();
        Box::pin(async move { relay.notify_status_change(event).await }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });

    let new_order_relay = relay.clone();
    hooks.on_new_order(move |event| {
        let relay = new_order_relay.clone();
        Box::pin(async move { relay.notify_new_order(event).await }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });

    let block_db = db.clone();
    hooks.on_order_archived(move |event| {
        let db = block_db.clone();
        Box::pin(async move {
            if event.order.status != OrderStatus::Delivered {
                return;
            }
            let Some(rider_id) = event.order.rider_id else { return };
            match db.recompute_block(rider_id).await {
                Ok(status) if status.blocked => {
                    warn!("🛵️ Rider {rider_id} auto-blocked: carrying {} unsettled cash", status.outstanding);
                },
                Ok(_) => {},
                Err(e) => error!("🛵️ Post-delivery block check failed for rider {rider_id}: {e}"),
            }
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });

    hooks.on_settlement_alert(move |event| {
        Box::pin(async move {
            error!("🧾️ Settlement alert for hotel {}: {}", event.hotel_id, event.message);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });

    EventHandlers::new(32, hooks)
}
