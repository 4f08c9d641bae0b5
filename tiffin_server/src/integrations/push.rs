use log::*;
use tiffin_engine::{
    db_types::OrderStatus,
    events::{NewOrderEvent, OrderStatusChangedEvent},
    traits::{Notice, PushError, PushOutcome, PushSender, TokenOwner},
    MarketplaceDatabase,
};

/// A push sender that only logs. The FCM wire integration lives outside this repository; swapping it in means
/// implementing [`PushSender`] against the real SDK and handing it to the relay instead.
#[derive(Debug, Clone, Default)]
pub struct LogPushSender;

impl PushSender for LogPushSender {
    async fn send(&self, tokens: &[String], notice: &Notice) -> Result<PushOutcome, PushError> {
        if tokens.is_empty() {
            return Ok(PushOutcome::default());
        }
        info!("📣️ [{:?}] '{}' -> {} device(s)", notice.kind, notice.title, tokens.len());
        Ok(PushOutcome { success_count: tokens.len(), failure_count: 0, invalid_tokens: Vec::new() })
    }
}

/// Consumes post-commit order events and turns them into push notifications. Failures are logged and swallowed — a
/// notification can never fail the state transition that triggered it — and tokens the provider rejects are pruned
/// from the owner's set.
#[derive(Clone)]
pub struct NotificationRelay<B, S> {
    db: B,
    sender: S,
}

impl<B, S> NotificationRelay<B, S>
where
    B: MarketplaceDatabase,
    S: PushSender,
{
    pub fn new(db: B, sender: S) -> Self {
        Self { db, sender }
    }

    /// Customer-facing notifications are keyed to exactly two transitions: `PICKEDUP` and `DROP`.
    pub async fn notify_status_change(&self, event: OrderStatusChangedEvent) {
        let notice = match event.order.status {
            OrderStatus::Pickedup => Notice::picked_up(),
            OrderStatus::Drop => Notice::arrived(),
            _ => return,
        };
        self.notify_customer(event.order.customer_id, notice).await;
    }

    /// A live order appeared (COD placement or draft promotion): alert the restaurant, confirm to the customer.
    pub async fn notify_new_order(&self, event: NewOrderEvent) {
        self.send_to(TokenOwner::Hotel, event.order.hotel_id, Notice::new_order()).await;
        self.notify_customer(event.order.customer_id, Notice::order_confirmed()).await;
    }

    async fn notify_customer(&self, customer_id: i64, notice: Notice) {
        match self.db.fetch_customer(customer_id).await {
            Ok(Some(customer)) if !customer.notifications_enabled => {
                trace!("📣️ Customer {customer_id} has notifications disabled; skipping");
            },
            Ok(Some(_)) => self.send_to(TokenOwner::Customer, customer_id, notice).await,
            Ok(None) => warn!("📣️ Customer {customer_id} not found for notification"),
            Err(e) => error!("📣️ Could not load customer {customer_id}: {e}"),
        }
    }

    async fn send_to(&self, owner: TokenOwner, owner_id: i64, notice: Notice) {
        let tokens = match self.db.tokens_for(owner, owner_id).await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!("📣️ Could not load device tokens for {owner} {owner_id}: {e}");
                return;
            },
        };
        if tokens.is_empty() {
            trace!("📣️ No device tokens for {owner} {owner_id}; skipping");
            return;
        }
        match self.sender.send(&tokens, &notice).await {
            Ok(outcome) => {
                if !outcome.invalid_tokens.is_empty() {
                    match self.db.prune_tokens(owner, owner_id, &outcome.invalid_tokens).await {
                        Ok(n) => debug!("📣️ Pruned {n} dead tokens for {owner} {owner_id}"),
                        Err(e) => error!("📣️ Could not prune tokens for {owner} {owner_id}: {e}"),
                    }
                }
            },
            Err(e) => error!("📣️ Push send for {owner} {owner_id} failed (ignored): {e}"),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use tfn_common::Paise;
    use tiffin_engine::{
        db_types::{NewOrder, NewPayment, OrderLine},
        test_utils::prepare_env::{prepare_test_env, random_db_path},
        traits::NoticeKind,
        SqliteDatabase,
        TokenManagement,
    };

    use super::*;

    /// Records every send and reports the tokens in `dead` as invalid.
    #[derive(Clone, Default)]
    struct RecordingSender {
        sent: Arc<Mutex<Vec<(NoticeKind, Vec<String>)>>>,
        dead: Vec<String>,
    }

    impl PushSender for RecordingSender {
        async fn send(
            &self,
            tokens: &[String],
            notice: &Notice,
        ) -> Result<tiffin_engine::traits::PushOutcome, tiffin_engine::traits::PushError> {
            self.sent.lock().unwrap().push((notice.kind, tokens.to_vec()));
            let invalid_tokens: Vec<String> = tokens.iter().filter(|t| self.dead.contains(t)).cloned().collect();
            Ok(tiffin_engine::traits::PushOutcome {
                success_count: tokens.len() - invalid_tokens.len(),
                failure_count: invalid_tokens.len(),
                invalid_tokens,
            })
        }
    }

    async fn world() -> (SqliteDatabase, i64, tiffin_engine::db_types::LiveOrder) {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.unwrap();
        let customer = db.create_customer("Asha", "9800000000").await.unwrap();
        db.add_customer_address(customer.id, "Home", 19.95, 79.29, None, None, None, true).await.unwrap();
        let hotel = db.create_hotel("Annapurna", "9700000000", "Main Rd", 19.951, 79.291).await.unwrap();
        let listing = db.create_listing(hotel.id, "Thali", Paise::from_rupees(120)).await.unwrap();
        let order = NewOrder {
            customer_id: customer.id,
            hotel_id: hotel.id,
            location_index: 0,
            lines: vec![OrderLine { listing_id: listing.id, quantity: 1 }],
            total_price: Paise::from_rupees(120),
            remarks: None,
        };
        let payment = NewPayment::cod(customer.id, order.total_price, "T1".into(), "M1".into());
        use tiffin_engine::MarketplaceDatabase;
        let (live, _) = db.create_cod_order(payment, order, 123_456, 654_321).await.unwrap();
        (db, customer.id, live)
    }

    #[tokio::test]
    async fn pickup_notifies_and_prunes_dead_tokens() {
        let (db, customer_id, mut live) = world().await;
        db.register_token(TokenOwner::Customer, customer_id, "alive-token").await.unwrap();
        db.register_token(TokenOwner::Customer, customer_id, "dead-token").await.unwrap();
        let sender = RecordingSender { dead: vec!["dead-token".to_string()], ..Default::default() };
        let relay = NotificationRelay::new(db.clone(), sender.clone());

        live.status = OrderStatus::Pickedup;
        relay.notify_status_change(OrderStatusChangedEvent::new(live.clone(), OrderStatus::Accepted)).await;

        let sent = sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, NoticeKind::OrderPickedUp);
        assert_eq!(sent[0].1.len(), 2);
        // The provider rejected one token; it must be gone now.
        let remaining = db.tokens_for(TokenOwner::Customer, customer_id).await.unwrap();
        assert_eq!(remaining, vec!["alive-token".to_string()]);
    }

    #[tokio::test]
    async fn intermediate_transitions_and_muted_customers_are_silent() {
        let (db, customer_id, mut live) = world().await;
        db.register_token(TokenOwner::Customer, customer_id, "alive-token").await.unwrap();
        let sender = RecordingSender::default();
        let relay = NotificationRelay::new(db.clone(), sender.clone());

        // ACCEPTED is not a notifying transition.
        live.status = OrderStatus::Accepted;
        relay.notify_status_change(OrderStatusChangedEvent::new(live.clone(), OrderStatus::Preparing)).await;
        assert!(sender.sent.lock().unwrap().is_empty());

        // Muted customer: DROP would notify, but the preference wins.
        assert!(!db.toggle_notifications(customer_id).await.unwrap());
        live.status = OrderStatus::Drop;
        relay.notify_status_change(OrderStatusChangedEvent::new(live, OrderStatus::Pickedup)).await;
        assert!(sender.sent.lock().unwrap().is_empty());
    }
}
