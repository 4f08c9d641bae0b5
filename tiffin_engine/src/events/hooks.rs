use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    NewOrderEvent,
    OrderArchivedEvent,
    OrderStatusChangedEvent,
    SettlementAlertEvent,
};

/// The set of producers handed to the engine APIs. Each API clones these and publishes on them after its
/// transactions commit.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_status_producers: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub new_order_producers: Vec<EventProducer<NewOrderEvent>>,
    pub order_archived_producers: Vec<EventProducer<OrderArchivedEvent>>,
    pub settlement_alert_producers: Vec<EventProducer<SettlementAlertEvent>>,
}

pub struct EventHandlers {
    pub on_order_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_new_order: Option<EventHandler<NewOrderEvent>>,
    pub on_order_archived: Option<EventHandler<OrderArchivedEvent>>,
    pub on_settlement_alert: Option<EventHandler<SettlementAlertEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_status_changed: hooks.on_order_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_new_order: hooks.on_new_order.map(|f| EventHandler::new(buffer_size, f)),
            on_order_archived: hooks.on_order_archived.map(|f| EventHandler::new(buffer_size, f)),
            on_settlement_alert: hooks.on_settlement_alert.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_status_changed {
            result.order_status_producers.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_new_order {
            result.new_order_producers.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_archived {
            result.order_archived_producers.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_settlement_alert {
            result.settlement_alert_producers.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_new_order {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_archived {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_settlement_alert {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_new_order: Option<Handler<NewOrderEvent>>,
    pub on_order_archived: Option<Handler<OrderArchivedEvent>>,
    pub on_settlement_alert: Option<Handler<SettlementAlertEvent>>,
}

impl EventHooks {
    pub fn on_order_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_new_order<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(NewOrderEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_new_order = Some(Arc::new(f));
        self
    }

    pub fn on_order_archived<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderArchivedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_archived = Some(Arc::new(f));
        self
    }

    pub fn on_settlement_alert<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SettlementAlertEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_settlement_alert = Some(Arc::new(f));
        self
    }
}
