use serde::{Deserialize, Serialize};

use crate::db_types::{LiveOrder, OrderStatus, PastOrder};

/// Emitted after a live order commits a status transition. Handlers typically dispatch the customer-facing push
/// notifications for `PICKEDUP` and `DROP`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: LiveOrder,
    pub previous: OrderStatus,
}

impl OrderStatusChangedEvent {
    pub fn new(order: LiveOrder, previous: OrderStatus) -> Self {
        Self { order, previous }
    }
}

/// Emitted once a live order exists (COD placement or draft promotion). Handlers alert the restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderEvent {
    pub order: LiveOrder,
}

impl NewOrderEvent {
    pub fn new(order: LiveOrder) -> Self {
        Self { order }
    }
}

/// Emitted after an order is archived (delivered, cancelled or rejected). Handlers recompute the rider's COD
/// exposure for the auto-block policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderArchivedEvent {
    pub order: PastOrder,
}

impl OrderArchivedEvent {
    pub fn new(order: PastOrder) -> Self {
        Self { order }
    }
}

/// Emitted when a single hotel's settlement computation fails during the weekly batch. The batch itself carries on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementAlertEvent {
    pub hotel_id: i64,
    pub message: String,
}
