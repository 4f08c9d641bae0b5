use tfn_common::Paise;
use tiffin_engine::traits::{GatewayError, GatewayOrder, PaymentGateway};
use upi_tools::{UpiApi, UpiApiError};

/// Adapts the `upi_tools` REST client to the engine's [`PaymentGateway`] trait.
#[derive(Clone)]
pub struct UpiGateway {
    api: UpiApi,
}

impl UpiGateway {
    pub fn new(api: UpiApi) -> Self {
        Self { api }
    }
}

impl PaymentGateway for UpiGateway {
    async fn create_order(&self, amount: Paise, merchant_ref: &str) -> Result<GatewayOrder, GatewayError> {
        let order = self.api.create_order(amount, merchant_ref).await.map_err(convert_error)?;
        Ok(GatewayOrder { gateway_order_id: order.order_id, token: order.token })
    }
}

fn convert_error(e: UpiApiError) -> GatewayError {
    match e {
        UpiApiError::Initialization(msg) => GatewayError::Initialization(msg),
        UpiApiError::Timeout(msg) => GatewayError::Timeout(msg),
        UpiApiError::QueryError { status, message } => GatewayError::Api { status, message },
        UpiApiError::RestResponseError(msg) | UpiApiError::JsonError(msg) => GatewayError::InvalidResponse(msg),
        UpiApiError::MissingField(field) => GatewayError::InvalidResponse(format!("missing field '{field}'")),
    }
}
