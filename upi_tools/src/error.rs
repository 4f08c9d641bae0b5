use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpiApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The gateway did not respond in time: {0}")]
    Timeout(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The gateway response is missing '{0}'")]
    MissingField(&'static str),
}
