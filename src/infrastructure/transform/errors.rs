use reqwest::StatusCode;

use crate::domain::errors::TransformError;

impl From<reqwest::Error> for TransformError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Map a non-success HTTP status to the service error it stands for
pub fn classify_status(status: StatusCode, body: String) -> TransformError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            TransformError::InvalidRequest(body)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransformError::Unauthorized,
        StatusCode::NOT_FOUND => TransformError::NotFound(body),
        StatusCode::TOO_MANY_REQUESTS => TransformError::RateLimited,
        status if status.is_server_error() => TransformError::Server {
            status: status.as_u16(),
            body,
        },
        status => TransformError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        },
    }
}
