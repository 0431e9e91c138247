use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
}

/// Transport-level failure from the hosted auth/data service.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn network(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    pub(crate) fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    pub(crate) fn unauthorized() -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized,
            message: "Unauthorized".to_string(),
        }
    }

    pub(crate) fn http(status: impl std::fmt::Display, body: String, ctx: &str) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: format!("{ctx} ({status}): {body}"),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Why a new bookmark was not sent to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum RejectReason {
    #[strum(to_string = "Title is required")]
    EmptyTitle,
    #[strum(to_string = "URL is required")]
    EmptyUrl,
    #[strum(to_string = "URL must contain a domain, e.g. example.com")]
    MalformedUrl,
}

/// Failures surfaced by the bookmark data flow.
///
/// None of these are fatal to the view: callers degrade to "state unchanged"
/// or "state reverted".
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    /// No valid session; the view has already been redirected to login.
    #[error("not signed in")]
    Unauthenticated,

    #[error("bookmark store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("rejected: {0}")]
    ValidationRejected(RejectReason),
}

impl From<ApiError> for SyncError {
    fn from(e: ApiError) -> Self {
        match e.kind {
            ApiErrorKind::Unauthorized => Self::Unauthenticated,
            _ => Self::StoreUnavailable(e.message),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_api_error_maps_to_unauthenticated() {
        let e: SyncError = ApiError::unauthorized().into();
        assert_eq!(e, SyncError::Unauthenticated);
    }

    #[test]
    fn test_other_api_errors_map_to_store_unavailable() {
        let e: SyncError = ApiError::http(503, "down".to_string(), "Select failed").into();
        assert_eq!(
            e,
            SyncError::StoreUnavailable("Select failed (503): down".to_string())
        );

        let e: SyncError = ApiError::network("connection reset").into();
        assert!(matches!(e, SyncError::StoreUnavailable(m) if m == "connection reset"));
    }

    #[test]
    fn test_reject_reason_message_is_user_facing() {
        assert_eq!(RejectReason::EmptyTitle.to_string(), "Title is required");
        assert_eq!(
            SyncError::ValidationRejected(RejectReason::EmptyUrl).to_string(),
            "rejected: URL is required"
        );
    }
}
