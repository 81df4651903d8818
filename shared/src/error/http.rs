//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::EntityNotInitialized
            | Self::BookingNotFound
            | Self::CalendarReferenceNotFound
            | Self::SettingsNotFound
            | Self::TableNotFound
            | Self::FloorPlanNotFound
            | Self::ServerSectionNotFound
            | Self::WaitlistEntryNotFound
            | Self::DeviceCodeNotFound
            | Self::PrintJobNotFound
            | Self::SyncOperationNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::InvalidStateTransition
            | Self::VersionConflict
            | Self::BookingAlreadyCancelled
            | Self::BookingAlreadyCompleted
            | Self::TableOccupied
            | Self::TableOutOfService
            | Self::TableAlreadyOnFloorPlan
            | Self::PrintQueuePaused
            | Self::SyncConflict => StatusCode::CONFLICT,

            // 410 Gone
            Self::DeviceCodeExpired | Self::DeviceCodeDenied => StatusCode::GONE,

            // 429 Too Many Requests
            Self::TooManyPolls => StatusCode::TOO_MANY_REQUESTS,

            // 503 Service Unavailable (transient errors, client can retry)
            Self::EntityUnavailable | Self::TimeoutError => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::Unknown
            | Self::InternalError
            | Self::StorageError
            | Self::SerializationError
            | Self::ConfigError
            | Self::PrintRetriesExhausted => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation/business errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_status() {
        assert_eq!(ErrorCode::Success.http_status(), StatusCode::OK);
    }

    #[test]
    fn test_not_found_status() {
        assert_eq!(ErrorCode::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::EntityNotInitialized.http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::BookingNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_conflict_status() {
        assert_eq!(
            ErrorCode::InvalidStateTransition.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ErrorCode::TableOccupied.http_status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_validation_is_bad_request() {
        assert_eq!(
            ErrorCode::ValidationFailed.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ErrorCode::PartyTooLarge.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_error_status() {
        assert_eq!(
            ErrorCode::StorageError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::EntityUnavailable.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
