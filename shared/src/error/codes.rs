//! Unified error codes for the floor runtime
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Entity runtime errors
//! - 2xxx: Booking errors
//! - 3xxx: Settings / availability errors
//! - 4xxx: Table and floor errors
//! - 5xxx: Device authorization errors
//! - 6xxx: Print errors
//! - 7xxx: Offline sync errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Entity runtime ====================
    /// Command sent to an entity that was never created
    EntityNotInitialized = 1001,
    /// Command is illegal in the entity's current state
    InvalidStateTransition = 1002,
    /// Event log append raced another writer
    VersionConflict = 1003,
    /// Entity mailbox closed or runtime shutting down
    EntityUnavailable = 1004,
    /// Malformed entity key
    InvalidEntityKey = 1005,

    // ==================== 2xxx: Booking ====================
    /// Booking not found
    BookingNotFound = 2001,
    /// Booking has already been cancelled
    BookingAlreadyCancelled = 2002,
    /// Booking has already been completed
    BookingAlreadyCompleted = 2003,
    /// Deposit has not been paid
    DepositNotPaid = 2004,
    /// Booking reference missing from the day calendar
    CalendarReferenceNotFound = 2005,

    // ==================== 3xxx: Settings / availability ====================
    /// Booking settings not found for site
    SettingsNotFound = 3001,
    /// Open / close times are inconsistent
    InvalidOperatingHours = 3002,
    /// Date is blocked for reservations
    DateBlocked = 3003,
    /// Party exceeds the online maximum
    PartyTooLarge = 3004,

    // ==================== 4xxx: Table / floor ====================
    /// Table not found
    TableNotFound = 4001,
    /// Table is occupied
    TableOccupied = 4002,
    /// Table is out of service
    TableOutOfService = 4003,
    /// Floor plan not found
    FloorPlanNotFound = 4004,
    /// Table already belongs to the floor plan
    TableAlreadyOnFloorPlan = 4005,
    /// No table can seat the party
    NoTableAvailable = 4006,
    /// Server section not found
    ServerSectionNotFound = 4007,
    /// Waitlist entry not found
    WaitlistEntryNotFound = 4008,

    // ==================== 5xxx: Device authorization ====================
    /// Device code not found
    DeviceCodeNotFound = 5001,
    /// Device code has expired
    DeviceCodeExpired = 5002,
    /// Device code was denied
    DeviceCodeDenied = 5003,
    /// Poll limit exceeded
    TooManyPolls = 5004,

    // ==================== 6xxx: Print ====================
    /// Print job not found
    PrintJobNotFound = 6001,
    /// Print queue is paused
    PrintQueuePaused = 6002,
    /// Print retries exhausted
    PrintRetriesExhausted = 6003,

    // ==================== 7xxx: Offline sync ====================
    /// Unresolved sync conflict
    SyncConflict = 7001,
    /// Queued operation not found
    SyncOperationNotFound = 7002,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Durable store error
    StorageError = 9002,
    /// Serialization error
    SerializationError = 9003,
    /// Configuration error
    ConfigError = 9004,
    /// Operation timed out
    TimeoutError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Entity runtime
            ErrorCode::EntityNotInitialized => "Entity has not been initialized",
            ErrorCode::InvalidStateTransition => "Operation not allowed in current state",
            ErrorCode::VersionConflict => "Concurrent modification detected",
            ErrorCode::EntityUnavailable => "Entity is unavailable",
            ErrorCode::InvalidEntityKey => "Entity key is malformed",

            // Booking
            ErrorCode::BookingNotFound => "Booking not found",
            ErrorCode::BookingAlreadyCancelled => "Booking has already been cancelled",
            ErrorCode::BookingAlreadyCompleted => "Booking has already been completed",
            ErrorCode::DepositNotPaid => "Deposit has not been paid",
            ErrorCode::CalendarReferenceNotFound => "Booking is not on the calendar",

            // Settings
            ErrorCode::SettingsNotFound => "Booking settings not found",
            ErrorCode::InvalidOperatingHours => "Operating hours are invalid",
            ErrorCode::DateBlocked => "Date is blocked for reservations",
            ErrorCode::PartyTooLarge => "Party size exceeds the online maximum",

            // Table
            ErrorCode::TableNotFound => "Table not found",
            ErrorCode::TableOccupied => "Table is occupied",
            ErrorCode::TableOutOfService => "Table is out of service",
            ErrorCode::FloorPlanNotFound => "Floor plan not found",
            ErrorCode::TableAlreadyOnFloorPlan => "Table already belongs to floor plan",
            ErrorCode::NoTableAvailable => "No table available for party",
            ErrorCode::ServerSectionNotFound => "Server section not found",
            ErrorCode::WaitlistEntryNotFound => "Waitlist entry not found",

            // Device
            ErrorCode::DeviceCodeNotFound => "Device code not found",
            ErrorCode::DeviceCodeExpired => "Device code has expired",
            ErrorCode::DeviceCodeDenied => "Device code was denied",
            ErrorCode::TooManyPolls => "Too many poll attempts",

            // Print
            ErrorCode::PrintJobNotFound => "Print job not found",
            ErrorCode::PrintQueuePaused => "Print queue is paused",
            ErrorCode::PrintRetriesExhausted => "Print retries exhausted",

            // Sync
            ErrorCode::SyncConflict => "Sync conflict requires resolution",
            ErrorCode::SyncOperationNotFound => "Queued operation not found",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::StorageError => "Storage error",
            ErrorCode::SerializationError => "Serialization error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::TimeoutError => "Operation timed out",
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown u16 into an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Entity runtime
            1001 => Ok(ErrorCode::EntityNotInitialized),
            1002 => Ok(ErrorCode::InvalidStateTransition),
            1003 => Ok(ErrorCode::VersionConflict),
            1004 => Ok(ErrorCode::EntityUnavailable),
            1005 => Ok(ErrorCode::InvalidEntityKey),

            // Booking
            2001 => Ok(ErrorCode::BookingNotFound),
            2002 => Ok(ErrorCode::BookingAlreadyCancelled),
            2003 => Ok(ErrorCode::BookingAlreadyCompleted),
            2004 => Ok(ErrorCode::DepositNotPaid),
            2005 => Ok(ErrorCode::CalendarReferenceNotFound),

            // Settings
            3001 => Ok(ErrorCode::SettingsNotFound),
            3002 => Ok(ErrorCode::InvalidOperatingHours),
            3003 => Ok(ErrorCode::DateBlocked),
            3004 => Ok(ErrorCode::PartyTooLarge),

            // Table
            4001 => Ok(ErrorCode::TableNotFound),
            4002 => Ok(ErrorCode::TableOccupied),
            4003 => Ok(ErrorCode::TableOutOfService),
            4004 => Ok(ErrorCode::FloorPlanNotFound),
            4005 => Ok(ErrorCode::TableAlreadyOnFloorPlan),
            4006 => Ok(ErrorCode::NoTableAvailable),
            4007 => Ok(ErrorCode::ServerSectionNotFound),
            4008 => Ok(ErrorCode::WaitlistEntryNotFound),

            // Device
            5001 => Ok(ErrorCode::DeviceCodeNotFound),
            5002 => Ok(ErrorCode::DeviceCodeExpired),
            5003 => Ok(ErrorCode::DeviceCodeDenied),
            5004 => Ok(ErrorCode::TooManyPolls),

            // Print
            6001 => Ok(ErrorCode::PrintJobNotFound),
            6002 => Ok(ErrorCode::PrintQueuePaused),
            6003 => Ok(ErrorCode::PrintRetriesExhausted),

            // Sync
            7001 => Ok(ErrorCode::SyncConflict),
            7002 => Ok(ErrorCode::SyncOperationNotFound),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::StorageError),
            9003 => Ok(ErrorCode::SerializationError),
            9004 => Ok(ErrorCode::ConfigError),
            9005 => Ok(ErrorCode::TimeoutError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}
