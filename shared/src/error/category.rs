//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// Categories are determined by the leading digit of the error code:
/// - 0xxx: General errors
/// - 1xxx: Entity runtime errors
/// - 2xxx: Booking errors
/// - 3xxx: Settings / availability errors
/// - 4xxx: Table and floor errors
/// - 5xxx: Device authorization errors
/// - 6xxx: Print errors
/// - 7xxx: Offline sync errors
/// - 9xxx: System errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Entity runtime errors (1xxx)
    Entity,
    /// Booking errors (2xxx)
    Booking,
    /// Settings / availability errors (3xxx)
    Settings,
    /// Table and floor errors (4xxx)
    Floor,
    /// Device authorization errors (5xxx)
    Device,
    /// Print errors (6xxx)
    Print,
    /// Offline sync errors (7xxx)
    Sync,
    /// System errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            1000..2000 => Self::Entity,
            2000..3000 => Self::Booking,
            3000..4000 => Self::Settings,
            4000..5000 => Self::Floor,
            5000..6000 => Self::Device,
            6000..7000 => Self::Print,
            7000..8000 => Self::Sync,
            _ => Self::System,
        }
    }

    /// Get the string name for this category
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Entity => "entity",
            Self::Booking => "booking",
            Self::Settings => "settings",
            Self::Floor => "floor",
            Self::Device => "device",
            Self::Print => "print",
            Self::Sync => "sync",
            Self::System => "system",
        }
    }
}

impl ErrorCode {
    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_code() {
        assert_eq!(ErrorCategory::from_code(0), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(999), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(1001), ErrorCategory::Entity);
        assert_eq!(ErrorCategory::from_code(2001), ErrorCategory::Booking);
        assert_eq!(ErrorCategory::from_code(3001), ErrorCategory::Settings);
        assert_eq!(ErrorCategory::from_code(4001), ErrorCategory::Floor);
        assert_eq!(ErrorCategory::from_code(5001), ErrorCategory::Device);
        assert_eq!(ErrorCategory::from_code(6001), ErrorCategory::Print);
        assert_eq!(ErrorCategory::from_code(7001), ErrorCategory::Sync);
        assert_eq!(ErrorCategory::from_code(8001), ErrorCategory::System);
        assert_eq!(ErrorCategory::from_code(9001), ErrorCategory::System);
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(
            ErrorCode::EntityNotInitialized.category(),
            ErrorCategory::Entity
        );
        assert_eq!(ErrorCode::BookingNotFound.category(), ErrorCategory::Booking);
        assert_eq!(ErrorCode::TableOccupied.category(), ErrorCategory::Floor);
        assert_eq!(ErrorCode::StorageError.category(), ErrorCategory::System);
    }

    #[test]
    fn test_category_serialize() {
        let json = serde_json::to_string(&ErrorCategory::Floor).unwrap();
        assert_eq!(json, "\"floor\"");
        let back: ErrorCategory = serde_json::from_str("\"sync\"").unwrap();
        assert_eq!(back, ErrorCategory::Sync);
    }
}
