//! Shared types for booking event sourcing

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Status / Source
// ============================================================================

/// 预订状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// 已提交，等待确认
    #[default]
    Requested,
    /// 已确认
    Confirmed,
    /// 客人已到店，尚未入座
    Arrived,
    /// 已入座
    Seated,
    /// 已离店
    Completed,
    /// 已取消
    Cancelled,
    /// 未到店
    NoShow,
}

impl BookingStatus {
    /// Guest is expected but has not shown up yet
    pub const fn is_awaiting_arrival(&self) -> bool {
        matches!(self, BookingStatus::Requested | BookingStatus::Confirmed)
    }

    /// Booking still holds a slot / table on the floor
    pub const fn holds_capacity(&self) -> bool {
        matches!(
            self,
            BookingStatus::Requested
                | BookingStatus::Confirmed
                | BookingStatus::Arrived
                | BookingStatus::Seated
        )
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }
}

/// Channel a booking arrived through
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingSource {
    /// Staff entered at the host stand
    #[default]
    Direct,
    /// Staff entered from a phone call
    Phone,
    Website,
    MobileApp,
    Google,
    ThirdParty,
    WalkIn,
}

impl BookingSource {
    /// Staff-originated sources bypass the online-only availability rules
    pub const fn is_staff(&self) -> bool {
        matches!(self, BookingSource::Direct | BookingSource::Phone)
    }
}

// ============================================================================
// Guest / Deposit
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GuestInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub is_vip: bool,
}

/// 订金状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    Required,
    Paid,
    Forfeited,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deposit {
    pub amount: Decimal,
    pub status: DepositStatus,
    pub required_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingNote {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub added_at: i64,
}
