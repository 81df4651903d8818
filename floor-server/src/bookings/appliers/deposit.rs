//! Deposit appliers
//!
//! Settlement events only move the deposit status; amounts never change
//! after `DepositRequired`.

use super::EventApplier;
use shared::booking::{BookingEvent, BookingSnapshot, Deposit, DepositStatus};

pub struct DepositRequiredApplier;

impl EventApplier for DepositRequiredApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::DepositRequired { amount, at } = event {
            snapshot.deposit = Some(Deposit {
                amount: *amount,
                status: DepositStatus::Required,
                required_at: *at,
                paid_at: None,
                payment_reference: None,
                settled_at: None,
            });
            snapshot.updated_at = *at;
        }
    }
}

pub struct DepositPaidApplier;

impl EventApplier for DepositPaidApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::DepositPaid {
            payment_reference,
            at,
        } = event
        {
            if let Some(deposit) = snapshot.deposit.as_mut() {
                deposit.status = DepositStatus::Paid;
                deposit.paid_at = Some(*at);
                deposit.payment_reference = payment_reference.clone();
            }
            snapshot.updated_at = *at;
        }
    }
}

pub struct DepositForfeitedApplier;

impl EventApplier for DepositForfeitedApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::DepositForfeited { at } = event {
            settle(snapshot, DepositStatus::Forfeited, *at);
        }
    }
}

pub struct DepositRefundedApplier;

impl EventApplier for DepositRefundedApplier {
    fn apply(&self, snapshot: &mut BookingSnapshot, event: &BookingEvent) {
        if let BookingEvent::DepositRefunded { at } = event {
            settle(snapshot, DepositStatus::Refunded, *at);
        }
    }
}

fn settle(snapshot: &mut BookingSnapshot, status: DepositStatus, at: i64) {
    if let Some(deposit) = snapshot.deposit.as_mut() {
        deposit.status = status;
        deposit.settled_at = Some(at);
    }
    snapshot.updated_at = at;
}
