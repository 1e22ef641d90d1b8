use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Error returned when a string is not part of the event catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown event type: {0}")]
pub struct UnknownEventType(pub String);

/// Business occurrences that subscriptions can register interest in.
///
/// Wire names follow `<domain>.<action>`. The set is additive: new variants
/// may be appended (together with a row in [`EventType::ALL`] and
/// [`EventType::as_str`]), but an existing wire name is never repurposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
#[non_exhaustive]
pub enum EventType {
    // Vendors
    VendorCreated,
    VendorUpdated,
    VendorDeleted,

    // Purchasing
    PurchaseOrderCreated,
    PurchaseOrderApproved,
    PurchaseOrderReceived,
    PurchaseOrderCancelled,

    // Invoicing
    InvoiceCreated,
    InvoiceSent,
    InvoicePaid,
    InvoiceOverdue,
    InvoiceCancelled,
    PaymentReceived,

    // HR
    EmployeeCreated,
    EmployeeUpdated,
    EmployeeTerminated,
    LeaveRequestSubmitted,
    LeaveRequestApproved,
    LeaveRequestRejected,
    PayrollProcessed,

    // Analytics
    ExportCompleted,
}

impl EventType {
    pub const ALL: &'static [EventType] = &[
        EventType::VendorCreated,
        EventType::VendorUpdated,
        EventType::VendorDeleted,
        EventType::PurchaseOrderCreated,
        EventType::PurchaseOrderApproved,
        EventType::PurchaseOrderReceived,
        EventType::PurchaseOrderCancelled,
        EventType::InvoiceCreated,
        EventType::InvoiceSent,
        EventType::InvoicePaid,
        EventType::InvoiceOverdue,
        EventType::InvoiceCancelled,
        EventType::PaymentReceived,
        EventType::EmployeeCreated,
        EventType::EmployeeUpdated,
        EventType::EmployeeTerminated,
        EventType::LeaveRequestSubmitted,
        EventType::LeaveRequestApproved,
        EventType::LeaveRequestRejected,
        EventType::PayrollProcessed,
        EventType::ExportCompleted,
    ];

    /// Stable wire name, used in payloads, headers and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VendorCreated => "vendor.created",
            Self::VendorUpdated => "vendor.updated",
            Self::VendorDeleted => "vendor.deleted",
            Self::PurchaseOrderCreated => "purchase_order.created",
            Self::PurchaseOrderApproved => "purchase_order.approved",
            Self::PurchaseOrderReceived => "purchase_order.received",
            Self::PurchaseOrderCancelled => "purchase_order.cancelled",
            Self::InvoiceCreated => "invoice.created",
            Self::InvoiceSent => "invoice.sent",
            Self::InvoicePaid => "invoice.paid",
            Self::InvoiceOverdue => "invoice.overdue",
            Self::InvoiceCancelled => "invoice.cancelled",
            Self::PaymentReceived => "payment.received",
            Self::EmployeeCreated => "employee.created",
            Self::EmployeeUpdated => "employee.updated",
            Self::EmployeeTerminated => "employee.terminated",
            Self::LeaveRequestSubmitted => "leave_request.submitted",
            Self::LeaveRequestApproved => "leave_request.approved",
            Self::LeaveRequestRejected => "leave_request.rejected",
            Self::PayrollProcessed => "payroll.processed",
            Self::ExportCompleted => "export.completed",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

impl TryFrom<String> for EventType {
    type Error = UnknownEventType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventType> for &'static str {
    fn from(event: EventType) -> Self {
        event.as_str()
    }
}

/// Envelope timestamps are always UTC with exactly three fractional digits.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// Render `timestamp` as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, time::error::Format> {
    timestamp.to_offset(UtcOffset::UTC).format(TIMESTAMP_FORMAT)
}

mod envelope_timestamp {
    use super::{OffsetDateTime, PrimitiveDateTime, TIMESTAMP_FORMAT, format_timestamp};
    use serde::{Deserialize, Deserializer, Serializer, de, ser};

    pub fn serialize<S: Serializer>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let rendered = format_timestamp(*value).map_err(ser::Error::custom)?;
        serializer.serialize_str(&rendered)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PrimitiveDateTime::parse(&raw, TIMESTAMP_FORMAT)
            .map(PrimitiveDateTime::assume_utc)
            .map_err(de::Error::custom)
    }
}

/// The `{event, timestamp, data}` document delivered to every subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub event: EventType,

    #[serde(with = "envelope_timestamp")]
    pub timestamp: OffsetDateTime,

    pub data: Value,
}

impl Envelope {
    /// Envelope stamped with the current UTC time at millisecond precision.
    pub fn new(event: EventType, data: Value) -> Self {
        let now = OffsetDateTime::now_utc();
        let timestamp = now
            .replace_nanosecond(u32::from(now.millisecond()) * 1_000_000)
            .unwrap_or(now);

        Self {
            event,
            timestamp,
            data,
        }
    }

    /// Timestamp rendered exactly as it appears in the serialized body.
    pub fn timestamp_rfc3339(&self) -> Result<String, time::error::Format> {
        format_timestamp(self.timestamp)
    }

    /// Serialize to the canonical JSON text that is signed and sent.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
