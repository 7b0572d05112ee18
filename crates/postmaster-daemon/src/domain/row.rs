//! The unit read from the message store.

/// One SMS row from the message store.
///
/// Rows are immutable once read and live only for the poll cycle that
/// fetched them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// Store-assigned message GUID.
    pub guid: String,
    /// The archived message body (streamtyped envelope).  Empty when the
    /// store holds NULL for this row.
    pub attributed_body: Vec<u8>,
    /// Store timestamp; the monitor's watermark is expressed in this unit.
    pub timestamp: i64,
}
