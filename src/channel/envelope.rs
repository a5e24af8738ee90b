//! `[u32 LE length][payload]` framing at offset 0 of a fixed region.

use crate::{Result, TelemetryError};

/// Bytes taken by the length prefix.
pub const HEADER_LEN: usize = 4;

/// Largest payload a region of `region_len` bytes can hold.
pub fn max_payload(region_len: usize) -> usize {
    region_len.saturating_sub(HEADER_LEN)
}

/// Overwrite the region with `payload`, length prefix first.
///
/// Oversized payloads are rejected and leave the region untouched.
pub fn write_envelope(region: &mut [u8], payload: &[u8]) -> Result<()> {
    let capacity = max_payload(region.len());
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|_| region.len() >= HEADER_LEN && payload.len() <= capacity)
        .ok_or(TelemetryError::PayloadTooLarge { len: payload.len(), capacity })?;

    region[..HEADER_LEN].copy_from_slice(&len.to_le_bytes());
    region[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);
    Ok(())
}

/// Borrow the current payload.
///
/// Returns `Ok(None)` for a zero length (nothing published yet) and a parse
/// error when the prefix claims more bytes than the region holds.
pub fn read_envelope(region: &[u8]) -> Result<Option<&[u8]>> {
    let header: [u8; HEADER_LEN] = region
        .get(..HEADER_LEN)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            TelemetryError::parse_error(
                "snapshot envelope",
                format!("region of {} bytes cannot hold a length prefix", region.len()),
            )
        })?;

    let len = u32::from_le_bytes(header) as usize;
    if len == 0 {
        return Ok(None);
    }

    region.get(HEADER_LEN..HEADER_LEN + len).map(Some).ok_or_else(|| {
        TelemetryError::parse_error(
            "snapshot envelope",
            format!("length prefix {} exceeds capacity {}", len, max_payload(region.len())),
        )
    })
}
