//! Status codes some transports misreport.

/// `file://` requests complete with status 0.
pub const FILE_SCHEME_STATUS: u16 = 0;

/// Older IE releases report 1233 for a 204 response.
pub const LEGACY_NO_CONTENT_STATUS: u16 = 1233;

/// Map a raw transport status to the one callers see.
pub fn normalize_status(raw: u16) -> u16 {
    match raw {
        FILE_SCHEME_STATUS => 200,
        LEGACY_NO_CONTENT_STATUS => 204,
        other => other,
    }
}
