//! Structural schemas for raw ping input.
//!
//! These describe what a well-formed request looks like before it is
//! deserialized. The server validates against them, logs a redacted copy
//! of anything that fails, and uses them to pull the client platform out
//! of an otherwise-unknown payload.

use crate::request::Platform;
use commsync_schema::Schema;
use serde_json::Value;

/// Name of the refinement that accepts a platform string.
pub const PLATFORM_REFINEMENT: &str = "platform";

const TIMESTAMP_REFINEMENT: &str = "timestamp";
const DATE_REFINEMENT: &str = "date (YYYY-MM-DD)";

/// Returns true if `date` is `YYYY-MM-DD` with a plausible month and day.
pub fn is_valid_date(date: &str) -> bool {
    let bytes = date.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let digits = |range: std::ops::Range<usize>| -> Option<u32> {
        let part = &date[range];
        if part.bytes().all(|b| b.is_ascii_digit()) {
            part.parse().ok()
        } else {
            None
        }
    };
    match (digits(0..4), digits(5..7), digits(8..10)) {
        (Some(_), Some(month), Some(day)) => (1..=12).contains(&month) && (1..=31).contains(&day),
        _ => false,
    }
}

fn timestamp() -> Schema {
    Schema::refine(TIMESTAMP_REFINEMENT, Schema::Number, |value| {
        value.as_u64().is_some()
    })
}

fn date() -> Schema {
    Schema::refine(DATE_REFINEMENT, Schema::String, |value| {
        value.as_str().is_some_and(is_valid_date)
    })
}

/// Schema of a `CalendarQuery`.
pub fn calendar_query_schema() -> Schema {
    let filter = Schema::union([
        Schema::shape([("type", Schema::literal("not_deleted"))]),
        Schema::shape([
            ("type", Schema::literal("thread_list")),
            ("threadIDs", Schema::list(Schema::String)),
        ]),
    ]);
    Schema::shape([
        ("navID", Schema::String),
        ("startDate", date()),
        ("endDate", date()),
        ("filters", Schema::maybe(Schema::list(filter))),
    ])
}

/// Schema of one `ClientResponse`. Push tokens are marked sensitive.
pub fn client_response_schema() -> Schema {
    Schema::union([
        Schema::shape([
            ("type", Schema::literal("PLATFORM")),
            (
                "platform",
                Schema::one_of(PLATFORM_REFINEMENT, &["ios", "android", "web"]),
            ),
        ]),
        Schema::shape([
            ("type", Schema::literal("DEVICE_TOKEN")),
            ("deviceToken", Schema::sensitive(Schema::String)),
        ]),
    ])
}

/// Schema of a `PingRequest`. Undeclared keys are rejected.
pub fn ping_request_schema() -> Schema {
    Schema::shape([
        ("calendarQuery", calendar_query_schema()),
        ("lastPing", Schema::maybe(timestamp())),
        ("messagesCurrentAsOf", Schema::maybe(timestamp())),
        ("updatesCurrentAsOf", Schema::maybe(timestamp())),
        ("watchedIDs", Schema::list(Schema::String)),
        (
            "clientResponses",
            Schema::maybe(Schema::list(client_response_schema())),
        ),
    ])
}

/// Returns the platform named by the first well-formed PLATFORM response
/// in `input`, even if the rest of the input is malformed.
pub fn find_platform(input: &Value) -> Option<Platform> {
    let found = commsync_schema::find_first(&ping_request_schema(), input, PLATFORM_REFINEMENT)?;
    serde_json::from_value(found).ok()
}
