//! Parser for server-issued wait hints.
//!
//! Submission responses sometimes ask the client to hold off, phrased as
//! "Please wait <description> before trying again." The parser maps the two
//! known descriptions to exact durations and falls back to the category
//! default for everything else.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

const ONE_MINUTE: Duration = Duration::from_secs(60);
const FIVE_MINUTES: Duration = Duration::from_secs(5 * 60);

static WAIT_HINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Please wait (.*?) before trying again\.").expect("invalid wait hint regex")
});

/// Extracts an explicit wait duration from a response body.
///
/// Returns the hinted duration when the body contains the wait template with
/// a recognized description, otherwise `default`. An unrecognized description
/// is logged and treated as no hint. Pure apart from the log line.
pub fn cooldown_hint(body: &str, default: Duration) -> Duration {
    let Some(caps) = WAIT_HINT_RE.captures(body) else {
        return default;
    };

    let description = &caps[1];
    if description.contains("one minute") {
        ONE_MINUTE
    } else if description.contains("five") {
        FIVE_MINUTES
    } else {
        log::warn!("unknown wait time requested by the server: {description:?}");
        default
    }
}
