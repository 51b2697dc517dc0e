use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};

/// Offset of Indian Standard Time from UTC, in seconds.
const IST_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

/// Returns the Indian Standard Time offset.
pub fn ist_offset() -> FixedOffset {
    match FixedOffset::east_opt(IST_OFFSET_SECONDS) {
        Some(offset) => offset,
        None => Utc.fix(),
    }
}

/// Returns the current time in Indian Standard Time.
pub fn ist_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&ist_offset())
}

/// Renders the `{today}`, `{yesterday}`, `{hour}` and `{min}` placeholders of `template`.
///
/// Dates render as `YYYY-MM-DD`, hours and minutes as two digits.
pub fn render_key_template(template: &str, now: DateTime<FixedOffset>) -> String {
    if !template.contains('{') {
        return template.to_owned();
    }

    let yesterday = now - Duration::days(1);

    template
        .replace("{today}", &now.format("%Y-%m-%d").to_string())
        .replace("{yesterday}", &yesterday.format("%Y-%m-%d").to_string())
        .replace("{hour}", &now.format("%H").to_string())
        .replace("{min}", &now.format("%M").to_string())
}
