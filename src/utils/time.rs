use chrono::Duration;

/// This is the standard way of printing a duration in tasktimer, e.g. `1h2m3s`.
pub fn format_duration(v: Duration) -> String {
    let v = v.max(Duration::zero());
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}
