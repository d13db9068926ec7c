//! Console formatting helpers.

/// Compact elapsed/remaining time: seconds, mm:ss, hh:mm:ss, days or years.
pub fn time_str(seconds: f64) -> String {
    let nb_day = seconds / 86400.0;
    if nb_day >= 1.0 {
        let nb_year = nb_day / 365.0;
        if nb_year > 1.0 {
            if nb_year < 5.0 {
                format!("{:.1}y", nb_year)
            } else {
                format!("{:.0}y", nb_year)
            }
        } else {
            format!("{:.1}d", nb_day)
        }
    } else {
        let it = seconds as u64;
        let h = (it % 86400) / 3600;
        let m = (it % 3600) / 60;
        let s = it % 60;
        if h == 0 {
            if m == 0 {
                format!("{:02}s", s)
            } else {
                format!("{:02}:{:02}", m, s)
            }
        } else {
            format!("{:02}:{:02}:{:02}", h, m, s)
        }
    }
}

/// Timestamp suffix for split work files.
pub fn timestamp() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}", now)
}
