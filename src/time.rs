//! SCORM timespan arithmetic (`hh:mm:ss[.cc]`).

/// Add two timespans, carrying centiseconds through seconds, minutes and
/// hours. Hours are unbounded (total time accumulates across sessions, it is
/// not wall-clock), fields are zero-padded to two digits, and the centisecond
/// part is omitted when zero.
pub fn add_times(first: &str, second: &str) -> String {
    let (h1, m1, s1, c1) = split_time(first);
    let (h2, m2, s2, c2) = split_time(second);

    let mut cents = c1 + c2;
    let mut carry = cents / 100;
    cents %= 100;

    let mut secs = s1 + s2 + carry;
    carry = secs / 60;
    secs %= 60;

    let mut mins = m1 + m2 + carry;
    carry = mins / 60;
    mins %= 60;

    let hours = h1 + h2 + carry;

    if cents != 0 {
        format!("{:02}:{:02}:{:02}.{:02}", hours, mins, secs, cents)
    } else {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    }
}

/// Split `hh:mm:ss[.cc]` into its fields. Missing or unparsable fields count
/// as zero so an unset total time behaves like `00:00:00`.
fn split_time(time: &str) -> (u64, u64, u64, u64) {
    let mut fields = time.split(':');
    let hours = int_field(fields.next());
    let mins = int_field(fields.next());
    let mut second_fields = fields.next().unwrap_or("").split('.');
    let secs = int_field(second_fields.next());
    let cents = int_field(second_fields.next());
    (hours, mins, secs, cents)
}

fn int_field(field: Option<&str>) -> u64 {
    field.and_then(|f| f.parse().ok()).unwrap_or(0)
}
