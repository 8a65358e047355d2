use crate::harvest::clock::Clock;
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc,
};
use chrono_tz::Tz;

/// Rendered date pattern on comment timestamps, minus the trailing zone.
const STRICT_FORMAT: &str = "%d %B %Y @ %I:%M:%S %p";

const DATETIME_FORMATS: &[&str] = &[
    "%d %B %Y %I:%M:%S %p",
    "%d %B %Y %I:%M %p",
    "%B %d %Y %I:%M:%S %p",
    "%B %d %Y %I:%M %p",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%B %d %Y %H:%M:%S",
    "%B %d %Y %H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %I:%M:%S %p",
    "%d/%m/%Y %I:%M %p",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%d %B %Y", "%B %d %Y", "%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

// Year-less text gets the current year appended before matching these.
const YEARLESS_DATETIME_FORMATS: &[&str] = &[
    "%d %B %I:%M:%S %p %Y",
    "%d %B %I:%M %p %Y",
    "%B %d %I:%M:%S %p %Y",
    "%B %d %I:%M %p %Y",
    "%d %B %H:%M:%S %Y",
    "%d %B %H:%M %Y",
    "%B %d %H:%M:%S %Y",
    "%B %d %H:%M %Y",
];

const FILLER_WORDS: &[&str] = &[
    "@", "at", "on", "the", "de", "del", "el", "la", "las", "a", "y", "-",
];

const WEEKDAYS: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "mon", "tue",
    "tues", "wed", "thu", "thur", "thurs", "fri", "sat", "sun", "lunes", "martes", "miércoles",
    "miercoles", "jueves", "viernes", "sábado", "sabado", "domingo",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized {
    pub instant: DateTime<Utc>,
    pub degraded: bool,
}

pub struct TimestampNormalizer<'a> {
    zone: Tz,
    clock: &'a dyn Clock,
}

impl<'a> TimestampNormalizer<'a> {
    /// `zone` is applied to any text that carries no zone of its own.
    pub fn new(zone: Tz, clock: &'a dyn Clock) -> Self {
        Self { zone, clock }
    }

    /// Never fails: unparseable text yields the clock's current instant
    /// with `degraded` set.
    pub fn normalize(&self, raw: &str) -> Normalized {
        match self.try_normalize(raw) {
            Some(instant) => Normalized {
                instant,
                degraded: false,
            },
            None => self.fallback(),
        }
    }

    /// Substitute used when there is no date text to parse at all.
    pub fn fallback(&self) -> Normalized {
        Normalized {
            instant: self.clock.now(),
            degraded: true,
        }
    }

    pub fn try_normalize(&self, raw: &str) -> Option<DateTime<Utc>> {
        let cleaned = clean(raw);
        if cleaned.is_empty() {
            return None;
        }
        strict_with_zone(&cleaned)
            .or_else(|| self.strict_local(&cleaned))
            .or_else(|| strip_trailing_token(&cleaned).and_then(|head| self.strict_local(head)))
            .or_else(|| self.permissive(raw.trim(), &cleaned))
    }

    /// The rendered pattern with no zone, read in the source zone.
    fn strict_local(&self, text: &str) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(text, STRICT_FORMAT)
            .ok()
            .and_then(|naive| self.localize(naive))
    }

    /// Interpret a wall-clock reading in the source zone. Readings inside a
    /// DST gap are moved forward by an hour.
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.zone
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                self.zone
                    .from_local_datetime(&(naive + Duration::hours(1)))
                    .earliest()
            })
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn permissive(&self, raw: &str, cleaned: &str) -> Option<DateTime<Utc>> {
        for candidate in [raw, cleaned] {
            if let Ok(dt) = DateTime::parse_from_rfc3339(candidate) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = DateTime::parse_from_rfc2822(candidate) {
                return Some(dt.with_timezone(&Utc));
            }
        }

        let now = self.clock.now();
        let lowered = cleaned.to_lowercase();
        if let Some(dt) = relative(&lowered, now) {
            return Some(dt);
        }

        let canon = canonicalize(&lowered);
        let (body, offset) = split_zone(&canon);
        let to_utc = |naive: NaiveDateTime| match offset {
            Some(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
            None => self.localize(naive),
        };

        for fmt in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(body, fmt) {
                return to_utc(naive);
            }
        }
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(body, fmt) {
                return date.and_hms_opt(0, 0, 0).and_then(to_utc);
            }
        }

        if has_year(body) {
            return None;
        }
        let year = now.with_timezone(&self.zone).year();
        let with_year = format!("{body} {year}");
        for fmt in YEARLESS_DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&with_year, fmt) {
                return to_utc(naive);
            }
        }
        for fmt in &DATE_FORMATS[..2] {
            if let Ok(date) = NaiveDate::parse_from_str(&with_year, fmt) {
                return date.and_hms_opt(0, 0, 0).and_then(to_utc);
            }
        }
        None
    }
}

/// Drop thousands-separator commas and collapse whitespace runs.
fn clean(raw: &str) -> String {
    raw.replace(',', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove the final space-delimited token. `None` when there is only one.
fn strip_trailing_token(text: &str) -> Option<&str> {
    text.rsplit_once(' ').map(|(head, _)| head.trim_end())
}

fn strict_with_zone(cleaned: &str) -> Option<DateTime<Utc>> {
    let (head, zone) = cleaned.rsplit_once(' ')?;
    let offset = zone_offset(zone)?;
    let naive = NaiveDateTime::parse_from_str(head, STRICT_FORMAT).ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn zone_offset(token: &str) -> Option<FixedOffset> {
    let hours: i32 = match token.to_ascii_uppercase().as_str() {
        "UTC" | "GMT" | "Z" | "WET" => 0,
        "WEST" | "BST" | "CET" => 1,
        "CEST" | "EET" => 2,
        "EEST" => 3,
        "IST" => return FixedOffset::east_opt(5 * 3600 + 1800),
        "JST" | "KST" => 9,
        "AEST" => 10,
        "AEDT" => 11,
        "HST" => -10,
        "AKST" => -9,
        "AKDT" | "PST" => -8,
        "PDT" | "MST" => -7,
        "MDT" | "CST" => -6,
        "CDT" | "EST" => -5,
        "EDT" => -4,
        _ => return numeric_offset(token),
    };
    FixedOffset::east_opt(hours * 3600)
}

/// `+hh`, `+hhmm` or `+hh:mm` (and the `-` forms).
fn numeric_offset(token: &str) -> Option<FixedOffset> {
    let (sign, rest) = match token.as_bytes().first()? {
        b'+' => (1, &token[1..]),
        b'-' => (-1, &token[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hh, mm) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hh > 14 || mm > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hh * 3600 + mm * 60))
}

fn split_zone(canon: &str) -> (&str, Option<FixedOffset>) {
    if let Some((head, last)) = canon.rsplit_once(' ') {
        if let Some(offset) = zone_offset(last) {
            return (head, Some(offset));
        }
    }
    (canon, None)
}

fn has_year(text: &str) -> bool {
    text.split(|c: char| !c.is_ascii_digit())
        .any(|run| run.len() == 4)
}

fn unit_seconds(word: &str) -> Option<i64> {
    let secs = match word {
        "second" | "seconds" | "sec" | "secs" | "segundo" | "segundos" => 1,
        "minute" | "minutes" | "min" | "mins" | "minuto" | "minutos" => 60,
        "hour" | "hours" | "hr" | "hrs" | "hora" | "horas" => 3_600,
        "day" | "days" | "día" | "días" | "dia" | "dias" => 86_400,
        "week" | "weeks" | "semana" | "semanas" => 604_800,
        "month" | "months" | "mes" | "meses" => 2_592_000,
        "year" | "years" | "año" | "años" => 31_536_000,
        _ => return None,
    };
    Some(secs)
}

fn count_word(word: &str) -> Option<i64> {
    match word {
        "a" | "an" | "one" | "un" | "una" | "uno" => Some(1),
        _ => word.parse::<i64>().ok().filter(|n| *n >= 0),
    }
}

/// "5 minutes ago", "hace 3 días", "just now", "yesterday", ...
fn relative(lowered: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    match tokens.as_slice() {
        ["now"] | ["just", "now"] | ["ahora"] | ["ahora", "mismo"] | ["justo", "ahora"]
        | ["today"] | ["hoy"] => Some(now),
        ["yesterday"] | ["ayer"] => now.checked_sub_signed(Duration::days(1)),
        [count, unit, "ago"] | ["hace", count, unit] => {
            let secs = count_word(count)?.checked_mul(unit_seconds(unit)?)?;
            now.checked_sub_signed(Duration::try_seconds(secs)?)
        }
        _ => None,
    }
}

fn month_alias(token: &str) -> Option<&'static str> {
    let english = match token {
        "enero" | "ene" => "january",
        "febrero" => "february",
        "marzo" => "march",
        "abril" | "abr" => "april",
        "mayo" => "may",
        "junio" => "june",
        "julio" => "july",
        "agosto" | "ago" => "august",
        "septiembre" | "setiembre" | "sept" | "set" => "september",
        "octubre" => "october",
        "noviembre" => "november",
        "diciembre" | "dic" => "december",
        _ => return None,
    };
    Some(english)
}

fn strip_ordinal(token: &str) -> &str {
    let digits_end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    if digits_end == 0 {
        return token;
    }
    match &token[digits_end..] {
        "st" | "nd" | "rd" | "th" | "º" | "°" | "o" => &token[..digits_end],
        _ => token,
    }
}

/// Reduce free-form, lowercased date text to the English, single-spaced
/// shape the chrono format lists expect.
fn canonicalize(lowered: &str) -> String {
    let text = lowered
        .replace("a. m.", "am")
        .replace("p. m.", "pm")
        .replace("a.m.", "am")
        .replace("p.m.", "pm");

    let mut out: Vec<String> = Vec::new();
    for raw_token in text.split_whitespace() {
        let token = raw_token.trim_end_matches('.');
        if token.is_empty() || FILLER_WORDS.contains(&token) || WEEKDAYS.contains(&token) {
            continue;
        }
        if let Some(month) = month_alias(token) {
            out.push(month.to_string());
            continue;
        }

        // 2024-03-15t15:45:12 -> "2024-03-15" "15:45:12"
        if token.starts_with(|c: char| c.is_ascii_digit()) {
            if let Some((date, time)) = token.split_once('t') {
                if time.starts_with(|c: char| c.is_ascii_digit()) {
                    out.push(date.to_string());
                    match time.strip_suffix('z') {
                        Some(t) => {
                            out.push(t.to_string());
                            out.push("z".to_string());
                        }
                        None => out.push(time.to_string()),
                    }
                    continue;
                }
            }
        }

        // 3:45pm -> "3:45" "pm"
        let glued = token
            .strip_suffix("am")
            .map(|t| (t, "am"))
            .or_else(|| token.strip_suffix("pm").map(|t| (t, "pm")));
        if let Some((time, meridiem)) = glued {
            if time.ends_with(|c: char| c.is_ascii_digit()) {
                out.push(time.to_string());
                out.push(meridiem.to_string());
                continue;
            }
        }

        out.push(strip_ordinal(token).to_string());
    }
    out.join(" ")
}
