#[derive(Debug, Clone, Copy)]
pub struct WarnEvent<'a> {
    pub code: &'a str,
    pub stage: &'a str,
    pub source: &'a str,
    pub reason: &'a str,
    pub err: &'a str,
}

fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if !ch.is_control() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn render(event: &WarnEvent<'_>) -> String {
    format!(
        "HARVEST_WARN code={} stage={} source={} reason={} err={}",
        sanitize_value(event.code),
        sanitize_value(event.stage),
        sanitize_value(event.source),
        sanitize_value(event.reason),
        sanitize_value(event.err),
    )
}

pub fn emit(event: WarnEvent<'_>) {
    eprintln!("{}", render(&event));
}

#[cfg(test)]
mod tests {
    use super::{WarnEvent, render, sanitize_value};

    #[test]
    fn sanitize_value_rewrites_whitespace() {
        assert_eq!(sanitize_value("a b\tc"), "a_b_c");
        assert_eq!(sanitize_value("  padded  "), "padded");
    }

    #[test]
    fn sanitize_value_falls_back_for_empty() {
        assert_eq!(sanitize_value("   "), "na");
        assert_eq!(sanitize_value(""), "na");
    }

    #[test]
    fn sanitize_value_keeps_non_ascii_text() {
        assert_eq!(sanitize_value("día raro"), "día_raro");
    }

    #[test]
    fn render_is_single_line() {
        let line = render(&WarnEvent {
            code: "FETCH_FAILED",
            stage: "fetching",
            source: "https://example.test/?id=1",
            reason: "transport",
            err: "connection refused\nretry later",
        });
        assert!(!line.contains('\n'));
        assert!(line.starts_with("HARVEST_WARN code=FETCH_FAILED stage=fetching"));
        assert!(line.ends_with("err=connection_refused_retry_later"));
    }
}
