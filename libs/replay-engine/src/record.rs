use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use replay_api::Event;

use crate::config::FractionMode;

// ═══════════════════════════════════════════════════════════════
//  Record grammar
// ═══════════════════════════════════════════════════════════════

// [context] HH:MM:SS.f+ TOPIC PAYLOAD
// Поиск не заякорен: всё, что стоит перед временем (дата и т.п.), игнорируется.
static RECORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{2}):([0-9]{2}):([0-9]{2})\.([0-9]+) ([^ ]+) (.*)").unwrap()
});

/// Результат разбора одной входной строки.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Event(Event),
    /// Пустая строка — явный маркер конца replay.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Строка не подходит под грамматику.
    NoMatch,
    /// Числовое поле не помещается в диапазон.
    Overflow(&'static str),
    /// Строка не является валидным UTF-8.
    InvalidUtf8,
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedReason::NoMatch => f.write_str("expected 'HH:MM:SS.fff TOPIC PAYLOAD'"),
            MalformedReason::Overflow(field) => write!(f, "{field} out of range"),
            MalformedReason::InvalidUtf8 => f.write_str("not valid UTF-8"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed record ({reason}): {line:?}")]
pub struct MalformedRecord {
    pub line: String,
    pub reason: MalformedReason,
}

impl MalformedRecord {
    fn new(line: &str, reason: MalformedReason) -> Self {
        Self { line: line.to_string(), reason }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Parsing
// ═══════════════════════════════════════════════════════════════

/// Разобрать одну строку лога.
///
/// Чистая функция: одна и та же строка всегда даёт один и тот же результат.
/// Никогда не паникует; переполнение числовых полей — `MalformedRecord`.
pub fn parse_line(line: &str, fraction: FractionMode) -> Result<ParsedLine, MalformedRecord> {
    if line.is_empty() {
        return Ok(ParsedLine::End);
    }

    let caps = RECORD_RE
        .captures(line)
        .ok_or_else(|| MalformedRecord::new(line, MalformedReason::NoMatch))?;

    // Все группы обязательные: при совпадении индексация не паникует.
    let hours: u64 = parse_field(line, &caps[1], "hours")?;
    let minutes: u64 = parse_field(line, &caps[2], "minutes")?;
    let seconds: u64 = parse_field(line, &caps[3], "seconds")?;
    let frac = parse_fraction(line, &caps[4], fraction)?;

    let offset = Duration::from_secs(hours * 3600 + minutes * 60 + seconds)
        .checked_add(frac)
        .ok_or_else(|| MalformedRecord::new(line, MalformedReason::Overflow("offset")))?;

    Ok(ParsedLine::Event(Event {
        offset,
        topic: caps[5].to_string(),
        payload: caps[6].to_string(),
    }))
}

/// Разобрать строку в сыром виде (без `\n`). Невалидный UTF-8 — `MalformedRecord`.
pub fn parse_bytes(raw: &[u8], fraction: FractionMode) -> Result<ParsedLine, MalformedRecord> {
    match std::str::from_utf8(raw) {
        Ok(line) => parse_line(line, fraction),
        Err(_) => Err(MalformedRecord {
            line: String::from_utf8_lossy(raw).into_owned(),
            reason: MalformedReason::InvalidUtf8,
        }),
    }
}

fn parse_field(line: &str, digits: &str, field: &'static str) -> Result<u64, MalformedRecord> {
    digits
        .parse()
        .map_err(|_| MalformedRecord::new(line, MalformedReason::Overflow(field)))
}

fn parse_fraction(line: &str, digits: &str, mode: FractionMode) -> Result<Duration, MalformedRecord> {
    match mode {
        FractionMode::Literal => parse_field(line, digits, "fraction").map(Duration::from_micros),
        FractionMode::Scaled => {
            // Дополняем нулями справа до 9 знаков, лишнее отбрасываем.
            let mut nanos: u32 = 0;
            for i in 0..9 {
                let digit = digits.as_bytes().get(i).map_or(0, |b| u32::from(b - b'0'));
                nanos = nanos * 10 + digit;
            }
            Ok(Duration::from_nanos(u64::from(nanos)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(line: &str) -> Event {
        match parse_line(line, FractionMode::Literal).unwrap() {
            ParsedLine::Event(e) => e,
            ParsedLine::End => panic!("unexpected end sentinel for {line:?}"),
        }
    }

    fn malformed(line: &str) -> MalformedReason {
        parse_line(line, FractionMode::Literal).unwrap_err().reason
    }

    #[test]
    fn parses_basic_record() {
        let e = event("00:00:01.000000 sensors/temp 21.5");
        assert_eq!(e.offset, Duration::from_secs(1));
        assert_eq!(e.topic, "sensors/temp");
        assert_eq!(e.payload, "21.5");
    }

    #[test]
    fn leading_context_is_ignored() {
        let e = event("2024-10-25 12:34:56.123456 home/door open");
        assert_eq!(
            e.offset,
            Duration::from_secs(12 * 3600 + 34 * 60 + 56) + Duration::from_micros(123_456)
        );
        assert_eq!(e.topic, "home/door");
        assert_eq!(e.payload, "open");
    }

    #[test]
    fn payload_keeps_embedded_spaces() {
        let e = event(r#"00:00:02.5 cmd/say {"text": "hello  world"} "#);
        assert_eq!(e.payload, r#"{"text": "hello  world"} "#);
    }

    #[test]
    fn payload_may_be_empty() {
        let e = event("00:00:02.5 status/ping ");
        assert_eq!(e.topic, "status/ping");
        assert_eq!(e.payload, "");
    }

    #[test]
    fn literal_fraction_counts_microseconds() {
        assert_eq!(event("00:00:00.5 t p").offset, Duration::from_micros(5));
        assert_eq!(event("00:00:00.000500 t p").offset, Duration::from_micros(500));
        assert_eq!(event("00:00:00.1234567 t p").offset, Duration::from_micros(1_234_567));
    }

    #[test]
    fn scaled_fraction_is_decimal_seconds() {
        let parse = |line| match parse_line(line, FractionMode::Scaled).unwrap() {
            ParsedLine::Event(e) => e.offset,
            ParsedLine::End => unreachable!(),
        };
        assert_eq!(parse("00:00:00.5 t p"), Duration::from_millis(500));
        assert_eq!(parse("00:00:01.000500 t p"), Duration::from_micros(1_000_500));
        assert_eq!(parse("00:00:00.1234567899 t p"), Duration::from_nanos(123_456_789));
    }

    #[test]
    fn empty_line_is_end_sentinel() {
        assert_eq!(parse_line("", FractionMode::Literal), Ok(ParsedLine::End));
    }

    #[test]
    fn missing_fields_are_malformed() {
        assert_eq!(malformed("garbage"), MalformedReason::NoMatch);
        assert_eq!(malformed(" "), MalformedReason::NoMatch);
        assert_eq!(malformed("00:00:01.000 sensors/temp"), MalformedReason::NoMatch);
        assert_eq!(malformed("00:00:01 sensors/temp 21.5"), MalformedReason::NoMatch);
        assert_eq!(malformed("00:00:01.0  sensors/temp 21.5"), MalformedReason::NoMatch);
    }

    #[test]
    fn malformed_carries_raw_line() {
        let err = parse_line("not a record", FractionMode::Literal).unwrap_err();
        assert_eq!(err.line, "not a record");
        assert!(err.to_string().contains("\"not a record\""));
    }

    #[test]
    fn oversized_fraction_is_overflow_not_panic() {
        let line = "00:00:01.99999999999999999999999 t p";
        assert_eq!(malformed(line), MalformedReason::Overflow("fraction"));
        assert!(parse_line(line, FractionMode::Scaled).is_ok());
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = parse_bytes(b"00:00:01.0 t \xff\xfe", FractionMode::Literal).unwrap_err();
        assert_eq!(err.reason, MalformedReason::InvalidUtf8);
        assert_eq!(err.line, "00:00:01.0 t \u{fffd}\u{fffd}");

        let ok = parse_bytes("00:00:01.0 t héllo".as_bytes(), FractionMode::Literal).unwrap();
        assert!(matches!(ok, ParsedLine::Event(e) if e.payload == "héllo"));
    }

    #[test]
    fn parsing_is_idempotent() {
        let line = "23:59:59.999999 a/b c d";
        let first = parse_line(line, FractionMode::Literal);
        let second = parse_line(line, FractionMode::Literal);
        assert_eq!(first, second);
    }
}
