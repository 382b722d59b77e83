use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use replay_api::{Ack, Event, PublishError, Publisher};

use crate::config::{MalformedPolicy, PublishErrorPolicy, ReplayConfig};
use crate::error::ReplayError;
use crate::record::{ParsedLine, parse_bytes};

// ═══════════════════════════════════════════════════════════════
//  Report
// ═══════════════════════════════════════════════════════════════

/// Почему replay завершился без ошибки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayEnd {
    /// Входной поток закончился.
    #[default]
    EndOfInput,
    /// Прочитана пустая строка.
    Sentinel,
    /// Сработал CancellationToken.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayReport {
    /// Прочитано строк (включая пустую строку-маркер).
    pub lines: u64,
    pub published: u64,
    /// Пропущено битых строк (MalformedPolicy::Skip).
    pub skipped: u64,
    /// Неудачных publish (PublishErrorPolicy::Continue).
    pub failed: u64,
    pub end: ReplayEnd,
}

// ═══════════════════════════════════════════════════════════════
//  Session — anchor pair
// ═══════════════════════════════════════════════════════════════

/// Якорь replay: фиксируется на первом валидном событии и больше не меняется.
struct Session {
    capture_offset: Duration,
    wall: Instant,
}

impl Session {
    fn anchor(event: &Event) -> Self {
        Self { capture_offset: event.offset, wall: Instant::now() }
    }

    /// `wall + (offset - capture_offset)`; offset раньше якоря — сразу.
    fn target(&self, offset: Duration) -> Instant {
        self.wall + offset.saturating_sub(self.capture_offset)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

/// Последовательный планировщик replay.
///
/// Читает строки по одной (вход не буферизуется целиком), ждёт момента
/// публикации относительно якоря и дожидается завершения каждого publish,
/// прежде чем читать следующую строку. Задержка publish накапливается:
/// компенсации дрейфа нет.
pub struct Scheduler<P> {
    publisher: P,
    config: ReplayConfig,
}

impl<P: Publisher> Scheduler<P> {
    pub fn new(publisher: P, config: ReplayConfig) -> Self {
        Self { publisher, config }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn into_publisher(self) -> P {
        self.publisher
    }

    /// Прогнать replay по входу до конца потока, пустой строки,
    /// отмены `token` или ошибки при политике Abort.
    pub async fn run<R>(&mut self, mut input: R, token: &CancellationToken) -> Result<ReplayReport, ReplayError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        let mut session: Option<Session> = None;
        let mut report = ReplayReport::default();

        loop {
            if token.is_cancelled() {
                report.end = ReplayEnd::Cancelled;
                break;
            }

            buf.clear();
            let read = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    report.end = ReplayEnd::Cancelled;
                    break;
                }
                read = input.read_until(b'\n', &mut buf) => read?,
            };
            if read == 0 {
                report.end = ReplayEnd::EndOfInput;
                break;
            }
            report.lines += 1;

            let event = match parse_bytes(trim_line_ending(&buf), self.config.fraction) {
                Ok(ParsedLine::Event(event)) => event,
                Ok(ParsedLine::End) => {
                    report.end = ReplayEnd::Sentinel;
                    break;
                }
                Err(e) => match self.config.on_malformed {
                    MalformedPolicy::Skip => {
                        tracing::warn!(line_no = report.lines, line = %e.line, reason = %e.reason, "skipping malformed record");
                        report.skipped += 1;
                        continue;
                    }
                    MalformedPolicy::Abort => {
                        return Err(ReplayError::Malformed { line_no: report.lines, source: e });
                    }
                },
            };

            match &session {
                None => {
                    tracing::info!(offset = ?event.offset, "replay anchored");
                    session = Some(Session::anchor(&event));
                }
                Some(s) => {
                    let target = s.target(event.offset);
                    let now = Instant::now();
                    if target > now {
                        tracing::debug!(topic = %event.topic, wait = ?(target - now), "waiting");
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => {
                                report.end = ReplayEnd::Cancelled;
                                break;
                            }
                            _ = tokio::time::sleep_until(target) => {}
                        }
                    } else if now > target {
                        tracing::debug!(topic = %event.topic, lag = ?(now - target), "behind schedule");
                    }
                }
            }

            tracing::info!(topic = %event.topic, payload = %event.payload, "publishing");
            match self.publish(&event).await {
                Ok(ack) => {
                    tracing::trace!(packet_id = ack.packet_id, "published");
                    report.published += 1;
                }
                Err(e) => match self.config.on_publish_error {
                    PublishErrorPolicy::Continue => {
                        tracing::error!(topic = %event.topic, payload = %event.payload, error = ?e, "publish failed");
                        report.failed += 1;
                    }
                    PublishErrorPolicy::Abort => {
                        return Err(ReplayError::Publish {
                            topic: event.topic,
                            payload: event.payload,
                            source: e,
                        });
                    }
                },
            }
        }

        tracing::info!(
            lines = report.lines,
            published = report.published,
            skipped = report.skipped,
            failed = report.failed,
            end = ?report.end,
            "replay finished"
        );
        Ok(report)
    }

    async fn publish(&mut self, event: &Event) -> Result<Ack, PublishError> {
        let limit = self.config.publish_timeout();
        let fut = self.publisher.publish(&event.topic, event.payload.as_bytes());
        match limit {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or_else(|_| Err(PublishError::timeout(format!("no confirmation within {limit:?}")))),
            None => fut.await,
        }
    }
}

/// Срезать `\n` или `\r\n` в конце строки.
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
