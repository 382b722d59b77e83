use std::time::Duration;

use serde::Deserialize;

// ═══════════════════════════════════════════════════════════════
//  Policies
// ═══════════════════════════════════════════════════════════════

/// Что делать со строкой, не подходящей под грамматику записи.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Залогировать строку и перейти к следующей.
    #[default]
    Skip,
    /// Завершить replay с ошибкой `MalformedRecord`.
    Abort,
}

/// Что делать, если publish вернул ошибку (или истёк таймаут).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishErrorPolicy {
    /// Залогировать и продолжить со следующим событием по расписанию.
    #[default]
    Continue,
    /// Завершить replay с ошибкой `Publish`.
    Abort,
}

/// Интерпретация дробной части секунд в `HH:MM:SS.fff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FractionMode {
    /// Цифры после точки — целое число микросекунд, независимо от их
    /// количества: `.5` = 5µs, `.000500` = 500µs.
    #[default]
    Literal,
    /// Цифры после точки — десятичная доля секунды: `.5` = 500ms.
    /// Всё, что точнее наносекунды, отбрасывается.
    Scaled,
}

macro_rules! impl_from_str {
    ($ty:ty { $($name:literal => $variant:expr),+ $(,)? }) => {
        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($variant),)+
                    other => Err(format!(
                        "invalid value '{other}' (expected one of: {})",
                        [$($name),+].join(", ")
                    )),
                }
            }
        }
    };
}

impl_from_str!(MalformedPolicy { "skip" => MalformedPolicy::Skip, "abort" => MalformedPolicy::Abort });
impl_from_str!(PublishErrorPolicy { "continue" => PublishErrorPolicy::Continue, "abort" => PublishErrorPolicy::Abort });
impl_from_str!(FractionMode { "literal" => FractionMode::Literal, "scaled" => FractionMode::Scaled });

// ═══════════════════════════════════════════════════════════════
//  ReplayConfig
// ═══════════════════════════════════════════════════════════════

/// Настройки планировщика (секция `[replay]` конфига).
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    #[serde(default)]
    pub on_malformed: MalformedPolicy,
    #[serde(default)]
    pub on_publish_error: PublishErrorPolicy,
    /// Таймаут ожидания одного publish в мс (0 = без ограничения).
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    #[serde(default)]
    pub fraction: FractionMode,
}

fn default_publish_timeout_ms() -> u64 {
    10_000
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            on_malformed: MalformedPolicy::default(),
            on_publish_error: PublishErrorPolicy::default(),
            publish_timeout_ms: default_publish_timeout_ms(),
            fraction: FractionMode::default(),
        }
    }
}

impl ReplayConfig {
    pub fn with_on_malformed(mut self, policy: MalformedPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    pub fn with_on_publish_error(mut self, policy: PublishErrorPolicy) -> Self {
        self.on_publish_error = policy;
        self
    }

    pub fn with_publish_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.publish_timeout_ms = timeout.map_or(0, |t| t.as_millis().max(1) as u64);
        self
    }

    pub fn with_fraction(mut self, mode: FractionMode) -> Self {
        self.fraction = mode;
        self
    }

    pub fn publish_timeout(&self) -> Option<Duration> {
        (self.publish_timeout_ms > 0).then(|| Duration::from_millis(self.publish_timeout_ms))
    }
}
