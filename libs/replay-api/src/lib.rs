use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

mod error;

pub use error::{ErrorKind, PublishError};

// ════════════════════════════════════════════════════════════════
//  Event
// ════════════════════════════════════════════════════════════════

/// Одна запись захваченного лога.
///
/// Значение без владельца: живёт ровно одну итерацию цикла, который его
/// распарсил. Порядок offset'ов во входе не гарантируется.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Смещение от начала захвата.
    pub offset: Duration,
    /// Topic, непустой.
    pub topic: String,
    /// Непрозрачный payload, публикуется как есть (UTF-8 байты).
    pub payload: String,
}

// ════════════════════════════════════════════════════════════════
//  QoS / Ack
// ════════════════════════════════════════════════════════════════

/// MQTT Quality of Service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QoS {
    /// Fire and forget. Confirmed once the packet is written.
    #[default]
    AtMostOnce,
    /// Confirmed by PUBACK.
    AtLeastOnce,
    /// Confirmed by PUBCOMP.
    ExactlyOnce,
}

impl QoS {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

impl std::fmt::Display for QoS {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.level())
    }
}

impl FromStr for QoS {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" | "at_most_once" => Ok(QoS::AtMostOnce),
            "1" | "at_least_once" => Ok(QoS::AtLeastOnce),
            "2" | "exactly_once" => Ok(QoS::ExactlyOnce),
            other => Err(format!("invalid qos '{other}' (expected 0, 1 or 2)")),
        }
    }
}

impl<'de> Deserialize<'de> for QoS {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // В конфиге допустимы и `qos = 1`, и `qos = "at_least_once"`.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Level(u8),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Level(level) => QoS::from_level(level)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid qos level {level}"))),
            Repr::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Подтверждение публикации.
///
/// QoS 0: пакет записан в соединение. QoS 1/2: брокер подтвердил пакет.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ack {
    pub packet_id: u16,
}

// ════════════════════════════════════════════════════════════════
//  Publisher
// ════════════════════════════════════════════════════════════════

/// Publish capability, используемая планировщиком.
///
/// Соединение с брокером устанавливается реализацией один раз до старта
/// replay; планировщик только вызывает `publish` и всегда дожидается
/// результата, прежде чем перейти к следующему событию.
pub trait Publisher: Send {
    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<Ack, PublishError>> + Send + 'a>>;
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<Ack, PublishError>> + Send + 'a>> {
        (**self).publish(topic, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        qos: QoS,
    }

    #[test]
    fn qos_from_config_level_or_name() {
        let h: Holder = toml::from_str("qos = 1").unwrap();
        assert_eq!(h.qos, QoS::AtLeastOnce);
        let h: Holder = toml::from_str("qos = \"exactly_once\"").unwrap();
        assert_eq!(h.qos, QoS::ExactlyOnce);
        assert!(toml::from_str::<Holder>("qos = 3").is_err());
    }

    #[test]
    fn qos_from_cli_string() {
        assert_eq!("0".parse::<QoS>().unwrap(), QoS::AtMostOnce);
        assert_eq!("2".parse::<QoS>().unwrap(), QoS::ExactlyOnce);
        assert!("high".parse::<QoS>().is_err());
        assert_eq!(QoS::AtLeastOnce.to_string(), "1");
    }
}
