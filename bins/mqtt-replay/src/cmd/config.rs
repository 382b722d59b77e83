use clap::Args;
use serde::Deserialize;

use replay_api::QoS;
use replay_engine::{FractionMode, MalformedPolicy, PublishErrorPolicy, ReplayConfig};
use transport_mqtt::MqttConfig;

use super::error::MqttReplayError;

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub input: Option<String>,
    pub dry_run: Option<bool>,
    pub quiet: Option<bool>,
    #[serde(default)]
    pub transport: MqttConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

pub fn load_config(path: &str) -> Result<Config, MqttReplayError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| MqttReplayError::Config(format!("cannot read config {path}: {e}")))?;
    toml::from_str(&content).map_err(|e| MqttReplayError::Config(format!("bad config {path}: {e}")))
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// Путь к mqtt-replay.toml
    #[arg(long, default_value = "mqtt-replay.toml", env = "MQTT_REPLAY_CONFIG")]
    pub config: String,

    /// MQTT broker host
    #[arg(long, env = "MQTT_REPLAY_HOST")]
    pub host: Option<String>,

    /// MQTT broker port
    #[arg(long, env = "MQTT_REPLAY_PORT")]
    pub port: Option<u16>,

    /// Client id (по умолчанию mqtt-replay-<pid>)
    #[arg(long)]
    pub client_id: Option<String>,

    /// QoS публикации: 0, 1 или 2
    #[arg(long)]
    pub qos: Option<QoS>,

    /// Публиковать с retain-флагом
    #[arg(long)]
    pub retain: bool,

    /// Файл лога. Без указания — stdin
    #[arg(long)]
    pub input: Option<String>,

    /// Битая строка: skip | abort
    #[arg(long)]
    pub on_malformed: Option<MalformedPolicy>,

    /// Ошибка publish: continue | abort
    #[arg(long)]
    pub on_publish_error: Option<PublishErrorPolicy>,

    /// Таймаут одного publish в мс (0 = без ограничения)
    #[arg(long)]
    pub publish_timeout_ms: Option<u64>,

    /// Дробная часть секунд: literal (микросекунды) | scaled (доля секунды)
    #[arg(long)]
    pub fraction: Option<FractionMode>,

    /// Не подключаться к брокеру, только логировать
    #[arg(long)]
    pub dry_run: bool,

    /// Не печатать "Publishing ..." в stdout
    #[arg(long)]
    pub quiet: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: config.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub transport: MqttConfig,
    pub replay: ReplayConfig,
    pub input: Option<String>,
    pub dry_run: bool,
    pub quiet: bool,
}

impl Effective {
    pub fn new(args: &ReplayArgs) -> Result<Self, MqttReplayError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                Config::default()
            }
        };

        let mut transport = cfg.transport;
        if let Some(ref host) = args.host {
            transport.host = host.clone();
        }
        if let Some(port) = args.port {
            transport.port = port;
        }
        if args.client_id.is_some() {
            transport.client_id = args.client_id.clone();
        }
        if let Some(qos) = args.qos {
            transport.qos = qos;
        }
        transport.retain |= args.retain;

        let mut replay = cfg.replay;
        if let Some(policy) = args.on_malformed {
            replay.on_malformed = policy;
        }
        if let Some(policy) = args.on_publish_error {
            replay.on_publish_error = policy;
        }
        if let Some(ms) = args.publish_timeout_ms {
            replay.publish_timeout_ms = ms;
        }
        if let Some(mode) = args.fraction {
            replay.fraction = mode;
        }

        Ok(Self {
            transport,
            replay,
            input: args.input.clone().or(cfg.input),
            dry_run: args.dry_run || cfg.dry_run.unwrap_or(false),
            quiet: args.quiet || cfg.quiet.unwrap_or(false),
        })
    }
}
