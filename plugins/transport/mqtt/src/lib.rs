use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use replay_api::{Ack, PublishError, Publisher, QoS};

mod config;

pub use config::MqttConfig;

/// Уведомления от event loop к publisher'у.
#[derive(Debug)]
enum Notice {
    Connected,
    /// Пакет PUBLISH записан в соединение.
    Written(u16),
    /// PUBACK (QoS 1) или PUBCOMP (QoS 2).
    Acked(u16),
    Failed(String),
}

// ═══════════════════════════════════════════════════════════════
//  Link — one client / event loop pair
// ═══════════════════════════════════════════════════════════════

/// Одно соединение: клиент, его event loop в отдельной задаче и канал уведомлений.
///
/// При drop event loop останавливается, и вместе с ним пропадают все
/// запросы, которые клиент ещё не отправил или не получил подтверждение.
struct Link {
    client: AsyncClient,
    notices: mpsc::UnboundedReceiver<Notice>,
    driver: JoinHandle<()>,
    token: CancellationToken,
}

impl Link {
    /// Новая clean session: дождаться CONNACK в пределах `connect_timeout`.
    async fn open(config: &MqttConfig) -> Result<Self, PublishError> {
        let client_id = config.client_id();
        if client_id.is_empty() || client_id.starts_with(' ') {
            return Err(PublishError::rejected(format!("invalid client_id '{client_id}'")));
        }

        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);
        if let Some(ref username) = config.username {
            options.set_credentials(username.clone(), config.password.clone().unwrap_or_default());
        }

        let (client, eventloop) = AsyncClient::new(options, 16);
        let (tx, notices) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let broker = config.broker_addr();
        let driver = tokio::spawn(drive(eventloop, tx, token.clone(), broker.clone()));

        // Link сам гасит event loop при drop, в том числе на ошибке ниже.
        let mut link = Self { client, notices, driver, token };
        tokio::time::timeout(config.connect_timeout(), link.wait_connected())
            .await
            .unwrap_or_else(|_| {
                Err(PublishError::timeout(format!(
                    "no CONNACK from {broker} within {:?}",
                    config.connect_timeout()
                )))
            })?;
        Ok(link)
    }

    async fn wait_connected(&mut self) -> Result<(), PublishError> {
        loop {
            match self.notices.recv().await {
                Some(Notice::Connected) => return Ok(()),
                Some(Notice::Failed(msg)) => return Err(PublishError::connection(msg)),
                Some(_) => {}
                None => return Err(PublishError::closed("mqtt event loop stopped")),
            }
        }
    }

    /// Сбросить остатки от предыдущих publish. `None`, если соединение
    /// уже оборвалось и link надо пересоздать.
    fn healthy(mut self) -> Option<Self> {
        let mut failed = false;
        while let Ok(notice) = self.notices.try_recv() {
            failed |= matches!(notice, Notice::Failed(_));
        }
        (!failed && !self.driver.is_finished()).then_some(self)
    }

    async fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<Ack, PublishError> {
        self.client
            .publish(topic, to_mqtt_qos(qos), retain, payload.to_vec())
            .await
            .map_err(|e| PublishError::closed(format!("mqtt client: {e}")))?;

        let mut pending: Option<u16> = None;
        loop {
            match self.notices.recv().await {
                Some(Notice::Written(pkid)) if qos == QoS::AtMostOnce => {
                    return Ok(Ack { packet_id: pkid });
                }
                Some(Notice::Written(pkid)) => pending = Some(pkid),
                Some(Notice::Acked(pkid)) if pending == Some(pkid) => {
                    return Ok(Ack { packet_id: pkid });
                }
                Some(Notice::Failed(msg)) => return Err(PublishError::connection(msg)),
                Some(_) => {}
                None => return Err(PublishError::closed("mqtt event loop stopped")),
            }
        }
    }

    /// DISCONNECT и остановка event loop.
    async fn close(mut self) {
        if let Err(e) = self.client.disconnect().await {
            tracing::debug!(error = %e, "disconnect request failed");
        }
        if tokio::time::timeout(Duration::from_secs(1), &mut self.driver).await.is_err() {
            self.token.cancel();
            let _ = (&mut self.driver).await;
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

// ═══════════════════════════════════════════════════════════════
//  MqttPublisher
// ═══════════════════════════════════════════════════════════════

/// Publisher поверх MQTT-клиента.
///
/// `publish` возвращается только после подтверждения, соответствующего QoS.
/// Неудачный publish не переотправляется: при ошибке соединения или брошенном
/// (по таймауту) publish link уничтожается вместе с очередью клиента, а
/// следующий publish открывает новую clean session.
pub struct MqttPublisher {
    config: MqttConfig,
    link: Option<Link>,
}

impl MqttPublisher {
    /// Подключиться к брокеру и дождаться CONNACK.
    pub async fn connect(config: &MqttConfig) -> Result<Self, PublishError> {
        let link = Link::open(config).await?;
        Ok(Self { config: config.clone(), link: Some(link) })
    }

    /// Отправить DISCONNECT и остановить event loop.
    pub async fn shutdown(self) {
        if let Some(link) = self.link {
            link.close().await;
        }
    }

    async fn publish_and_confirm(&mut self, topic: &str, payload: &[u8]) -> Result<Ack, PublishError> {
        let mut link = match self.link.take().and_then(Link::healthy) {
            Some(link) => link,
            None => {
                tracing::info!(broker = %self.config.broker_addr(), "reconnecting");
                Link::open(&self.config).await?
            }
        };

        // Пока ждём подтверждения, link принадлежит этой future: если её
        // бросят, event loop остановится вместе с неподтверждённым пакетом.
        let ack = link.publish(topic, payload, self.config.qos, self.config.retain).await?;
        self.link = Some(link);
        Ok(ack)
    }
}

impl Publisher for MqttPublisher {
    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<Ack, PublishError>> + Send + 'a>> {
        Box::pin(self.publish_and_confirm(topic, payload))
    }
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

// ═══════════════════════════════════════════════════════════════
//  Event loop driver
// ═══════════════════════════════════════════════════════════════

/// Крутит event loop клиента до DISCONNECT, отмены или первой ошибки
/// соединения. Сам не переподключается: иначе клиент дослал бы запросы,
/// о неудаче которых publisher уже сообщил.
async fn drive(
    mut eventloop: EventLoop,
    tx: mpsc::UnboundedSender<Notice>,
    token: CancellationToken,
    broker: String,
) {
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = eventloop.poll() => event,
        };

        let notice = match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::info!(%broker, session_present = ack.session_present, "connected");
                Notice::Connected
            }
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => Notice::Written(pkid),
            Ok(Event::Incoming(Packet::PubAck(ack))) => Notice::Acked(ack.pkid),
            Ok(Event::Incoming(Packet::PubComp(comp))) => Notice::Acked(comp.pkid),
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::info!(%broker, "disconnected");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(%broker, error = %e, "connection error");
                let _ = tx.send(Notice::Failed(format!("{broker}: {e}")));
                break;
            }
        };

        if tx.send(notice).is_err() {
            break;
        }
    }
    tracing::debug!(%broker, "event loop stopped");
}
