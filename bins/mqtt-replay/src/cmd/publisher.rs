use std::future::Future;
use std::pin::Pin;

use replay_api::{Ack, PublishError, Publisher};

// ═══════════════════════════════════════════════════════════════
//  Announce — stdout notice before each publish
// ═══════════════════════════════════════════════════════════════

/// Печатает `Publishing '<payload>' on '<topic>'` перед каждым publish.
pub struct Announce<P> {
    inner: P,
    quiet: bool,
}

impl<P> Announce<P> {
    pub fn new(inner: P, quiet: bool) -> Self {
        Self { inner, quiet }
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: Publisher> Publisher for Announce<P> {
    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<Ack, PublishError>> + Send + 'a>> {
        if !self.quiet {
            println!("Publishing '{}' on '{}'", String::from_utf8_lossy(payload), topic);
        }
        self.inner.publish(topic, payload)
    }
}

// ═══════════════════════════════════════════════════════════════
//  DryRun — no broker
// ═══════════════════════════════════════════════════════════════

/// Publisher для `--dry-run`: ничего не отправляет, сразу подтверждает.
#[derive(Debug, Default)]
pub struct DryRun {
    sent: u64,
}

impl DryRun {
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Publisher for DryRun {
    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<Ack, PublishError>> + Send + 'a>> {
        Box::pin(async move {
            self.sent += 1;
            tracing::debug!(topic, bytes = payload.len(), "dry run");
            Ok(Ack { packet_id: (self.sent % u64::from(u16::MAX)) as u16 })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_acks_every_message() {
        let mut publisher = DryRun::default();
        let first = publisher.publish("a", b"1").await.unwrap();
        let second = publisher.publish("a", b"2").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(publisher.sent(), 2);
    }

    #[tokio::test]
    async fn announce_delegates_to_inner() {
        let mut publisher = Announce::new(DryRun::default(), true);
        publisher.publish("sensors/temp", b"21.5").await.unwrap();
        assert_eq!(publisher.into_inner().sent(), 1);
    }
}
