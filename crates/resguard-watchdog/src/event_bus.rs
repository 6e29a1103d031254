//! 워치독 이벤트 버스.
//!
//! `tokio::broadcast` 기반. 구독자가 없거나 느려도 발행자는 막히지 않는다.

use resguard_core::models::event::WatchdogEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// 워치독 이벤트 버스
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WatchdogEvent>,
}

impl EventBus {
    /// 새 이벤트 버스 생성
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// 이벤트 발행
    pub fn publish(&self, event: WatchdogEvent) {
        debug!("이벤트 발행: {}", event.name());
        let _ = self.tx.send(event);
    }

    /// 구독자 생성
    pub fn subscribe(&self) -> broadcast::Receiver<WatchdogEvent> {
        self.tx.subscribe()
    }

    /// 현재 구독자 수
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(WatchdogEvent::MonitoringStarted);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, WatchdogEvent::MonitoringStarted));
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.clone().subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(WatchdogEvent::CleanupStarted { count: 6 });

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert!(matches!(e1, WatchdogEvent::CleanupStarted { count: 6 }));
        assert!(matches!(e2, WatchdogEvent::CleanupStarted { count: 6 }));
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::default();
        bus.publish(WatchdogEvent::MonitoringStopped);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
