//! 컴포넌트 건강 상태 추적기.

use chrono::Utc;
use parking_lot::Mutex;
use resguard_core::models::health::{Component, ComponentHealth, HealthMap};
use tracing::debug;

/// 수집기별 건강 상태 추적기
///
/// 컨트롤러 수명 동안 유지되며 `reset`이나 재시작 때만 초기화된다.
pub struct ComponentHealthTracker {
    map: Mutex<HealthMap>,
}

impl ComponentHealthTracker {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(initial_map()),
        }
    }

    pub fn record_success(&self, component: Component) {
        let mut map = self.map.lock();
        map.entry(component).or_default().record_success(Utc::now());
    }

    pub fn record_failure(&self, component: Component, message: &str) {
        let mut map = self.map.lock();
        let health = map.entry(component).or_default();
        health.record_failure(message);
        debug!(
            "{component} 상태 {:?} (연속 실패 {})",
            health.state, health.consecutive_failures
        );
    }

    /// 시험 호출 직전, 비정상 컴포넌트를 Recovering으로 표시
    pub fn begin_recovery(&self) {
        let mut map = self.map.lock();
        for health in map.values_mut() {
            health.begin_recovery();
        }
    }

    pub fn get(&self, component: Component) -> ComponentHealth {
        self.map.lock().get(&component).cloned().unwrap_or_default()
    }

    pub fn snapshot(&self) -> HealthMap {
        self.map.lock().clone()
    }

    pub fn all_healthy(&self) -> bool {
        self.map.lock().values().all(ComponentHealth::is_healthy)
    }

    pub fn reset(&self) {
        *self.map.lock() = initial_map();
    }
}

impl Default for ComponentHealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn initial_map() -> HealthMap {
    Component::ALL
        .into_iter()
        .map(|c| (c, ComponentHealth::default()))
        .collect()
}
