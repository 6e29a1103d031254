//! 라이프사이클 관리.
//!
//! 종료 신호 전파와 시그널 핸들링.

use tokio::sync::watch;
use tracing::info;

/// 라이프사이클 관리자
pub struct LifecycleManager {
    shutdown_tx: watch::Sender<bool>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { shutdown_tx }
    }

    /// 종료 수신기 생성
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// 종료 신호 발송
    pub fn shutdown(&self) {
        info!("종료 신호 발송");
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// OS 시그널 대기 (SIGINT, SIGTERM) 후 종료 신호 발송
    pub async fn wait_for_signal(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = signal(SignalKind::interrupt())?;
            let mut sigterm = signal(SignalKind::terminate())?;

            tokio::select! {
                _ = sigint.recv() => info!("SIGINT 수신"),
                _ = sigterm.recv() => info!("SIGTERM 수신"),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            info!("Ctrl+C 수신");
        }

        self.shutdown();
        Ok(())
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
