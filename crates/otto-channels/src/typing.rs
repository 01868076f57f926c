//! Typing indicator — refreshes the bridge's typing status every 4 seconds.
//!
//! Messenger typing states expire after ~5 seconds, so the loop refreshes a
//! second early. `TypingHandle::stop()` aborts the loop immediately.

use std::sync::Arc;
use std::time::Duration;

use crate::bridge::BridgeClient;

/// Handle to a background typing indicator task.
pub struct TypingHandle(tokio::task::JoinHandle<()>);

impl TypingHandle {
    /// Spawn the typing loop for a recipient. Sends immediately, then every 4 s.
    pub fn start(bridge: Arc<BridgeClient>, to: String, platform: String) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                let _ = bridge.typing(&to, &platform).await;
                tokio::time::sleep(Duration::from_secs(4)).await;
            }
        });
        TypingHandle(handle)
    }

    /// Abort the typing indicator loop.
    pub fn stop(self) {
        self.0.abort();
    }
}
