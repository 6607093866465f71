// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Console channel adapter: logs every send instead of delivering it.
//!
//! Lets `courier serve` run end-to-end without a real provider. Fabricated
//! message ids are unique per process.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use courier_core::{
    ChannelAdapter, ChannelKind, CourierError, GroupInfo, MediaKind, SendReceipt,
};

pub struct ConsoleAdapter {
    kind: ChannelKind,
    counter: AtomicU64,
}

impl ConsoleAdapter {
    pub fn new(kind: ChannelKind) -> Self {
        Self { kind, counter: AtomicU64::new(0) }
    }

    fn receipt(&self) -> SendReceipt {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        SendReceipt { external_message_id: format!("console-{n}") }
    }
}

#[async_trait]
impl ChannelAdapter for ConsoleAdapter {
    fn channel(&self) -> ChannelKind {
        self.kind
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt, CourierError> {
        tracing::info!(%to, %body, "console send: text");
        Ok(self.receipt())
    }

    async fn send_media(
        &self,
        to: &str,
        kind: MediaKind,
        url: &str,
        caption: Option<&str>,
        _filename: Option<&str>,
    ) -> Result<SendReceipt, CourierError> {
        tracing::info!(%to, %kind, %url, ?caption, "console send: media");
        Ok(self.receipt())
    }

    async fn send_template(
        &self,
        to: &str,
        name: &str,
        language: &str,
        _components: Option<&serde_json::Value>,
    ) -> Result<SendReceipt, CourierError> {
        tracing::info!(%to, %name, %language, "console send: template");
        Ok(self.receipt())
    }

    async fn get_groups(&self) -> Result<Vec<GroupInfo>, CourierError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receipts_are_unique() {
        let adapter = ConsoleAdapter::new(ChannelKind::Bridge);
        let a = adapter.send_text("+1", "x").await.unwrap();
        let b = adapter.send_text("+1", "y").await.unwrap();
        assert_ne!(a.external_message_id, b.external_message_id);
    }
}
