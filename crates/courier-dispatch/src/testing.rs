// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test doubles for the dispatch crate.

use std::sync::Mutex;

use async_trait::async_trait;

use courier_core::{
    ChannelAdapter, ChannelKind, CourierError, GroupInfo, MediaKind, SendReceipt,
};

/// Accepts every send and reports a fixed receipt.
pub(crate) struct NullAdapter {
    kind: ChannelKind,
}

impl NullAdapter {
    pub(crate) fn bridge() -> Self {
        Self { kind: ChannelKind::Bridge }
    }
}

#[async_trait]
impl ChannelAdapter for NullAdapter {
    fn channel(&self) -> ChannelKind {
        self.kind
    }

    async fn send_text(&self, _to: &str, _body: &str) -> Result<SendReceipt, CourierError> {
        Ok(SendReceipt { external_message_id: "null".to_string() })
    }

    async fn send_media(
        &self,
        _to: &str,
        _kind: MediaKind,
        _url: &str,
        _caption: Option<&str>,
        _filename: Option<&str>,
    ) -> Result<SendReceipt, CourierError> {
        Ok(SendReceipt { external_message_id: "null".to_string() })
    }

    async fn send_template(
        &self,
        _to: &str,
        _name: &str,
        _language: &str,
        _components: Option<&serde_json::Value>,
    ) -> Result<SendReceipt, CourierError> {
        Ok(SendReceipt { external_message_id: "null".to_string() })
    }

    async fn get_groups(&self) -> Result<Vec<GroupInfo>, CourierError> {
        Ok(Vec::new())
    }
}

/// Records every send as `"{to}:{summary}"` and succeeds.
pub(crate) struct RecordingAdapter {
    kind: ChannelKind,
    pub(crate) sent: Mutex<Vec<String>>,
}

impl RecordingAdapter {
    pub(crate) fn new(kind: ChannelKind) -> Self {
        Self { kind, sent: Mutex::new(Vec::new()) }
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, entry: String) -> SendReceipt {
        let mut sent = self.sent.lock().unwrap();
        sent.push(entry);
        SendReceipt { external_message_id: format!("ext-{}", sent.len()) }
    }
}

#[async_trait]
impl ChannelAdapter for RecordingAdapter {
    fn channel(&self) -> ChannelKind {
        self.kind
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt, CourierError> {
        Ok(self.record(format!("{to}:{body}")))
    }

    async fn send_media(
        &self,
        to: &str,
        kind: MediaKind,
        url: &str,
        _caption: Option<&str>,
        _filename: Option<&str>,
    ) -> Result<SendReceipt, CourierError> {
        Ok(self.record(format!("{to}:{kind}:{url}")))
    }

    async fn send_template(
        &self,
        to: &str,
        name: &str,
        _language: &str,
        _components: Option<&serde_json::Value>,
    ) -> Result<SendReceipt, CourierError> {
        Ok(self.record(format!("{to}:template:{name}")))
    }

    async fn get_groups(&self) -> Result<Vec<GroupInfo>, CourierError> {
        Ok(Vec::new())
    }
}

/// Fails every send with a retryable channel error.
pub(crate) struct FailingAdapter {
    kind: ChannelKind,
}

impl FailingAdapter {
    pub(crate) fn bridge() -> Self {
        Self { kind: ChannelKind::Bridge }
    }
}

#[async_trait]
impl ChannelAdapter for FailingAdapter {
    fn channel(&self) -> ChannelKind {
        self.kind
    }

    async fn send_text(&self, _to: &str, _body: &str) -> Result<SendReceipt, CourierError> {
        Err(CourierError::channel("simulated transport failure"))
    }

    async fn send_media(
        &self,
        _to: &str,
        _kind: MediaKind,
        _url: &str,
        _caption: Option<&str>,
        _filename: Option<&str>,
    ) -> Result<SendReceipt, CourierError> {
        Err(CourierError::channel("simulated transport failure"))
    }

    async fn send_template(
        &self,
        _to: &str,
        _name: &str,
        _language: &str,
        _components: Option<&serde_json::Value>,
    ) -> Result<SendReceipt, CourierError> {
        Err(CourierError::channel("simulated transport failure"))
    }

    async fn get_groups(&self) -> Result<Vec<GroupInfo>, CourierError> {
        Ok(Vec::new())
    }
}
