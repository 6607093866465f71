// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait: the uniform send contract per instance.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::{ChannelKind, GroupInfo, MediaKind, OutboundContent, SendReceipt};

/// The send contract one managed instance exposes.
///
/// Adapters wrap either a self-hosted bridge client or the official cloud
/// API; the pipeline never sees past this trait. All send operations may
/// fail with [`CourierError::Channel`], which callers treat as retryable.
#[async_trait]
pub trait ChannelAdapter: Send + Sync + 'static {
    /// The channel kind this adapter speaks.
    fn channel(&self) -> ChannelKind;

    /// Sends a plain text message.
    async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt, CourierError>;

    /// Sends media by URL with an optional caption (and filename for
    /// documents).
    async fn send_media(
        &self,
        to: &str,
        kind: MediaKind,
        url: &str,
        caption: Option<&str>,
        filename: Option<&str>,
    ) -> Result<SendReceipt, CourierError>;

    /// Sends a provider-approved template (cloud channel only).
    async fn send_template(
        &self,
        to: &str,
        name: &str,
        language: &str,
        components: Option<&serde_json::Value>,
    ) -> Result<SendReceipt, CourierError>;

    /// Lists the groups visible to this instance (bridge channel only).
    async fn get_groups(&self) -> Result<Vec<GroupInfo>, CourierError>;

    /// Dispatches an [`OutboundContent`] to the matching send operation.
    async fn send(&self, to: &str, content: &OutboundContent) -> Result<SendReceipt, CourierError> {
        match content {
            OutboundContent::Text { body } => self.send_text(to, body).await,
            OutboundContent::Media {
                kind,
                url,
                caption,
                filename,
            } => {
                self.send_media(to, *kind, url, caption.as_deref(), filename.as_deref())
                    .await
            }
            OutboundContent::Template {
                name,
                language,
                components,
            } => {
                self.send_template(to, name, language, components.as_ref())
                    .await
            }
        }
    }
}

/// Resolves the adapter bound to an instance at send time.
///
/// Consumers (flow engine, dispatchers) hold this instead of a concrete
/// registry so the wiring stays an explicit constructor argument.
pub trait AdapterSource: Send + Sync + 'static {
    fn adapter_for(&self, instance_id: &str) -> Option<Arc<dyn ChannelAdapter>>;
}
