// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign lifecycle and the batch fan-out runner.
//!
//! A campaign's status column is its sole control signal: the runner
//! re-reads it before every contact, so an operator pause or cancel lands
//! within one contact's latency, not just between batches.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use courier_config::model::CampaignConfig;
use courier_core::{
    AdapterSource, CampaignStatus, ChannelKind, CourierError, OutboundContent,
};
use courier_storage::queries::{campaigns, instances};
use courier_storage::{Campaign, Database};

use crate::rate::RateLimiter;

/// Inputs for creating a campaign.
#[derive(Debug, Clone)]
pub struct CampaignRequest {
    pub tenant_id: String,
    pub name: String,
    pub content: OutboundContent,
    /// Pause between two contacts, in seconds.
    pub delay_secs: i64,
    /// Instances the fan-out round-robins across.
    pub instance_ids: Vec<String>,
    pub recipients: Vec<String>,
}

/// Campaign operations exposed to the surrounding HTTP layer.
pub struct CampaignService {
    db: Database,
}

impl CampaignService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a campaign in DRAFT. A campaign with no recipients or no
    /// instances is rejected before any job could ever run.
    pub async fn create(&self, request: CampaignRequest) -> Result<String, CourierError> {
        if request.recipients.is_empty() {
            return Err(CourierError::Config("campaign has no contacts".to_string()));
        }
        if request.instance_ids.is_empty() {
            return Err(CourierError::Config("campaign has no instances".to_string()));
        }

        let campaign = Campaign {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: request.tenant_id,
            name: request.name,
            content: serde_json::to_string(&request.content)
                .map_err(|e| CourierError::Internal(format!("unserializable content: {e}")))?,
            delay_secs: request.delay_secs.max(0),
            status: CampaignStatus::Draft.to_string(),
            sent_count: 0,
            failed_count: 0,
            created_at: String::new(),
            updated_at: String::new(),
        };
        campaigns::create(&self.db, &campaign, &request.instance_ids, &request.recipients).await?;
        tracing::info!(campaign_id = %campaign.id, contacts = request.recipients.len(), "campaign created");
        Ok(campaign.id)
    }

    /// DRAFT/SCHEDULED/PAUSED -> RUNNING. The caller then hands the id to a
    /// [`CampaignRunner`].
    pub async fn start(&self, id: &str) -> Result<bool, CourierError> {
        campaigns::set_status_if(
            &self.db,
            id,
            &["DRAFT", "SCHEDULED", "PAUSED"],
            &CampaignStatus::Running.to_string(),
        )
        .await
    }

    pub async fn pause(&self, id: &str) -> Result<bool, CourierError> {
        campaigns::set_status_if(
            &self.db,
            id,
            &["RUNNING", "SCHEDULED"],
            &CampaignStatus::Paused.to_string(),
        )
        .await
    }

    pub async fn cancel(&self, id: &str) -> Result<bool, CourierError> {
        campaigns::set_status_if(
            &self.db,
            id,
            &["DRAFT", "SCHEDULED", "RUNNING", "PAUSED"],
            &CampaignStatus::Cancelled.to_string(),
        )
        .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Campaign>, CourierError> {
        campaigns::get(&self.db, id).await
    }
}

/// Drains one RUNNING campaign batch by batch until exhausted, paused,
/// cancelled, or shut down.
pub struct CampaignRunner {
    db: Database,
    adapters: Arc<dyn AdapterSource>,
    limiter: Arc<RateLimiter>,
    config: CampaignConfig,
}

impl CampaignRunner {
    pub fn new(
        db: Database,
        adapters: Arc<dyn AdapterSource>,
        limiter: Arc<RateLimiter>,
        config: CampaignConfig,
    ) -> Self {
        Self { db, adapters, limiter, config }
    }

    /// Loop-with-yield batch processor. Keeps processing until no pending
    /// contacts remain (-> COMPLETED), no instance is connected
    /// (-> PAUSED), or the status stops being RUNNING.
    pub async fn run(&self, campaign_id: &str, cancel: CancellationToken) -> Result<(), CourierError> {
        // Round-robin position survives across batches within one run.
        let mut rr_index: usize = 0;

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            if !self.is_running(campaign_id).await? {
                return Ok(());
            }

            let batch =
                campaigns::pending_contacts(&self.db, campaign_id, self.config.batch_size).await?;
            if batch.is_empty() {
                campaigns::set_status_if(
                    &self.db,
                    campaign_id,
                    &["RUNNING"],
                    &CampaignStatus::Completed.to_string(),
                )
                .await?;
                tracing::info!(%campaign_id, "campaign completed");
                return Ok(());
            }

            let connected = self.connected_instances(campaign_id).await?;
            if connected.is_empty() {
                // No delivery path: park the whole campaign instead of
                // burning every contact as failed.
                campaigns::set_status_if(
                    &self.db,
                    campaign_id,
                    &["RUNNING"],
                    &CampaignStatus::Paused.to_string(),
                )
                .await?;
                tracing::warn!(%campaign_id, "no connected instance, campaign paused");
                return Ok(());
            }

            let Some(campaign) = campaigns::get(&self.db, campaign_id).await? else {
                return Ok(());
            };
            let content: OutboundContent = match serde_json::from_str(&campaign.content) {
                Ok(content) => content,
                Err(error) => {
                    tracing::error!(%campaign_id, %error, "undecodable campaign content, pausing");
                    campaigns::set_status_if(
                        &self.db,
                        campaign_id,
                        &["RUNNING"],
                        &CampaignStatus::Paused.to_string(),
                    )
                    .await?;
                    return Ok(());
                }
            };
            let delay = Duration::from_secs(campaign.delay_secs.max(0) as u64);

            for contact in &batch {
                // Operator pause/cancel takes effect mid-batch.
                if cancel.is_cancelled() || !self.is_running(campaign_id).await? {
                    return Ok(());
                }

                let instance_id = &connected[rr_index % connected.len()];
                rr_index += 1;

                self.send_to_contact(instance_id, &contact.id, &contact.recipient, &content)
                    .await?;

                // Per-send anti-throttling pause, independent of the rate
                // limiter that governs the instance globally.
                if !delay.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }

            if campaigns::pending_count(&self.db, campaign_id).await? > 0 {
                // Yield between batches so a long campaign cannot
                // monopolize the worker.
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(Duration::from_secs(self.config.requeue_delay_secs)) => {}
                }
            }
        }
    }

    async fn is_running(&self, campaign_id: &str) -> Result<bool, CourierError> {
        Ok(campaigns::status(&self.db, campaign_id)
            .await?
            .as_deref()
            == Some("RUNNING"))
    }

    /// The campaign's instances filtered to CONNECTED, in stable order.
    async fn connected_instances(&self, campaign_id: &str) -> Result<Vec<String>, CourierError> {
        let mut connected = Vec::new();
        for id in campaigns::instance_ids(&self.db, campaign_id).await? {
            if let Some(instance) = instances::get(&self.db, &id).await? {
                if instance.connectivity == "CONNECTED" {
                    connected.push(instance.id);
                }
            }
        }
        Ok(connected)
    }

    async fn send_to_contact(
        &self,
        instance_id: &str,
        contact_id: &str,
        recipient: &str,
        content: &OutboundContent,
    ) -> Result<(), CourierError> {
        let result = match self.adapters.adapter_for(instance_id) {
            Some(adapter) => adapter.send(recipient, content).await,
            None => Err(CourierError::AdapterNotFound { instance: instance_id.to_string() }),
        };

        match result {
            Ok(_) => {
                campaigns::mark_contact_sent(&self.db, contact_id).await?;
                // Campaign traffic counts against the instance's global
                // rate accounting even though the runner itself is paced
                // by the per-contact delay.
                if let Some(instance) = instances::get(&self.db, instance_id).await? {
                    if let Ok(channel) = ChannelKind::from_str(&instance.channel) {
                        self.limiter.record_send(instance_id, channel).await?;
                    }
                }
            }
            Err(error) => {
                let message = error.to_string();
                campaigns::mark_contact_failed(&self.db, contact_id, &message).await?;
                tracing::warn!(%instance_id, %recipient, %message, "campaign send failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCounterStore;
    use crate::registry::AdapterRegistry;
    use crate::testing::{FailingAdapter, RecordingAdapter};
    use courier_config::model::RatesConfig;
    use courier_storage::Instance;
    use tempfile::tempdir;

    struct Harness {
        db: Database,
        registry: Arc<AdapterRegistry>,
        service: CampaignService,
        runner: CampaignRunner,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let registry = Arc::new(AdapterRegistry::new());
        let limiter = Arc::new(RateLimiter::new(
            Arc::new(MemoryCounterStore::new()),
            RatesConfig::default(),
        ));
        let runner = CampaignRunner::new(
            db.clone(),
            registry.clone(),
            limiter,
            CampaignConfig { batch_size: 10, requeue_delay_secs: 0 },
        );
        Harness {
            service: CampaignService::new(db.clone()),
            db,
            registry,
            runner,
            _dir: dir,
        }
    }

    async fn add_instance(db: &Database, id: &str, connectivity: &str) {
        instances::create(
            db,
            &Instance {
                id: id.to_string(),
                tenant_id: "tenant-1".to_string(),
                name: id.to_string(),
                channel: "BRIDGE".to_string(),
                connectivity: "DISCONNECTED".to_string(),
                created_at: String::new(),
                updated_at: String::new(),
                deleted_at: None,
            },
        )
        .await
        .unwrap();
        instances::set_connectivity(db, id, connectivity).await.unwrap();
    }

    fn request(instance_ids: &[&str], recipients: &[&str]) -> CampaignRequest {
        CampaignRequest {
            tenant_id: "tenant-1".to_string(),
            name: "promo".to_string(),
            content: OutboundContent::Text { body: "big sale".to_string() },
            delay_secs: 0,
            instance_ids: instance_ids.iter().map(|s| s.to_string()).collect(),
            recipients: recipients.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn empty_contact_list_is_rejected_at_creation() {
        let h = harness().await;
        let err = h.service.create(request(&["i1"], &[])).await.unwrap_err();
        assert!(matches!(err, CourierError::Config(_)));
        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn round_robin_spreads_contacts_across_instances() {
        let h = harness().await;
        add_instance(&h.db, "i1", "CONNECTED").await;
        add_instance(&h.db, "i2", "CONNECTED").await;
        let a1 = Arc::new(RecordingAdapter::new(ChannelKind::Bridge));
        let a2 = Arc::new(RecordingAdapter::new(ChannelKind::Bridge));
        h.registry.register("i1", a1.clone());
        h.registry.register("i2", a2.clone());

        let id = h
            .service
            .create(request(&["i1", "i2"], &["+1", "+2", "+3", "+4"]))
            .await
            .unwrap();
        assert!(h.service.start(&id).await.unwrap());
        h.runner.run(&id, CancellationToken::new()).await.unwrap();

        let campaign = h.service.get(&id).await.unwrap().unwrap();
        assert_eq!(campaign.status, "COMPLETED");
        assert_eq!(campaign.sent_count, 4);
        assert_eq!(campaign.failed_count, 0);

        // Alternating fan-out: two contacts per instance.
        assert_eq!(a1.sent().len(), 2);
        assert_eq!(a2.sent().len(), 2);

        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn no_connected_instance_pauses_the_campaign() {
        let h = harness().await;
        add_instance(&h.db, "i1", "DISCONNECTED").await;

        let id = h.service.create(request(&["i1"], &["+1", "+2"])).await.unwrap();
        h.service.start(&id).await.unwrap();
        h.runner.run(&id, CancellationToken::new()).await.unwrap();

        let campaign = h.service.get(&id).await.unwrap().unwrap();
        assert_eq!(campaign.status, "PAUSED", "parked, not failed");
        assert_eq!(campaigns::pending_count(&h.db, &id).await.unwrap(), 2);

        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_sends_mark_contacts_and_counters() {
        let h = harness().await;
        add_instance(&h.db, "i1", "CONNECTED").await;
        h.registry.register("i1", Arc::new(FailingAdapter::bridge()));

        let id = h.service.create(request(&["i1"], &["+1", "+2"])).await.unwrap();
        h.service.start(&id).await.unwrap();
        h.runner.run(&id, CancellationToken::new()).await.unwrap();

        let campaign = h.service.get(&id).await.unwrap().unwrap();
        assert_eq!(campaign.status, "COMPLETED");
        assert_eq!(campaign.sent_count, 0);
        assert_eq!(campaign.failed_count, 2);

        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn pause_mid_batch_halts_within_one_contact() {
        let h = harness().await;
        add_instance(&h.db, "i1", "CONNECTED").await;

        // An adapter that pauses the campaign as a side effect of the first
        // send, as an operator would from another task.
        struct PausingAdapter {
            db: Database,
            campaign_id: std::sync::Mutex<String>,
            sent: std::sync::atomic::AtomicUsize,
        }

        #[async_trait::async_trait]
        impl courier_core::ChannelAdapter for PausingAdapter {
            fn channel(&self) -> ChannelKind {
                ChannelKind::Bridge
            }

            async fn send_text(
                &self,
                _to: &str,
                _body: &str,
            ) -> Result<courier_core::SendReceipt, CourierError> {
                self.sent.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let id = self.campaign_id.lock().unwrap().clone();
                campaigns::set_status_if(&self.db, &id, &["RUNNING"], "PAUSED").await?;
                Ok(courier_core::SendReceipt { external_message_id: "ext".to_string() })
            }

            async fn send_media(
                &self,
                _to: &str,
                _kind: courier_core::MediaKind,
                _url: &str,
                _caption: Option<&str>,
                _filename: Option<&str>,
            ) -> Result<courier_core::SendReceipt, CourierError> {
                unreachable!("campaign content is text")
            }

            async fn send_template(
                &self,
                _to: &str,
                _name: &str,
                _language: &str,
                _components: Option<&serde_json::Value>,
            ) -> Result<courier_core::SendReceipt, CourierError> {
                unreachable!("campaign content is text")
            }

            async fn get_groups(&self) -> Result<Vec<courier_core::GroupInfo>, CourierError> {
                Ok(Vec::new())
            }
        }

        let adapter = Arc::new(PausingAdapter {
            db: h.db.clone(),
            campaign_id: std::sync::Mutex::new(String::new()),
            sent: std::sync::atomic::AtomicUsize::new(0),
        });
        h.registry.register("i1", adapter.clone());

        let id = h.service.create(request(&["i1"], &["+1", "+2", "+3"])).await.unwrap();
        *adapter.campaign_id.lock().unwrap() = id.clone();

        h.service.start(&id).await.unwrap();
        h.runner.run(&id, CancellationToken::new()).await.unwrap();

        assert_eq!(adapter.sent.load(std::sync::atomic::Ordering::SeqCst), 1);
        let campaign = h.service.get(&id).await.unwrap().unwrap();
        assert_eq!(campaign.status, "PAUSED");
        assert_eq!(campaigns::pending_count(&h.db, &id).await.unwrap(), 2);

        // Resuming drains the rest (swap in a plain adapter first).
        h.registry.register("i1", Arc::new(RecordingAdapter::new(ChannelKind::Bridge)));
        h.service.start(&id).await.unwrap();
        h.runner.run(&id, CancellationToken::new()).await.unwrap();
        assert_eq!(h.service.get(&id).await.unwrap().unwrap().status, "COMPLETED");

        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_is_terminal() {
        let h = harness().await;
        add_instance(&h.db, "i1", "CONNECTED").await;

        let id = h.service.create(request(&["i1"], &["+1"])).await.unwrap();
        assert!(h.service.cancel(&id).await.unwrap());
        // A cancelled campaign cannot be started again.
        assert!(!h.service.start(&id).await.unwrap());

        h.runner.run(&id, CancellationToken::new()).await.unwrap();
        assert_eq!(h.service.get(&id).await.unwrap().unwrap().status, "CANCELLED");

        h.db.close().await.unwrap();
    }
}
