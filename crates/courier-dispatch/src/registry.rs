// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter registry: instance id -> channel adapter.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use courier_core::{AdapterSource, ChannelAdapter};

/// Thread-safe map of the adapters currently bound to instances.
/// Adapters register on connect and drop out on disconnect.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn ChannelAdapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, instance_id: &str, adapter: Arc<dyn ChannelAdapter>) {
        self.adapters
            .write()
            .expect("adapter registry lock poisoned")
            .insert(instance_id.to_string(), adapter);
    }

    pub fn unregister(&self, instance_id: &str) {
        self.adapters
            .write()
            .expect("adapter registry lock poisoned")
            .remove(instance_id);
    }
}

impl AdapterSource for AdapterRegistry {
    fn adapter_for(&self, instance_id: &str) -> Option<Arc<dyn ChannelAdapter>> {
        self.adapters
            .read()
            .expect("adapter registry lock poisoned")
            .get(instance_id)
            .cloned()
    }
}
