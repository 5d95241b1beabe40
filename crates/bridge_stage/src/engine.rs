//! Bridge ↔ document synchronisation for one component

use crate::error::StageResult;
use crate::feedback::FeedbackListener;
use crate::ops::{compile_key, AttributeOperation, OpKind};
use crate::path::NodePath;
use crate::staging::StagingBuffer;
use crate::store::{batch, ListenerId, SceneGraphStore};
use bridge_core::{flatten_attrs, AttrValue, FlatKey, SyncError, SyncResult};
use bridge_event::{Message, SubscriptionId};
use bridge_runtime::BridgeManager;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Outcome of one [`SyncEngine::tick`]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    /// Existing targets updated in place
    pub updated: usize,
    /// Targets created
    pub created: usize,
    /// Keys that could be neither updated nor created
    pub failures: Vec<(FlatKey, SyncError)>,
}

impl TickReport {
    /// Whether the tick touched nothing
    pub fn is_empty(&self) -> bool {
        self.updated == 0 && self.created == 0 && self.failures.is_empty()
    }
}

/// Mirrors one component's device variables into the document and
/// forwards user edits back.
///
/// Reads arrive on the component's read thread and are only staged;
/// [`tick`](Self::tick) applies them on the main thread.
pub struct SyncEngine {
    name: String,
    root: NodePath,
    store: Arc<dyn SceneGraphStore>,
    bridge: Arc<dyn BridgeManager>,
    staging: Arc<StagingBuffer>,
    feedback: Arc<FeedbackListener>,
    data_subscription: Mutex<Option<SubscriptionId>>,
    opened_listener: Mutex<Option<ListenerId>>,
    cleaned: AtomicBool,
}

impl SyncEngine {
    /// Wire the engine to the bridge and the store
    pub fn new(
        name: impl Into<String>,
        root: NodePath,
        store: Arc<dyn SceneGraphStore>,
        bridge: Arc<dyn BridgeManager>,
    ) -> Self {
        let name = name.into();
        let staging = Arc::new(StagingBuffer::new());

        let data_subscription = {
            let staging = Arc::clone(&staging);
            bridge.register_data_callback(Arc::new(move |message: &Message| {
                ingest_into(&staging, message).map(|_| ())
            }))
        };

        let feedback = Arc::new(FeedbackListener::new(name.clone(), root.clone(), Arc::clone(&bridge)));
        feedback.attach(store.as_ref());

        let opened_listener = {
            let feedback = Arc::clone(&feedback);
            store.subscribe_to_document_opened(Arc::new(move |store: &dyn SceneGraphStore| {
                feedback.attach(store);
            }))
        };

        log::info!("Sync engine '{}' mirroring into {}", name, root);

        Self {
            name,
            root,
            store,
            bridge,
            staging,
            feedback,
            data_subscription: Mutex::new(Some(data_subscription)),
            opened_listener: Mutex::new(Some(opened_listener)),
            cleaned: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Document path the component is mirrored under
    pub fn root(&self) -> &NodePath {
        &self.root
    }

    pub fn staging(&self) -> &StagingBuffer {
        &self.staging
    }

    pub fn feedback(&self) -> &FeedbackListener {
        &self.feedback
    }

    /// Flatten a data-read message into the staging buffer.
    ///
    /// Returns the number of values staged. Safe to call from any thread.
    pub fn ingest(&self, message: &Message) -> SyncResult<usize> {
        ingest_into(&self.staging, message)
    }

    /// The component root node, defined when missing
    pub fn root_node(&self) -> StageResult<NodePath> {
        if !self.store.has_node(&self.root) {
            self.store.define_node(&self.root, None)?;
        }
        Ok(self.root.clone())
    }

    /// Apply everything staged since the last tick. Main thread only.
    ///
    /// Updates of existing targets run inside one batch so listeners see a
    /// single delivery. Missing targets are created afterwards, typed nodes
    /// first.
    pub fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        if !self.store.is_open() || self.staging.is_empty() {
            return report;
        }

        let root = match self.root_node() {
            Ok(root) => root,
            Err(e) => {
                log::warn!("'{}' cannot define {}: {}", self.name, self.root, e);
                return report;
            }
        };

        let mut ops: Vec<(AttributeOperation, AttrValue)> = self
            .staging
            .drain()
            .into_iter()
            .map(|(key, value)| (compile_key(&root, &key), value))
            .collect();
        ops.sort_by(|a, b| a.0.symbol.cmp(&b.0.symbol));

        let mut missing = Vec::new();
        {
            let _batch = batch(self.store.as_ref());
            for (op, value) in ops {
                match op.execute(self.store.as_ref(), &value) {
                    Ok(()) => report.updated += 1,
                    Err(e) if e.is_not_found() => missing.push((op, value)),
                    Err(e) => {
                        log::warn!("'{}' failed to apply {}: {}", self.name, op.symbol, e);
                        report.failures.push((op.symbol, e));
                    }
                }
            }
        }

        missing.sort_by(|a, b| {
            (a.0.kind != OpKind::CreateTyped, &a.0.path).cmp(&(b.0.kind != OpKind::CreateTyped, &b.0.path))
        });
        for (op, value) in missing {
            match op.create(self.store.as_ref(), &value) {
                Ok(()) => report.created += 1,
                Err(e) => {
                    log::warn!("'{}' failed to create {}: {}", self.name, op.symbol, e);
                    report.failures.push((op.symbol, e));
                }
            }
        }

        log::trace!(
            "'{}' tick: {} updated, {} created, {} failed",
            self.name,
            report.updated,
            report.created,
            report.failures.len()
        );
        report
    }

    /// Detach from the bridge and the store. Idempotent.
    pub fn cleanup(&self) {
        if self.cleaned.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(id) = self.data_subscription.lock().take() {
            self.bridge.unregister_data_callback(id);
        }
        if let Some(id) = self.opened_listener.lock().take() {
            self.store.unsubscribe(id);
        }
        self.feedback.detach(self.store.as_ref());
        log::debug!("Sync engine '{}' cleaned up", self.name);
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn ingest_into(staging: &StagingBuffer, message: &Message) -> SyncResult<usize> {
    let data = match &message.data {
        Some(data) => data,
        None => return Ok(0),
    };
    let flat = flatten_attrs(data)?;
    Ok(staging.deposit_all(flat))
}
