#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use image_resize_service::config::ServiceConfig;
use image_resize_service::error::Dependency;
use image_resize_service::models::{Attributes, ReceiptHandle, ReceivedMessage, RecordQuery};
use image_resize_service::services::storage::{ObjectAcl, StoredObject};
use image_resize_service::services::transform::RasterTransformer;
use image_resize_service::services::{
    MetadataStore, MetricsSink, Notifier, ServiceConnector, StorageService, WorkQueue,
};
use image_resize_service::AppState;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// --- Images ---

pub fn encode(width: u32, height: u32, format: ImageOutputFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageOutputFormat::Jpeg(90))
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageOutputFormat::Png)
}

// --- Object store ---

#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub data: Vec<u8>,
    pub content_type: String,
    pub acl: ObjectAcl,
}

#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<String, StoredEntry>>,
    pub fail_get: Mutex<HashSet<String>>,
    pub fail_put: Mutex<HashSet<String>>,
    pub puts: AtomicUsize,
}

impl MemoryStorage {
    pub fn get(&self, key: &str) -> Option<StoredEntry> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn insert(&self, key: &str, data: Vec<u8>, content_type: &str) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredEntry {
                data,
                content_type: content_type.to_string(),
                acl: ObjectAcl::PublicRead,
            },
        );
    }
}

#[async_trait]
impl StorageService for MemoryStorage {
    async fn get_file(&self, key: &str) -> Result<StoredObject> {
        if self.fail_get.lock().unwrap().contains(key) {
            return Err(anyhow!("injected get failure for {}", key));
        }
        self.get(key)
            .map(|entry| StoredObject {
                data: entry.data,
                content_type: Some(entry.content_type),
            })
            .ok_or_else(|| anyhow!("NoSuchKey: {}", key))
    }

    async fn put_file(&self, key: &str, data: Vec<u8>, content_type: &str, acl: ObjectAcl) -> Result<()> {
        if self.fail_put.lock().unwrap().contains(key) {
            return Err(anyhow!("injected put failure for {}", key));
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredEntry {
                data,
                content_type: content_type.to_string(),
                acl,
            },
        );
        Ok(())
    }
}

// --- Work queue ---

#[derive(Default)]
struct QueueState {
    next_receipt: usize,
    visible: VecDeque<String>,
    in_flight: HashMap<String, String>,
}

/// Queue with visibility semantics: received messages are hidden until
/// deleted or until `expire_visibility` makes them deliverable again.
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    pub sent: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub receives: AtomicUsize,
    pub last_wait_seconds: Mutex<Option<u32>>,
    pub fail_receive: AtomicBool,
    pub fail_send: AtomicBool,
    pub fail_delete: Mutex<HashSet<String>>,
}

impl MemoryQueue {
    pub fn push(&self, body: &str) {
        self.state.lock().unwrap().visible.push_back(body.to_string());
    }

    pub fn visible(&self) -> Vec<String> {
        self.state.lock().unwrap().visible.iter().cloned().collect()
    }

    pub fn in_flight(&self) -> Vec<String> {
        let mut bodies: Vec<String> = self.state.lock().unwrap().in_flight.values().cloned().collect();
        bodies.sort();
        bodies
    }

    /// Simulates the visibility timeout lapsing for every unacknowledged message.
    pub fn expire_visibility(&self) {
        let mut state = self.state.lock().unwrap();
        let mut expired: Vec<(String, String)> = state.in_flight.drain().collect();
        expired.sort();
        for (_, body) in expired {
            state.visible.push_back(body);
        }
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn receive(&self, max_items: u32, wait_seconds: u32) -> Result<Vec<ReceivedMessage>> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        *self.last_wait_seconds.lock().unwrap() = Some(wait_seconds);
        if self.fail_receive.load(Ordering::SeqCst) {
            return Err(anyhow!("injected receive failure"));
        }

        let mut state = self.state.lock().unwrap();
        let mut received = Vec::new();
        while received.len() < max_items as usize {
            let Some(body) = state.visible.pop_front() else {
                break;
            };
            state.next_receipt += 1;
            let handle = format!("receipt-{}", state.next_receipt);
            state.in_flight.insert(handle.clone(), body.clone());
            received.push(ReceivedMessage {
                body,
                receipt_handle: ReceiptHandle::new(handle),
            });
        }
        Ok(received)
    }

    async fn delete(&self, receipt_handle: &ReceiptHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let body = state
            .in_flight
            .get(receipt_handle.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("ReceiptHandleIsInvalid: {:?}", receipt_handle))?;
        if self.fail_delete.lock().unwrap().contains(&body) {
            return Err(anyhow!("injected delete failure for {}", body));
        }
        state.in_flight.remove(receipt_handle.as_str());
        self.deleted.lock().unwrap().push(body);
        Ok(())
    }

    async fn send(&self, payload: &str) -> Result<()> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(anyhow!("injected send failure"));
        }
        self.sent.lock().unwrap().push(payload.to_string());
        self.push(payload);
        Ok(())
    }
}

// --- Metadata store ---

#[derive(Default)]
pub struct MemoryMetadata {
    pub records: Mutex<HashMap<String, Attributes>>,
    pub fail_put: Mutex<HashSet<String>>,
    pub fail_query: AtomicBool,
    pub puts: AtomicUsize,
    /// Delay applied before every write, to stretch a batch out in time.
    pub put_delay: Mutex<Option<Duration>>,
}

impl MemoryMetadata {
    pub fn record(&self, key: &str) -> Option<Attributes> {
        self.records.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: &str, attrs: Attributes) {
        self.records.lock().unwrap().insert(key.to_string(), attrs);
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadata {
    async fn get(&self, key: &str) -> Result<Option<Attributes>> {
        Ok(self.record(key))
    }

    async fn put(&self, key: &str, attributes: &Attributes) -> Result<()> {
        let delay = *self.put_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_put.lock().unwrap().contains(key) {
            return Err(anyhow!("injected put failure for {}", key));
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let record = records.entry(key.to_string()).or_default();
        for (name, value) in attributes {
            record.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<(String, Attributes)>> {
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(anyhow!("injected query failure"));
        }
        let matched = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, attrs)| query.matches(attrs))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(query.finish(matched))
    }
}

// --- Metrics and notifications ---

#[derive(Default)]
pub struct RecordingMetrics {
    pub increments: Mutex<Vec<(String, u64)>>,
    pub fail: AtomicBool,
}

impl RecordingMetrics {
    pub fn total(&self, name: &str) -> u64 {
        self.increments
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, amount)| amount)
            .sum()
    }

    pub fn count(&self) -> usize {
        self.increments.lock().unwrap().len()
    }
}

#[async_trait]
impl MetricsSink for RecordingMetrics {
    async fn increment(&self, name: &str, amount: u64) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("injected metrics failure"));
        }
        self.increments.lock().unwrap().push((name.to_string(), amount));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub published: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("injected notification failure"));
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), message.to_string()));
        Ok(())
    }
}

// --- Connector ---

#[derive(Default)]
pub struct FakeConnector {
    pub storage: Arc<MemoryStorage>,
    pub queue: Arc<MemoryQueue>,
    pub metadata: Arc<MemoryMetadata>,
    pub metrics: Arc<RecordingMetrics>,
    pub notifier: Arc<RecordingNotifier>,
    pub unreachable: Mutex<HashSet<Dependency>>,
    pub connections: Mutex<Vec<Dependency>>,
}

impl FakeConnector {
    pub fn fail_connect(&self, dependency: Dependency) {
        self.unreachable.lock().unwrap().insert(dependency);
    }

    pub fn connections_to(&self, dependency: Dependency) -> usize {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .filter(|d| **d == dependency)
            .count()
    }

    fn connect(&self, dependency: Dependency) -> Result<()> {
        if self.unreachable.lock().unwrap().contains(&dependency) {
            return Err(anyhow!("connection refused"));
        }
        self.connections.lock().unwrap().push(dependency);
        Ok(())
    }
}

#[async_trait]
impl ServiceConnector for FakeConnector {
    async fn object_store(&self) -> Result<Arc<dyn StorageService>> {
        self.connect(Dependency::ObjectStore)?;
        Ok(self.storage.clone())
    }

    async fn work_queue(&self) -> Result<Arc<dyn WorkQueue>> {
        self.connect(Dependency::WorkQueue)?;
        Ok(self.queue.clone())
    }

    async fn metadata_store(&self) -> Result<Arc<dyn MetadataStore>> {
        self.connect(Dependency::MetadataStore)?;
        Ok(self.metadata.clone())
    }

    async fn metrics(&self) -> Result<Arc<dyn MetricsSink>> {
        self.connect(Dependency::Metrics)?;
        Ok(self.metrics.clone())
    }

    async fn notifier(&self) -> Result<Arc<dyn Notifier>> {
        self.connect(Dependency::Notifications)?;
        Ok(self.notifier.clone())
    }
}

// --- Wiring ---

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        public_base_url: "https://images.test/".to_string(),
        ..ServiceConfig::development()
    }
}

pub struct TestEnv {
    pub fake: Arc<FakeConnector>,
    pub state: AppState,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let fake = Arc::new(FakeConnector::default());
        let transformer = Arc::new(RasterTransformer::from_config(&config));
        let state = AppState::new(fake.clone(), transformer, Arc::new(config));
        Self { fake, state }
    }

    pub fn storage(&self) -> &MemoryStorage {
        &self.fake.storage
    }

    pub fn queue(&self) -> &MemoryQueue {
        &self.fake.queue
    }

    pub fn metadata(&self) -> &MemoryMetadata {
        &self.fake.metadata
    }

    pub fn metrics(&self) -> &RecordingMetrics {
        &self.fake.metrics
    }

    pub fn notifier(&self) -> &RecordingNotifier {
        &self.fake.notifier
    }
}
