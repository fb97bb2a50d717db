//! Recording transports and in-memory repositories shared by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use catsync_common::error::{CatsyncError, CatsyncResult};
use catsync_db::backend::models::{Backend, ProtocolVersion};
use catsync_db::backend::repositories::BackendRepository;
use catsync_db::binding::models::{CategoryBinding, CategoryBindingUpsert};
use catsync_db::binding::repositories::CategoryBindingRepository;
use catsync_db::jobs::models::{
    retry_delay, JobState, NewJob, QueuedJob, STARTED_LEASE_SECS,
};
use catsync_db::jobs::repositories::JobQueue;

use crate::magento::adapter::{RestRequest, RestTransport, RpcTransport};
use crate::magento::error::RemoteError;

pub fn sample_backend(version: ProtocolVersion) -> Backend {
    let now = Utc::now();
    Backend {
        id: Uuid::new_v4(),
        name: "shop".to_string(),
        kind: "magento".to_string(),
        version,
        location: "http://shop.test".to_string(),
        username: None,
        password: None,
        token: None,
        default_storeview: None,
        auto_bind_product: true,
        default_tax_id: None,
        export_products_from_date: None,
        import_categories_from_date: None,
        created_at: now,
        updated_at: now,
    }
}

// ── RPC transport ───────────────────────────────────────────

type RpcResponder = Arc<dyn Fn(&str, &[Value]) -> Result<Value, RemoteError> + Send + Sync>;

#[derive(Clone)]
pub struct RecordingRpc {
    calls: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
    responder: RpcResponder,
}

impl RecordingRpc {
    pub fn with(
        responder: impl Fn(&str, &[Value]) -> Result<Value, RemoteError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(responder),
        }
    }

    pub fn replying(value: Value) -> Self {
        Self::with(move |_, _| Ok(value.clone()))
    }

    pub fn failing(code: i32, message: &str) -> Self {
        let message = message.to_string();
        Self::with(move |_, _| {
            Err(RemoteError::Fault {
                code,
                message: message.clone(),
            })
        })
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcTransport for RecordingRpc {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), args.clone()));
        (self.responder)(method, &args)
    }
}

// ── REST transport ──────────────────────────────────────────

type RestResponder = Arc<dyn Fn(&RestRequest) -> Result<Value, RemoteError> + Send + Sync>;

#[derive(Clone)]
pub struct RecordingRest {
    requests: Arc<Mutex<Vec<RestRequest>>>,
    responder: RestResponder,
}

impl RecordingRest {
    pub fn with(
        responder: impl Fn(&RestRequest) -> Result<Value, RemoteError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(responder),
        }
    }

    pub fn replying(value: Value) -> Self {
        Self::with(move |_| Ok(value.clone()))
    }

    pub fn failing(status: StatusCode, body: &str) -> Self {
        let body = body.to_string();
        Self::with(move |_| {
            Err(RemoteError::HttpError {
                status,
                body: body.clone(),
            })
        })
    }

    pub fn requests(&self) -> Vec<RestRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RestTransport for RecordingRest {
    async fn send(&self, request: RestRequest) -> Result<Value, RemoteError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(&request)
    }
}

// ── CategoryBindingRepository ───────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryBindings {
    rows: Arc<Mutex<Vec<CategoryBinding>>>,
    writes: Arc<Mutex<Vec<String>>>,
}

impl InMemoryBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<CategoryBinding> {
        self.rows.lock().unwrap().clone()
    }

    pub fn find(&self, external_id: &str) -> Option<CategoryBinding> {
        self.all().into_iter().find(|b| b.external_id == external_id)
    }

    /// External ids in the order they were upserted.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl CategoryBindingRepository for InMemoryBindings {
    async fn get_by_id(&self, id: Uuid) -> CatsyncResult<Option<CategoryBinding>> {
        Ok(self.all().into_iter().find(|b| b.id == id))
    }

    async fn get_by_external_id(
        &self,
        backend_id: Uuid,
        external_id: &str,
    ) -> CatsyncResult<Option<CategoryBinding>> {
        Ok(self
            .all()
            .into_iter()
            .find(|b| b.backend_id == backend_id && b.external_id == external_id))
    }

    async fn upsert_by_external_id(
        &self,
        binding: CategoryBindingUpsert,
    ) -> CatsyncResult<CategoryBinding> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(parent_id) = binding.parent_id {
            let parent_ok = rows
                .iter()
                .any(|b| b.id == parent_id && b.backend_id == binding.backend_id);
            if !parent_ok {
                return Err(CatsyncError::Validation(format!(
                    "parent binding {parent_id} not found on backend {}",
                    binding.backend_id
                )));
            }
        }

        // Same rule as the database: the new parent may not descend from this binding.
        let existing_id = rows
            .iter()
            .find(|b| b.backend_id == binding.backend_id && b.external_id == binding.external_id)
            .map(|b| b.id);
        let mut ancestor = binding.parent_id;
        while let (Some(current), Some(own_id)) = (ancestor, existing_id) {
            if current == own_id {
                return Err(CatsyncError::Validation(format!(
                    "binding {} would become its own ancestor",
                    binding.external_id
                )));
            }
            ancestor = rows.iter().find(|b| b.id == current).and_then(|b| b.parent_id);
        }

        let now = Utc::now();
        let stored = match rows
            .iter_mut()
            .find(|b| b.backend_id == binding.backend_id && b.external_id == binding.external_id)
        {
            Some(existing) => {
                existing.parent_id = binding.parent_id;
                existing.name = binding.name.clone();
                existing.description = binding.description.clone();
                existing.protocol_version = binding.protocol_version;
                existing.sync_date = binding.sync_date;
                existing.raw_ref = binding.raw_ref.clone();
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let created = CategoryBinding {
                    id: Uuid::new_v4(),
                    backend_id: binding.backend_id,
                    category_id: Uuid::new_v4(),
                    external_id: binding.external_id.clone(),
                    parent_id: binding.parent_id,
                    name: binding.name.clone(),
                    description: binding.description.clone(),
                    protocol_version: binding.protocol_version,
                    sync_date: binding.sync_date,
                    raw_ref: binding.raw_ref.clone(),
                    created_at: now,
                    updated_at: now,
                };
                rows.push(created.clone());
                created
            }
        };
        self.writes.lock().unwrap().push(binding.external_id);
        Ok(stored)
    }

    async fn list_children(&self, parent_id: Uuid) -> CatsyncResult<Vec<CategoryBinding>> {
        Ok(self
            .all()
            .into_iter()
            .filter(|b| b.parent_id == Some(parent_id))
            .collect())
    }
}

// ── BackendRepository ───────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockBackendRepo {
    backends: Arc<Mutex<Vec<Backend>>>,
    export_marks: Arc<Mutex<Vec<(Uuid, DateTime<Utc>)>>>,
    import_marks: Arc<Mutex<Vec<(Uuid, DateTime<Utc>)>>>,
}

impl MockBackendRepo {
    pub fn with(backends: Vec<Backend>) -> Self {
        Self {
            backends: Arc::new(Mutex::new(backends)),
            ..Self::default()
        }
    }

    pub fn export_marks(&self) -> Vec<(Uuid, DateTime<Utc>)> {
        self.export_marks.lock().unwrap().clone()
    }

    pub fn import_marks(&self) -> Vec<(Uuid, DateTime<Utc>)> {
        self.import_marks.lock().unwrap().clone()
    }

    pub fn backend(&self, id: Uuid) -> Option<Backend> {
        self.backends
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == id)
            .cloned()
    }
}

#[async_trait]
impl BackendRepository for MockBackendRepo {
    async fn get_by_id(&self, id: Uuid) -> CatsyncResult<Option<Backend>> {
        Ok(self.backend(id))
    }

    async fn list_all(&self) -> CatsyncResult<Vec<Backend>> {
        Ok(self.backends.lock().unwrap().clone())
    }

    async fn list_auto_export(&self) -> CatsyncResult<Vec<Backend>> {
        Ok(self
            .backends
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.auto_bind_product)
            .cloned()
            .collect())
    }

    async fn set_export_watermark(&self, id: Uuid, from_date: DateTime<Utc>) -> CatsyncResult<()> {
        let mut backends = self.backends.lock().unwrap();
        let backend = backends
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| CatsyncError::NotFound(format!("backend {id}")))?;
        backend.export_products_from_date = Some(from_date);
        self.export_marks.lock().unwrap().push((id, from_date));
        Ok(())
    }

    async fn set_category_import_watermark(
        &self,
        id: Uuid,
        from_date: DateTime<Utc>,
    ) -> CatsyncResult<()> {
        let mut backends = self.backends.lock().unwrap();
        let backend = backends
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| CatsyncError::NotFound(format!("backend {id}")))?;
        backend.import_categories_from_date = Some(from_date);
        self.import_marks.lock().unwrap().push((id, from_date));
        Ok(())
    }
}

// ── JobQueue ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockJobQueue {
    jobs: Arc<Mutex<Vec<QueuedJob>>>,
    rejected_backend: Option<Uuid>,
}

impl MockJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue whose enqueue fails for jobs targeting `backend_id`.
    pub fn rejecting(backend_id: Uuid) -> Self {
        Self {
            rejected_backend: Some(backend_id),
            ..Self::default()
        }
    }

    pub fn jobs(&self) -> Vec<QueuedJob> {
        self.jobs.lock().unwrap().clone()
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut QueuedJob)) -> CatsyncResult<QueuedJob> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| CatsyncError::NotFound(format!("job {id}")))?;
        f(job);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }
}

#[async_trait]
impl JobQueue for MockJobQueue {
    async fn enqueue(&self, job: NewJob) -> CatsyncResult<QueuedJob> {
        if let Some(rejected) = self.rejected_backend {
            if job.args.get("backend_id") == Some(&Value::String(rejected.to_string())) {
                return Err(CatsyncError::Database("queue unavailable".to_string()));
            }
        }
        let now = Utc::now();
        let queued = QueuedJob {
            id: Uuid::new_v4(),
            channel: job.channel,
            name: job.name,
            args: job.args,
            related_action: job.related_action,
            state: JobState::Pending,
            attempts: 0,
            max_retries: job.max_retries,
            eta: job.eta,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.lock().unwrap().push(queued.clone());
        Ok(queued)
    }

    async fn get_by_id(&self, id: Uuid) -> CatsyncResult<Option<QueuedJob>> {
        Ok(self.jobs().into_iter().find(|j| j.id == id))
    }

    async fn claim_next(&self, channel: &str) -> CatsyncResult<Option<QueuedJob>> {
        let now = Utc::now();
        let lease_cutoff = now - Duration::seconds(STARTED_LEASE_SECS);
        let mut jobs = self.jobs.lock().unwrap();
        let next = jobs.iter_mut().find(|j| {
            j.channel == channel
                && match j.state {
                    JobState::Pending => j.eta.map_or(true, |eta| eta <= now),
                    JobState::Started => j.updated_at < lease_cutoff,
                    _ => false,
                }
        });
        Ok(next.map(|job| {
            job.state = JobState::Started;
            job.attempts += 1;
            job.updated_at = now;
            job.clone()
        }))
    }

    async fn mark_done(&self, id: Uuid, result: Option<&str>) -> CatsyncResult<QueuedJob> {
        self.update(id, |job| {
            job.state = JobState::Done;
            job.result = result.map(str::to_string);
        })
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retryable: bool,
    ) -> CatsyncResult<QueuedJob> {
        self.update(id, |job| {
            if retryable && job.attempts < job.max_retries {
                job.state = JobState::Pending;
                job.eta = Some(Utc::now() + retry_delay(job.attempts));
            } else {
                job.state = JobState::Failed;
            }
            job.error = Some(error.to_string());
        })
    }
}
