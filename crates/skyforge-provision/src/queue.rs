//! In-process job queue and worker pool

use crate::error::{ProvisionError, Result};
use crate::orchestrator::{Job, JobKind, Orchestrator, failure_output};
use skyforge_core::{ResourceStatus, StateStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tokio::task::JoinHandle;

/// One async mutex per resource id
///
/// Jobs for the same resource run one after another; jobs for different
/// resources never contend.
#[derive(Debug, Clone, Default)]
pub struct ResourceLocks {
    inner: Arc<StdMutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl ResourceLocks {
    pub async fn lock(&self, resource_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = match self.inner.lock() {
                Ok(map) => map,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Entries only the map still references are idle
            map.retain(|_, l| Arc::strong_count(l) > 1);
            map.entry(resource_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of resources with a held or awaited lock
    pub fn active(&self) -> usize {
        match self.inner.lock() {
            Ok(map) => map.values().filter(|l| Arc::strong_count(l) > 1).count(),
            Err(poisoned) => poisoned
                .into_inner()
                .values()
                .filter(|l| Arc::strong_count(l) > 1)
                .count(),
        }
    }
}

/// Receiving half, shared by every worker
pub struct JobReceiver {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
}

/// Submitting half. Never blocks.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
    store: StateStore,
}

impl JobQueue {
    pub fn new(store: StateStore) -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { tx, store },
            JobReceiver {
                rx: Arc::new(Mutex::new(rx)),
            },
        )
    }

    /// Enqueue exactly one job and return immediately
    ///
    /// When the queue is gone a provision job's resource is moved straight
    /// to `failed`, so it never sits in `pending` with nobody to run it.
    pub async fn submit(&self, job: Job) -> Result<()> {
        let resource_id = job.resource_id;
        let kind = job.kind;

        match self.tx.send(job) {
            Ok(()) => {
                tracing::debug!(resource_id, "Queued {} job", kind);
                Ok(())
            }
            Err(e) => {
                let detail = format!("job queue closed ({} job dropped)", e.0.kind);
                let err = ProvisionError::Enqueue(detail.clone());
                tracing::error!(resource_id, "{}", err);

                if kind == JobKind::Provision {
                    let mut output = failure_output(&err, err.to_string());
                    output.insert("detail".to_string(), serde_json::json!(detail));
                    output.insert(
                        "error".to_string(),
                        serde_json::json!("Failed to queue provisioning task"),
                    );
                    self.store
                        .transition(resource_id, ResourceStatus::Failed, Some(output))
                        .await?;
                }
                Err(err)
            }
        }
    }
}

/// Fixed set of workers draining one queue
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `workers` workers; they stop once every `JobQueue` is dropped
    pub fn spawn(orchestrator: Arc<Orchestrator>, receiver: JobReceiver, workers: usize) -> Self {
        let handles = (0..workers.max(1))
            .map(|worker| {
                let orchestrator = orchestrator.clone();
                let rx = receiver.rx.clone();
                tokio::spawn(async move { worker_loop(worker, orchestrator, rx).await })
            })
            .collect();
        tracing::info!("Started {} provisioning workers", workers.max(1));
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to drain the queue and exit
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker exited abnormally: {}", e);
            }
        }
    }

    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

async fn worker_loop(
    worker: usize,
    orchestrator: Arc<Orchestrator>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
) {
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(job) = next else {
            tracing::debug!(worker, "Job queue closed, worker stopping");
            return;
        };

        let resource_id = job.resource_id;
        let kind = job.kind;
        let task = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.execute(job).await })
        };

        match task.await {
            Ok(Ok(status)) => {
                tracing::debug!(worker, resource_id, status = %status, "{} job done", kind);
            }
            Ok(Err(e)) => {
                tracing::error!(
                    worker,
                    resource_id,
                    kind = e.kind(),
                    "{} job aborted: {}",
                    kind,
                    e
                );
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    "provisioning task panicked".to_string()
                } else {
                    format!("provisioning task ended unexpectedly: {}", join_error)
                };
                tracing::error!(worker, resource_id, "{}", message);
                if kind == JobKind::Provision {
                    if let Err(e) = orchestrator.fail_unfinished(resource_id, &message).await {
                        tracing::error!(resource_id, "Could not record failure: {}", e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_resource_serialised() {
        let locks = ResourceLocks::default();
        let guard = locks.lock(1).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        let other = tokio::time::timeout(Duration::from_secs(1), locks.lock(2)).await;
        assert!(other.is_ok());
        drop(other);

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_submit_after_close_fails_resource() {
        let store = StateStore::in_memory();
        let project = store.create_project(1, "p").await.unwrap();
        let resource = store
            .create_resource(skyforge_core::NewResource {
                project_id: project.id,
                name: "r".to_string(),
                provider: skyforge_core::Provider::Aws,
                resource_type: "vm".to_string(),
                configuration: Default::default(),
            })
            .await
            .unwrap();

        let (queue, receiver) = JobQueue::new(store.clone());
        drop(receiver);

        let err = queue
            .submit(Job::provision_resource(&resource))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "enqueue");

        let stored = store.get_resource(resource.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ResourceStatus::Failed);
        let output = stored.terraform_output.unwrap();
        assert_eq!(output["error"], "Failed to queue provisioning task");
        assert_eq!(output["error_kind"], "enqueue");
        assert!(output.contains_key("detail"));
    }
}
