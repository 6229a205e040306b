//! Upload queue: a fixed worker pool over a shared claim cursor.
//!
//! Every submitted task yields exactly one [`UploadResult`]. A failing task
//! never cancels its siblings: `run` returns only once every worker has
//! drained the list. Results are in completion order; callers correlate by
//! [`TaskId`], never by position.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use seasonpass_core::models::{TaskId, UploadResult, UploadTask};
use seasonpass_core::{
    AuthorizationError, PresignError, PresignRequest, ProgressFn, UploadError,
};

use crate::context::UploadContext;

/// Progress notifications for a display. Sending never blocks a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Started { task_id: TaskId, file_name: String },
    Progress { task_id: TaskId, percent: u8 },
    Finished { task_id: TaskId, success: bool },
}

pub type UploadEventSender = mpsc::UnboundedSender<UploadEvent>;

pub struct ConcurrentUploadQueue {
    context: Arc<UploadContext>,
    workers: usize,
}

impl ConcurrentUploadQueue {
    /// A worker count of zero is treated as one.
    pub fn new(context: UploadContext, workers: usize) -> Self {
        Self {
            context: Arc::new(context),
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn context(&self) -> &UploadContext {
        &self.context
    }

    /// Upload every submittable task for `registration_id`.
    ///
    /// Tasks without a file or already marked done are skipped and produce no
    /// result.
    #[tracing::instrument(skip(self, tasks, events), fields(workers = self.workers))]
    pub async fn run(
        &self,
        registration_id: &str,
        tasks: Vec<UploadTask>,
        events: Option<UploadEventSender>,
    ) -> Vec<UploadResult> {
        let submitted = tasks.len();
        let pending: Arc<[UploadTask]> = tasks
            .into_iter()
            .filter(UploadTask::is_submittable)
            .collect::<Vec<_>>()
            .into();

        let total = pending.len();
        if total < submitted {
            tracing::debug!(skipped = submitted - total, "Skipping tasks without a pending file");
        }
        if total == 0 {
            return Vec::new();
        }

        let worker_count = self.workers.min(total);
        tracing::info!(
            registration_id = %registration_id,
            tasks = total,
            workers = worker_count,
            "Upload queue started"
        );

        let cursor = Arc::new(AtomicUsize::new(0));
        let results = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let registration_id: Arc<str> = Arc::from(registration_id);

        let mut pool = JoinSet::new();
        for worker_id in 0..worker_count {
            pool.spawn(Self::worker_loop(
                worker_id,
                self.context.clone(),
                registration_id.clone(),
                pending.clone(),
                cursor.clone(),
                results.clone(),
                events.clone(),
            ));
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Upload worker exited abnormally");
            }
        }

        let mut results = std::mem::take(&mut *results.lock().await);

        // A worker that died mid-task never reported; settle what it held.
        if results.len() < total {
            let reported: HashSet<TaskId> = results.iter().map(|r| r.task_id).collect();
            for task in pending.iter().filter(|t| !reported.contains(&t.id)) {
                results.push(UploadResult::failure(
                    task,
                    UploadError::Aborted("upload worker stopped before finishing".to_string()),
                ));
            }
        }

        let failed = results.iter().filter(|r| !r.is_success()).count();
        tracing::info!(
            registration_id = %registration_id,
            succeeded = results.len() - failed,
            failed = failed,
            "Upload queue drained"
        );

        results
    }

    async fn worker_loop(
        worker_id: usize,
        context: Arc<UploadContext>,
        registration_id: Arc<str>,
        tasks: Arc<[UploadTask]>,
        cursor: Arc<AtomicUsize>,
        results: Arc<Mutex<Vec<UploadResult>>>,
        events: Option<UploadEventSender>,
    ) {
        loop {
            let index = cursor.fetch_add(1, Ordering::SeqCst);
            let Some(task) = tasks.get(index) else {
                break;
            };

            let result = Self::process_task(&context, &registration_id, task, events.as_ref()).await;
            results.lock().await.push(result);
        }
        tracing::trace!(worker_id, "Upload worker finished");
    }

    #[tracing::instrument(skip_all, fields(task.id = %task.id, category = %task.category, file_name = %task.file_name()))]
    async fn process_task(
        context: &UploadContext,
        registration_id: &str,
        task: &UploadTask,
        events: Option<&UploadEventSender>,
    ) -> UploadResult {
        emit(
            events,
            UploadEvent::Started {
                task_id: task.id,
                file_name: task.file_name().to_string(),
            },
        );

        let outcome = Self::execute(context, registration_id, task, events).await;

        emit(
            events,
            UploadEvent::Finished {
                task_id: task.id,
                success: outcome.is_ok(),
            },
        );

        match outcome {
            Ok(storage_key) => {
                tracing::info!(storage_key = %storage_key, "File uploaded");
                UploadResult::success(task, storage_key)
            }
            Err(e) => {
                tracing::warn!(error = %e, "File upload failed");
                UploadResult::failure(task, e)
            }
        }
    }

    /// validate -> authorize -> presign -> transfer.
    async fn execute(
        context: &UploadContext,
        registration_id: &str,
        task: &UploadTask,
        events: Option<&UploadEventSender>,
    ) -> Result<String, UploadError> {
        let file = task
            .file
            .as_ref()
            .ok_or_else(|| UploadError::Aborted("task has no file".to_string()))?;

        context.validator.validate(file)?;

        let bearer = if context.presign_requires_auth {
            Some(context.sessions.bearer().await?)
        } else {
            context.sessions.bearer().await.ok()
        };

        let file_name = task.request_file_name();
        let request = PresignRequest {
            registration_id,
            category: task.category,
            file_name: &file_name,
            content_type: file.content_type_or_default(),
            plate_number: task.plate.as_ref().map(|p| p.plate_number.as_str()),
            document_type: task.category.document_type(),
        };

        let target = match context
            .presigner
            .get_upload_target(&request, bearer.as_deref())
            .await
        {
            Ok(target) => target,
            Err(PresignError::Backend(e)) if e.is_unauthorized() => {
                context.sessions.invalidate().await;
                return Err(AuthorizationError::Rejected(e.to_string()).into());
            }
            Err(e) => return Err(e.into()),
        };

        let on_progress = progress_reporter(task.id, events.cloned());
        context
            .uploader
            .upload(&target.url, file, on_progress)
            .await?;

        Ok(target.key)
    }
}

fn emit(events: Option<&UploadEventSender>, event: UploadEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

/// Turns byte counts into whole-percent events, sending only on change.
fn progress_reporter(task_id: TaskId, events: Option<UploadEventSender>) -> ProgressFn {
    let last = AtomicU8::new(u8::MAX);
    Arc::new(move |sent, total| {
        let Some(tx) = events.as_ref() else {
            return;
        };
        let percent = if total == 0 {
            100
        } else {
            (sent.min(total) * 100 / total) as u8
        };
        if last.swap(percent, Ordering::Relaxed) != percent {
            let _ = tx.send(UploadEvent::Progress { task_id, percent });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use seasonpass_core::models::{
        FileStatus, LocalFile, PlateInfo, UploadAuthorization, UploadCategory, UploadTarget,
    };
    use seasonpass_core::{
        BackendError, CredentialProvider, FileValidator, ObjectUploader, PresignedUrlClient,
        TransferError, ValidationError,
    };

    use crate::session::SessionManager;

    struct StubCredentials {
        lifetime: Duration,
    }

    #[async_trait]
    impl CredentialProvider for StubCredentials {
        async fn authorize(&self, token: &str) -> Result<UploadAuthorization, AuthorizationError> {
            Ok(UploadAuthorization {
                token: format!("jwt-{}", token),
                expires_in: self.lifetime,
            })
        }
    }

    #[derive(Default)]
    struct StubPresigner {
        calls: StdMutex<Vec<(String, Option<String>, Option<String>)>>,
        reject_with: Option<u16>,
    }

    #[async_trait]
    impl PresignedUrlClient for StubPresigner {
        async fn get_upload_target(
            &self,
            request: &PresignRequest<'_>,
            bearer: Option<&str>,
        ) -> Result<UploadTarget, PresignError> {
            self.calls.lock().unwrap().push((
                request.file_name.to_string(),
                request.plate_number.map(str::to_string),
                bearer.map(str::to_string),
            ));
            if let Some(status) = self.reject_with {
                return Err(PresignError::Backend(BackendError::Status {
                    status,
                    message: "rejected".into(),
                }));
            }
            Ok(UploadTarget {
                url: format!("https://store.test/{}", request.file_name),
                key: format!(
                    "uploads/{}/{}/{}",
                    request.registration_id,
                    request.category.file_type(),
                    request.file_name
                ),
            })
        }
    }

    /// Counts concurrent transfers and records completion order.
    #[derive(Default)]
    struct StubUploader {
        delay: Duration,
        fail: Vec<&'static str>,
        panic_on: Option<&'static str>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        completed: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectUploader for StubUploader {
        async fn upload(
            &self,
            _write_url: &str,
            file: &LocalFile,
            on_progress: ProgressFn,
        ) -> Result<(), TransferError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            on_progress(0, file.size);
            tokio::time::sleep(self.delay).await;
            on_progress(file.size, file.size);

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.panic_on.is_some_and(|name| name == file.name) {
                panic!("uploader crashed");
            }
            self.completed.lock().unwrap().push(file.name.clone());
            if self.fail.iter().any(|name| *name == file.name) {
                return Err(TransferError::Backend(BackendError::Status {
                    status: 500,
                    message: "InternalError".into(),
                }));
            }
            Ok(())
        }
    }

    struct Harness {
        presigner: Arc<StubPresigner>,
        uploader: Arc<StubUploader>,
        sessions: Arc<SessionManager>,
    }

    impl Harness {
        fn new(presigner: StubPresigner, uploader: StubUploader, lifetime: Duration) -> Self {
            Self {
                presigner: Arc::new(presigner),
                uploader: Arc::new(uploader),
                sessions: Arc::new(SessionManager::new(Arc::new(StubCredentials { lifetime }))),
            }
        }

        fn queue(&self, workers: usize) -> ConcurrentUploadQueue {
            let context = UploadContext {
                presigner: self.presigner.clone(),
                uploader: self.uploader.clone(),
                validator: FileValidator::new(
                    1,
                    vec!["image/".into(), "application/pdf".into()],
                    vec![".pdf".into()],
                ),
                sessions: self.sessions.clone(),
                presign_requires_auth: true,
            };
            ConcurrentUploadQueue::new(context, workers)
        }
    }

    fn pdf(name: &str) -> LocalFile {
        LocalFile::from_bytes(name, Some("application/pdf".into()), vec![0u8; 128])
    }

    fn general_tasks(names: &[&str]) -> Vec<UploadTask> {
        names
            .iter()
            .map(|n| UploadTask::new(UploadCategory::General, pdf(n)))
            .collect()
    }

    fn assert_one_result_per_task(tasks: &[UploadTask], results: &[UploadResult]) {
        assert_eq!(results.len(), tasks.len());
        let ids: HashSet<TaskId> = results.iter().map(|r| r.task_id).collect();
        assert_eq!(ids.len(), tasks.len());
        assert!(tasks.iter().all(|t| ids.contains(&t.id)));
    }

    #[tokio::test(start_paused = true)]
    async fn five_files_two_workers_bounded_in_flight() {
        let harness = Harness::new(
            StubPresigner::default(),
            StubUploader {
                delay: Duration::from_millis(50),
                ..Default::default()
            },
            Duration::from_secs(900),
        );
        harness.sessions.verify("cf").await.unwrap();

        let tasks = general_tasks(&["a.pdf", "b.pdf", "c.pdf", "d.pdf", "e.pdf"]);
        let results = harness.queue(2).run("reg-1", tasks.clone(), None).await;

        assert_one_result_per_task(&tasks, &results);
        assert!(results.iter().all(UploadResult::is_success));
        assert_eq!(harness.uploader.max_in_flight.load(Ordering::SeqCst), 2);
        assert_eq!(harness.presigner.calls.lock().unwrap().len(), 5);
        assert!(results
            .iter()
            .any(|r| r.storage_key() == Some("uploads/reg-1/general/c.pdf")));
    }

    #[tokio::test]
    async fn empty_list_resolves_immediately() {
        let harness = Harness::new(
            StubPresigner::default(),
            StubUploader::default(),
            Duration::from_secs(900),
        );
        let results = harness.queue(2).run("reg-1", Vec::new(), None).await;
        assert!(results.is_empty());
        assert!(harness.presigner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn single_worker_completes_in_submission_order() {
        let harness = Harness::new(
            StubPresigner::default(),
            StubUploader {
                delay: Duration::from_millis(10),
                ..Default::default()
            },
            Duration::from_secs(900),
        );
        harness.sessions.verify("cf").await.unwrap();

        let tasks = general_tasks(&["1.pdf", "2.pdf", "3.pdf", "4.pdf"]);
        let results = harness.queue(1).run("reg-1", tasks.clone(), None).await;

        let order: Vec<TaskId> = results.iter().map(|r| r.task_id).collect();
        let expected: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(order, expected);
        assert_eq!(harness.uploader.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_workers_still_drains() {
        let harness = Harness::new(
            StubPresigner::default(),
            StubUploader::default(),
            Duration::from_secs(900),
        );
        harness.sessions.verify("cf").await.unwrap();

        let queue = harness.queue(0);
        assert_eq!(queue.workers(), 1);
        let tasks = general_tasks(&["a.pdf", "b.pdf"]);
        let results = queue.run("reg-1", tasks.clone(), None).await;
        assert_one_result_per_task(&tasks, &results);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_does_not_cancel_siblings() {
        let harness = Harness::new(
            StubPresigner::default(),
            StubUploader {
                delay: Duration::from_millis(20),
                fail: vec!["spa.pdf"],
                ..Default::default()
            },
            Duration::from_secs(900),
        );
        harness.sessions.verify("cf").await.unwrap();

        let plate = PlateInfo {
            plate_number: "WXY 1234".into(),
            vehicle_type: "1".into(),
        };
        let tasks = vec![
            UploadTask::for_plate(UploadCategory::PlateVehicle, 0, plate.clone(), pdf("grant.pdf")),
            UploadTask::for_plate(UploadCategory::PlateSpa, 0, plate.clone(), pdf("spa.pdf")),
            UploadTask::for_plate(UploadCategory::PlateElectricBill, 0, plate, pdf("bill.pdf")),
        ];
        let results = harness.queue(3).run("reg-1", tasks.clone(), None).await;

        assert_one_result_per_task(&tasks, &results);
        let failed: Vec<&UploadResult> = results.iter().filter(|r| !r.is_success()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].file_name, "spa.pdf");
        assert_eq!(failed[0].row, Some(0));
        assert_eq!(harness.uploader.completed.lock().unwrap().len(), 3);

        let calls = harness.presigner.calls.lock().unwrap();
        assert!(calls
            .iter()
            .any(|(name, plate, _)| name == "spa_spa.pdf" && plate.as_deref() == Some("WXY 1234")));
        assert!(calls.iter().all(|(_, _, bearer)| bearer.as_deref() == Some("jwt-cf")));
    }

    #[tokio::test(start_paused = true)]
    async fn done_and_empty_tasks_are_skipped() {
        let harness = Harness::new(
            StubPresigner::default(),
            StubUploader::default(),
            Duration::from_secs(900),
        );
        harness.sessions.verify("cf").await.unwrap();

        let mut done = UploadTask::new(UploadCategory::General, pdf("old.pdf"));
        done.status = FileStatus::Done {
            storage_key: "uploads/reg-1/general/old.pdf".into(),
        };
        let mut empty = UploadTask::new(UploadCategory::CompanySsm, pdf("ssm.pdf"));
        empty.file = None;
        let fresh = UploadTask::new(UploadCategory::General, pdf("new.pdf"));

        let results = harness
            .queue(2)
            .run("reg-1", vec![done, empty, fresh.clone()], None)
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].task_id, fresh.id);
        let calls = harness.presigner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "new.pdf");
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_fails_later_presign() {
        let harness = Harness::new(
            StubPresigner::default(),
            StubUploader {
                delay: Duration::from_secs(20),
                ..Default::default()
            },
            Duration::from_secs(30),
        );
        harness.sessions.verify("cf").await.unwrap();

        let tasks = general_tasks(&["a.pdf", "b.pdf", "c.pdf"]);
        let results = harness.queue(1).run("reg-1", tasks.clone(), None).await;

        assert_one_result_per_task(&tasks, &results);
        assert!(results[0].is_success());
        assert!(results[1].is_success());
        assert_eq!(
            results[2].error(),
            Some(&UploadError::Authorization(AuthorizationError::Expired))
        );
        assert_eq!(harness.presigner.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_session_blocks_presign() {
        let harness = Harness::new(
            StubPresigner::default(),
            StubUploader::default(),
            Duration::from_secs(900),
        );
        let tasks = general_tasks(&["a.pdf"]);
        let results = harness.queue(2).run("reg-1", tasks, None).await;
        assert_eq!(
            results[0].error(),
            Some(&UploadError::Authorization(AuthorizationError::Missing))
        );
        assert!(harness.presigner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_presign_invalidates_session() {
        let harness = Harness::new(
            StubPresigner {
                reject_with: Some(401),
                ..Default::default()
            },
            StubUploader::default(),
            Duration::from_secs(900),
        );
        harness.sessions.verify("cf").await.unwrap();

        let results = harness
            .queue(1)
            .run("reg-1", general_tasks(&["a.pdf"]), None)
            .await;
        assert!(matches!(
            results[0].error(),
            Some(UploadError::Authorization(AuthorizationError::Rejected(_)))
        ));
        assert!(!harness.sessions.is_live().await);
        assert!(harness.uploader.completed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_file_never_reaches_network() {
        let harness = Harness::new(
            StubPresigner::default(),
            StubUploader::default(),
            Duration::from_secs(900),
        );
        harness.sessions.verify("cf").await.unwrap();

        let big = LocalFile::from_bytes(
            "huge.pdf",
            Some("application/pdf".into()),
            vec![0u8; 2 * 1024 * 1024],
        );
        let results = harness
            .queue(1)
            .run("reg-1", vec![UploadTask::new(UploadCategory::General, big)], None)
            .await;

        assert!(matches!(
            results[0].error(),
            Some(UploadError::Validation(ValidationError::FileTooLarge { .. }))
        ));
        assert!(harness.presigner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_worker_still_settles_its_task() {
        let harness = Harness::new(
            StubPresigner::default(),
            StubUploader {
                delay: Duration::from_millis(5),
                panic_on: Some("b.pdf"),
                ..Default::default()
            },
            Duration::from_secs(900),
        );
        harness.sessions.verify("cf").await.unwrap();

        let tasks = general_tasks(&["a.pdf", "b.pdf", "c.pdf", "d.pdf"]);
        let results = harness.queue(2).run("reg-1", tasks.clone(), None).await;

        assert_one_result_per_task(&tasks, &results);
        let aborted: Vec<&UploadResult> = results
            .iter()
            .filter(|r| matches!(r.error(), Some(UploadError::Aborted(_))))
            .collect();
        assert_eq!(aborted.len(), 1);
        assert_eq!(aborted[0].file_name, "b.pdf");
    }

    #[tokio::test(start_paused = true)]
    async fn events_report_start_progress_and_finish() {
        let harness = Harness::new(
            StubPresigner::default(),
            StubUploader::default(),
            Duration::from_secs(900),
        );
        harness.sessions.verify("cf").await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let tasks = general_tasks(&["a.pdf"]);
        let id = tasks[0].id;
        harness.queue(1).run("reg-1", tasks, Some(tx)).await;

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                UploadEvent::Started {
                    task_id: id,
                    file_name: "a.pdf".into()
                },
                UploadEvent::Progress {
                    task_id: id,
                    percent: 0
                },
                UploadEvent::Progress {
                    task_id: id,
                    percent: 100
                },
                UploadEvent::Finished {
                    task_id: id,
                    success: true
                },
            ]
        );
    }
}
