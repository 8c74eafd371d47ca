use std::sync::Arc;

use dog_blob::progress::ProgressGuard;
use dog_blob::{MediaItem, ProgressFn, StorageGateway, UploadFile};
use tokio::sync::{watch, Mutex};
use tracing::{info, instrument, warn};

use crate::events::{EventBus, MediaEvent};
use crate::{MediaConfig, MediaError, MediaResult, NoticeBoard};

/// Outcome of one file in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Pending,
    Succeeded(MediaItem),
    Failed(String),
}

/// One file of a batch. Lives only as long as the batch report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub progress: u8,
    pub outcome: UploadOutcome,
}

impl UploadJob {
    fn pending(file: &UploadFile) -> Self {
        Self {
            file_name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size_bytes: file.size_bytes(),
            progress: 0,
            outcome: UploadOutcome::Pending,
        }
    }

    pub fn succeeded(&self) -> Option<&MediaItem> {
        match &self.outcome {
            UploadOutcome::Succeeded(item) => Some(item),
            _ => None,
        }
    }
}

/// Per-file results of a finished batch, in submission order
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub jobs: Vec<UploadJob>,
}

impl BatchReport {
    pub fn uploaded(&self) -> impl Iterator<Item = &MediaItem> {
        self.jobs.iter().filter_map(UploadJob::succeeded)
    }

    pub fn errors(&self) -> Vec<MediaError> {
        self.jobs
            .iter()
            .filter_map(|job| match &job.outcome {
                UploadOutcome::Failed(reason) => Some(MediaError::upload_failure(&job.file_name, reason)),
                _ => None,
            })
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.jobs.iter().all(|job| job.succeeded().is_some())
    }
}

/// What the upload widget should display
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploaderStatus {
    #[default]
    Idle,
    Uploading {
        index: usize,
        total: usize,
        file_name: String,
        progress: u8,
    },
}

impl UploaderStatus {
    /// Pick/upload controls are only usable between batches
    pub fn controls_enabled(&self) -> bool {
        matches!(self, UploaderStatus::Idle)
    }

    pub fn progress(&self) -> Option<u8> {
        match self {
            UploaderStatus::Idle => None,
            UploaderStatus::Uploading { progress, .. } => Some(*progress),
        }
    }
}

/// Puts the uploader back to `Idle` however the batch ends, including when
/// the batch future is dropped midway
struct IdleOnDrop(Arc<watch::Sender<UploaderStatus>>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.send_replace(UploaderStatus::Idle);
    }
}

/// Uploads batches of files one at a time, in submission order.
///
/// A failing file is reported and skipped; the rest of the batch carries on.
/// Each success is announced as `mediaUploaded`, each failure as
/// `mediaUploadFailed`.
pub struct UploadCoordinator {
    gateway: Arc<dyn StorageGateway>,
    bus: EventBus,
    status: Arc<watch::Sender<UploaderStatus>>,
    batch_gate: Mutex<()>,
    notices: NoticeBoard,
}

impl UploadCoordinator {
    pub fn new(gateway: Arc<dyn StorageGateway>, bus: EventBus, config: &MediaConfig) -> Self {
        let (status, _) = watch::channel(UploaderStatus::Idle);
        Self {
            gateway,
            bus,
            status: Arc::new(status),
            batch_gate: Mutex::new(()),
            notices: NoticeBoard::new(config.notice_ttl),
        }
    }

    pub fn status(&self) -> UploaderStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<UploaderStatus> {
        self.status.subscribe()
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// Upload `files` sequentially. Rejects an empty selection before touching
    /// storage. Batches started while another is running wait their turn.
    #[instrument(skip(self, files), fields(files = files.len()))]
    pub async fn upload_batch(&self, files: Vec<UploadFile>) -> MediaResult<BatchReport> {
        if files.is_empty() {
            return Err(MediaError::EmptyInput);
        }

        let _batch = self.batch_gate.lock().await;
        let _idle = IdleOnDrop(Arc::clone(&self.status));
        let total = files.len();
        let mut jobs: Vec<UploadJob> = files.iter().map(UploadJob::pending).collect();

        for (index, file) in files.into_iter().enumerate() {
            self.status.send_replace(UploaderStatus::Uploading {
                index,
                total,
                file_name: file.name.clone(),
                progress: 0,
            });

            let guard = ProgressGuard::new(self.progress_sink());
            let file_name = file.name.clone();
            let job = &mut jobs[index];

            match self.gateway.upload(file, guard.as_sink()).await {
                Ok(item) => {
                    guard.complete();
                    job.progress = 100;
                    job.outcome = UploadOutcome::Succeeded(item.clone());
                    self.bus.publish(MediaEvent::Uploaded(item));
                }
                Err(failure) => {
                    guard.fail();
                    let reason = failure.reason.to_string();
                    warn!("Error uploading file {}: {}", file_name, reason);
                    self.notices.post(format!("Error uploading file: {}", file_name));

                    job.progress = guard.last().unwrap_or(0);
                    job.outcome = UploadOutcome::Failed(reason.clone());
                    self.bus.publish(MediaEvent::UploadFailed { file_name, reason });
                }
            }
        }

        let report = BatchReport { jobs };
        info!(
            "Batch finished: {} uploaded, {} failed",
            report.uploaded().count(),
            report.errors().len()
        );
        Ok(report)
    }

    fn progress_sink(&self) -> ProgressFn {
        let status = Arc::clone(&self.status);
        Arc::new(move |percent| {
            status.send_modify(|current| {
                if let UploaderStatus::Uploading { progress, .. } = current {
                    *progress = percent;
                }
            });
        })
    }
}
