use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::UploadError;

/// Content type sent when a file carries none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Logical document slot a file occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadCategory {
    General,
    PlateVehicle,
    PlateSpa,
    PlateElectricBill,
    CompanySsm,
    CompanyElectricity,
    CompanyVehicle,
}

impl UploadCategory {
    pub const ALL: [UploadCategory; 7] = [
        UploadCategory::General,
        UploadCategory::PlateVehicle,
        UploadCategory::PlateSpa,
        UploadCategory::PlateElectricBill,
        UploadCategory::CompanySsm,
        UploadCategory::CompanyElectricity,
        UploadCategory::CompanyVehicle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadCategory::General => "general",
            UploadCategory::PlateVehicle => "plate-vehicle",
            UploadCategory::PlateSpa => "plate-spa",
            UploadCategory::PlateElectricBill => "plate-electric-bill",
            UploadCategory::CompanySsm => "company-ssm",
            UploadCategory::CompanyElectricity => "company-electricity",
            UploadCategory::CompanyVehicle => "company-vehicle",
        }
    }

    /// Whether files in this category belong to a plate row.
    pub fn is_plate(&self) -> bool {
        matches!(
            self,
            UploadCategory::PlateVehicle
                | UploadCategory::PlateSpa
                | UploadCategory::PlateElectricBill
        )
    }

    /// Storage namespace requested from the presign endpoint (`fileType`).
    pub fn file_type(&self) -> &'static str {
        if self.is_plate() {
            "plate"
        } else {
            "general"
        }
    }

    /// Document subtype sent as `documentType`; `None` for free-form general files.
    pub fn document_type(&self) -> Option<&'static str> {
        match self {
            UploadCategory::General => None,
            UploadCategory::PlateVehicle => Some("vehicle"),
            UploadCategory::PlateSpa => Some("spa"),
            UploadCategory::PlateElectricBill => Some("electricBill"),
            UploadCategory::CompanySsm => Some("ssm"),
            UploadCategory::CompanyElectricity => Some("electricity"),
            UploadCategory::CompanyVehicle => Some("companyVehicle"),
        }
    }

    /// Prefix prepended to the file name when requesting a target, so that
    /// several documents of one plate never collide under the same key.
    pub fn file_name_prefix(&self) -> &'static str {
        match self {
            UploadCategory::PlateSpa => "spa_",
            UploadCategory::PlateElectricBill => "electric_bill_",
            _ => "",
        }
    }

    /// Only the general category accepts more than one file per slot.
    pub fn is_single_slot(&self) -> bool {
        !matches!(self, UploadCategory::General)
    }

    /// Human readable label used in user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            UploadCategory::General => "Supporting Document",
            UploadCategory::PlateVehicle => "Vehicle Document",
            UploadCategory::PlateSpa => "SPA/Tenancy Agreement",
            UploadCategory::PlateElectricBill => "Electricity Bill",
            UploadCategory::CompanySsm => "SSM Document",
            UploadCategory::CompanyElectricity => "Company Electricity Bill",
            UploadCategory::CompanyVehicle => "Company Vehicle Document",
        }
    }
}

impl fmt::Display for UploadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UploadCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown upload category: {}", s))
    }
}

/// Opaque identity of an upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        TaskId(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where the bytes of a local file live.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Bytes),
}

/// A user-selected file: the raw handle plus what the user agent declared about it.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub name: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub source: FileSource,
}

impl LocalFile {
    /// Build a file handle from a path on disk, guessing the content type from
    /// the extension the way a browser would.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let content_type = guess_content_type(&name).map(str::to_string);

        Ok(Self {
            name,
            content_type,
            size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(
        name: impl Into<String>,
        content_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            content_type,
            size: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    /// Lowercased extension including the leading dot, e.g. `.pdf`.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(format!(".{}", ext.to_lowercase()))
    }

    pub fn content_type_or_default(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

fn guess_content_type(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        "doc" => Some("application/msword"),
        "docx" => {
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        }
        "txt" => Some("text/plain"),
        _ => None,
    }
}

/// Plate row metadata carried by plate documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateInfo {
    pub plate_number: String,
    pub vehicle_type: String,
}

/// Lifecycle of a file held in a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    Done { storage_key: String },
    Failed { reason: String },
}

/// One file to push to storage, tagged with everything needed to correlate
/// its result back to the form slot it came from.
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub id: TaskId,
    pub category: UploadCategory,
    pub row: Option<usize>,
    pub plate: Option<PlateInfo>,
    pub file: Option<LocalFile>,
    pub status: FileStatus,
}

impl UploadTask {
    pub fn new(category: UploadCategory, file: LocalFile) -> Self {
        Self {
            id: TaskId::new(),
            category,
            row: None,
            plate: None,
            file: Some(file),
            status: FileStatus::Pending,
        }
    }

    pub fn for_plate(category: UploadCategory, row: usize, plate: PlateInfo, file: LocalFile) -> Self {
        Self {
            id: TaskId::new(),
            category,
            row: Some(row),
            plate: Some(plate),
            file: Some(file),
            status: FileStatus::Pending,
        }
    }

    /// A task is submitted only when it has bytes and has not already succeeded.
    pub fn is_submittable(&self) -> bool {
        self.file.is_some() && !matches!(self.status, FileStatus::Done { .. })
    }

    pub fn file_name(&self) -> &str {
        self.file.as_ref().map(|f| f.name.as_str()).unwrap_or("")
    }

    /// File name sent to the presign endpoint.
    pub fn request_file_name(&self) -> String {
        format!("{}{}", self.category.file_name_prefix(), self.file_name())
    }

    pub fn storage_key(&self) -> Option<&str> {
        match &self.status {
            FileStatus::Done { storage_key } => Some(storage_key),
            _ => None,
        }
    }
}

/// Terminal outcome of one submitted task: the storage key on success, the
/// failure detail otherwise.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub task_id: TaskId,
    pub category: UploadCategory,
    pub row: Option<usize>,
    pub file_name: String,
    pub outcome: Result<String, UploadError>,
}

impl UploadResult {
    pub fn success(task: &UploadTask, storage_key: String) -> Self {
        Self::from_task(task, Ok(storage_key))
    }

    pub fn failure(task: &UploadTask, error: UploadError) -> Self {
        Self::from_task(task, Err(error))
    }

    fn from_task(task: &UploadTask, outcome: Result<String, UploadError>) -> Self {
        Self {
            task_id: task.id,
            category: task.category,
            row: task.row,
            file_name: task.file_name().to_string(),
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn storage_key(&self) -> Option<&str> {
        self.outcome.as_ref().ok().map(String::as_str)
    }

    pub fn error(&self) -> Option<&UploadError> {
        self.outcome.as_ref().err()
    }
}
