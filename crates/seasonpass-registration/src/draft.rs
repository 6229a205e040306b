//! In-memory registration draft: form values plus the files attached to each
//! document slot.

use serde::{Deserialize, Serialize};

use seasonpass_core::models::{
    CompanyDetails, FileStatus, FormKind, LocalFile, PlateInfo, PlateRow, ProjectDetails,
    ResidentDetails, TaskId, UploadCategory, UploadResult, UploadTask,
};
use seasonpass_core::{UploadConfig, ValidationError};

use crate::forms;

/// Form values of one registration flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FormFields {
    Resident {
        details: ResidentDetails,
    },
    Company {
        details: CompanyDetails,
        #[serde(default)]
        plates: Vec<PlateRow>,
    },
    Upload {
        details: ProjectDetails,
        #[serde(default)]
        plates: Vec<PlateRow>,
    },
}

impl FormFields {
    pub fn kind(&self) -> FormKind {
        match self {
            FormFields::Resident { .. } => FormKind::Resident,
            FormFields::Company { .. } => FormKind::Company,
            FormFields::Upload { .. } => FormKind::Upload,
        }
    }

    fn empty(kind: FormKind) -> Self {
        match kind {
            FormKind::Resident => FormFields::Resident {
                details: ResidentDetails::default(),
            },
            FormKind::Company => FormFields::Company {
                details: CompanyDetails::default(),
                plates: Vec::new(),
            },
            FormKind::Upload => FormFields::Upload {
                details: ProjectDetails::default(),
                plates: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationDraft {
    fields: FormFields,
    files: Vec<UploadTask>,
    max_general_files: usize,
    max_plate_rows: usize,
}

impl RegistrationDraft {
    pub fn new(fields: FormFields, config: &UploadConfig) -> Self {
        Self {
            fields,
            files: Vec::new(),
            max_general_files: config.max_general_files,
            max_plate_rows: config.max_plate_rows,
        }
    }

    pub fn kind(&self) -> FormKind {
        self.fields.kind()
    }

    pub fn fields(&self) -> &FormFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FormFields {
        &mut self.fields
    }

    pub fn files(&self) -> &[UploadTask] {
        &self.files
    }

    /// Declared vehicles. The resident form always has exactly one, taken from
    /// its details.
    pub fn plate_rows(&self) -> Vec<PlateRow> {
        match &self.fields {
            FormFields::Resident { details } => vec![PlateRow {
                plate_number: details.plate_number.clone(),
                vehicle_type: details.vehicle_type.clone(),
                nric_number: details.nric_number.clone().unwrap_or_default(),
            }],
            FormFields::Company { plates, .. } | FormFields::Upload { plates, .. } => {
                plates.clone()
            }
        }
    }

    pub fn add_plate_row(&mut self, row: PlateRow) -> Result<usize, ValidationError> {
        let max = self.max_plate_rows;
        match &mut self.fields {
            FormFields::Resident { .. } => Err(ValidationError::TooManyPlateRows { max: 1 }),
            FormFields::Company { plates, .. } | FormFields::Upload { plates, .. } => {
                if plates.len() >= max {
                    return Err(ValidationError::TooManyPlateRows { max });
                }
                plates.push(row);
                Ok(plates.len() - 1)
            }
        }
    }

    /// Remove a plate row together with its files; later rows shift down.
    pub fn remove_plate_row(&mut self, index: usize) -> Result<PlateRow, ValidationError> {
        let removed = match &mut self.fields {
            FormFields::Company { plates, .. } | FormFields::Upload { plates, .. }
                if index < plates.len() =>
            {
                plates.remove(index)
            }
            _ => return Err(ValidationError::UnknownPlateRow { row: index }),
        };

        self.files.retain(|f| f.row != Some(index));
        for file in &mut self.files {
            if let Some(row) = file.row.as_mut().filter(|r| **r > index) {
                *row -= 1;
            }
        }
        Ok(removed)
    }

    /// Attach a file to a document slot.
    ///
    /// Plate categories need the row they belong to. Single-document slots
    /// replace whatever was attached before; the general slot is capped.
    pub fn add_file(
        &mut self,
        category: UploadCategory,
        row: Option<usize>,
        file: LocalFile,
    ) -> Result<TaskId, ValidationError> {
        let descriptor = forms::descriptor(self.kind());
        if !descriptor.accepts(category) {
            return Err(ValidationError::CategoryNotAccepted { category });
        }

        let task = if category.is_plate() {
            let rows = self.plate_rows();
            let index = match (self.kind(), row) {
                (FormKind::Resident, _) => 0,
                (_, Some(index)) => index,
                (_, None) => return Err(ValidationError::UnknownPlateRow { row: 0 }),
            };
            let plate = rows
                .get(index)
                .ok_or(ValidationError::UnknownPlateRow { row: index })?;
            UploadTask::for_plate(category, index, plate_info(plate), file)
        } else {
            UploadTask::new(category, file)
        };

        if category.is_single_slot() {
            self.files
                .retain(|f| !(f.category == task.category && f.row == task.row));
        } else {
            let attached = self.files.iter().filter(|f| f.category == category).count();
            if attached >= self.max_general_files {
                return Err(ValidationError::TooManyFiles {
                    category,
                    max: self.max_general_files,
                });
            }
        }

        let id = task.id;
        self.files.push(task);
        Ok(id)
    }

    pub fn remove_file(&mut self, id: TaskId) -> Option<UploadTask> {
        let position = self.files.iter().position(|f| f.id == id)?;
        Some(self.files.remove(position))
    }

    /// Human-readable list of what still blocks submission.
    pub fn missing_requirements(&self) -> Vec<String> {
        forms::descriptor(self.kind()).missing_requirements(self)
    }

    /// Snapshot of every attached file in upload order: form-level documents
    /// first, then plate documents by row. Plate metadata is refreshed from
    /// the current rows.
    pub fn upload_tasks(&self) -> Vec<UploadTask> {
        let rows = self.plate_rows();
        let mut tasks: Vec<UploadTask> = self
            .files
            .iter()
            .filter(|f| f.row.is_none())
            .cloned()
            .collect();

        let mut plate_tasks: Vec<UploadTask> = self
            .files
            .iter()
            .filter(|f| f.row.is_some())
            .cloned()
            .map(|mut task| {
                if let Some(row) = task.row.and_then(|r| rows.get(r)) {
                    task.plate = Some(plate_info(row));
                }
                task
            })
            .collect();
        plate_tasks.sort_by_key(|t| t.row);
        tasks.extend(plate_tasks);
        tasks
    }

    /// Record queue results against the attached files. Returns how many
    /// results matched a file.
    pub fn apply_results(&mut self, results: &[UploadResult]) -> usize {
        let mut matched = 0;
        for result in results {
            if let Some(file) = self.files.iter_mut().find(|f| f.id == result.task_id) {
                file.status = match &result.outcome {
                    Ok(key) => FileStatus::Done {
                        storage_key: key.clone(),
                    },
                    Err(e) => FileStatus::Failed {
                        reason: e.to_string(),
                    },
                };
                matched += 1;
            }
        }
        matched
    }

    /// Storage key of the uploaded file in a slot, if it is done.
    pub fn storage_key(&self, category: UploadCategory, row: Option<usize>) -> Option<&str> {
        self.files
            .iter()
            .filter(|f| f.category == category && f.row == row)
            .find_map(UploadTask::storage_key)
    }

    pub fn has_file(&self, category: UploadCategory, row: Option<usize>) -> bool {
        self.files
            .iter()
            .any(|f| f.category == category && f.row == row && f.file.is_some())
    }

    /// Drop all files and reset the form values.
    pub fn clear(&mut self) {
        self.files.clear();
        self.fields = FormFields::empty(self.kind());
    }
}

fn plate_info(row: &PlateRow) -> PlateInfo {
    PlateInfo {
        plate_number: row.plate_number.trim().to_string(),
        vehicle_type: row.vehicle_type.clone(),
    }
}
