//! Form descriptors: which document slots each registration flow accepts and
//! requires, how its create body is built and how storage keys are folded into
//! its finalize body.

use serde_json::Value;
use validator::{Validate, ValidationErrors};

use seasonpass_core::models::{
    CompanyPlateFiles, CompanySupportingFiles, CreateCompanyRequest, CreateProjectRequest,
    FinalizeCompanyRequest, FinalizeResidentRequest, FormKind, PlateRow, ResidentPlateFiles,
    ResidentSupportingFiles, UploadCategory,
};
use seasonpass_core::{BackendError, RegistrationError};

use crate::draft::{FormFields, RegistrationDraft};

const PLATE_DOCUMENTS: [UploadCategory; 3] = [
    UploadCategory::PlateVehicle,
    UploadCategory::PlateSpa,
    UploadCategory::PlateElectricBill,
];

const COMPANY_DOCUMENTS: [UploadCategory; 3] = [
    UploadCategory::CompanySsm,
    UploadCategory::CompanyElectricity,
    UploadCategory::CompanyVehicle,
];

#[derive(Debug, Clone, Copy)]
pub struct FormDescriptor {
    pub kind: FormKind,
    /// Documents every plate row must carry.
    pub per_plate: &'static [UploadCategory],
    /// Form-level documents that must be present.
    pub form_level: &'static [UploadCategory],
    /// Optional slots accepted on top of the required ones.
    pub optional: &'static [UploadCategory],
    pub requires_plate_rows: bool,
    /// Whether the flow ends with a finalize call.
    pub finalizes: bool,
}

static RESIDENT: FormDescriptor = FormDescriptor {
    kind: FormKind::Resident,
    per_plate: &PLATE_DOCUMENTS,
    form_level: &[],
    optional: &[],
    requires_plate_rows: true,
    finalizes: true,
};

static COMPANY: FormDescriptor = FormDescriptor {
    kind: FormKind::Company,
    per_plate: &PLATE_DOCUMENTS,
    form_level: &COMPANY_DOCUMENTS,
    optional: &[],
    requires_plate_rows: true,
    finalizes: true,
};

static UPLOAD: FormDescriptor = FormDescriptor {
    kind: FormKind::Upload,
    per_plate: &[],
    form_level: &[],
    optional: &[UploadCategory::General, UploadCategory::PlateVehicle],
    requires_plate_rows: false,
    finalizes: false,
};

pub fn descriptor(kind: FormKind) -> &'static FormDescriptor {
    match kind {
        FormKind::Resident => &RESIDENT,
        FormKind::Company => &COMPANY,
        FormKind::Upload => &UPLOAD,
    }
}

impl FormDescriptor {
    pub fn accepts(&self, category: UploadCategory) -> bool {
        self.per_plate.contains(&category)
            || self.form_level.contains(&category)
            || self.optional.contains(&category)
    }

    /// Every missing document, not just the first.
    pub fn missing_requirements(&self, draft: &RegistrationDraft) -> Vec<String> {
        let mut missing = Vec::new();
        let rows = draft.plate_rows();

        if self.requires_plate_rows && rows.is_empty() {
            missing.push("At least one plate number is required".to_string());
        }

        for category in self.form_level {
            if !draft.has_file(*category, None) {
                missing.push(format!("{} is required", category.label()));
            }
        }

        for (index, row) in rows.iter().enumerate() {
            for category in self.per_plate {
                if !draft.has_file(*category, Some(index)) {
                    missing.push(format!(
                        "{} is required for plate {}",
                        category.label(),
                        plate_label(row, index)
                    ));
                }
            }
        }

        if self.per_plate.is_empty() && self.form_level.is_empty() && draft.files().is_empty() {
            missing.push("At least one file is required".to_string());
        }

        missing
    }
}

fn plate_label(row: &PlateRow, index: usize) -> String {
    let plate = row.plate_number.trim();
    if plate.is_empty() {
        format!("#{}", index + 1)
    } else {
        plate.to_string()
    }
}

/// Local field checks matching the backend validator.
pub fn validate_fields(fields: &FormFields) -> Vec<String> {
    let mut messages = match fields {
        FormFields::Resident { details } => collect_messages(details.validate()),
        FormFields::Company { details, .. } => collect_messages(details.validate()),
        FormFields::Upload { details, .. } => collect_messages(details.validate()),
    };

    if let FormFields::Company { plates, .. } | FormFields::Upload { plates, .. } = fields {
        for (index, row) in plates.iter().enumerate() {
            if row.is_blank() {
                messages.push(format!("Plate number is required for row {}", index + 1));
            }
        }
    }

    messages
}

fn collect_messages(result: Result<(), ValidationErrors>) -> Vec<String> {
    let Err(errors) = result else {
        return Vec::new();
    };

    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{} is invalid", field),
            })
        })
        .collect();
    messages.sort();
    messages
}

fn to_body<T: serde::Serialize>(body: &T) -> Result<Value, BackendError> {
    serde_json::to_value(body).map_err(|e| BackendError::Decode(e.to_string()))
}

/// Body of the create call: form values without files.
pub fn create_body(fields: &FormFields) -> Result<Value, BackendError> {
    match fields {
        FormFields::Resident { details } => to_body(details),
        FormFields::Company { details, plates } => to_body(&CreateCompanyRequest {
            details,
            plate_numbers: plates.iter().filter(|p| !p.is_blank()).collect(),
        }),
        FormFields::Upload { details, plates } => to_body(&CreateProjectRequest {
            details,
            plate_numbers: plates
                .iter()
                .filter(|p| !p.is_blank())
                .map(|p| p.plate_number.trim())
                .collect(),
        }),
    }
}

fn required_key(
    draft: &RegistrationDraft,
    category: UploadCategory,
    row: Option<usize>,
) -> Result<String, RegistrationError> {
    draft
        .storage_key(category, row)
        .map(str::to_string)
        .ok_or_else(|| {
            let slot = match row {
                Some(index) => format!("{} (plate row {})", category.label(), index + 1),
                None => category.label().to_string(),
            };
            RegistrationError::MissingStorageKey(slot)
        })
}

/// Body of the finalize call, assembled from the storage keys recorded on the
/// draft. `None` for flows without a finalize step.
pub fn finalize_body(
    draft: &RegistrationDraft,
    registration_id: &str,
) -> Result<Option<Value>, RegistrationError> {
    let to_finalize = |body: Result<Value, BackendError>| {
        body.map(Some).map_err(|source| RegistrationError::Finalize {
            registration_id: registration_id.to_string(),
            source,
        })
    };

    match draft.fields() {
        FormFields::Resident { details } => {
            let body = FinalizeResidentRequest {
                register_id: registration_id,
                details,
                resident_plate: ResidentPlateFiles {
                    plate_number: details.plate_number.trim().to_string(),
                    vehicle_type: details.vehicle_type.clone(),
                    vehicle_path: required_key(draft, UploadCategory::PlateVehicle, Some(0))?,
                },
                resident_supporting_files: ResidentSupportingFiles {
                    spa_path: required_key(draft, UploadCategory::PlateSpa, Some(0))?,
                    electric_bill_path: required_key(
                        draft,
                        UploadCategory::PlateElectricBill,
                        Some(0),
                    )?,
                },
            };
            to_finalize(to_body(&body))
        }
        FormFields::Company { details, plates } => {
            let company_plates = plates
                .iter()
                .enumerate()
                .map(|(index, row)| {
                    Ok(CompanyPlateFiles {
                        nric_number: row.nric_number.clone(),
                        plate_number: row.plate_number.trim().to_string(),
                        vehicle_type: row.vehicle_type.clone(),
                        spa_path: required_key(draft, UploadCategory::PlateSpa, Some(index))?,
                        electric_bill_path: required_key(
                            draft,
                            UploadCategory::PlateElectricBill,
                            Some(index),
                        )?,
                        vehicle_path: required_key(
                            draft,
                            UploadCategory::PlateVehicle,
                            Some(index),
                        )?,
                    })
                })
                .collect::<Result<Vec<_>, RegistrationError>>()?;

            let body = FinalizeCompanyRequest {
                employer_id: registration_id,
                details,
                company_plates,
                company_supporting_files: CompanySupportingFiles {
                    ssm_path: required_key(draft, UploadCategory::CompanySsm, None)?,
                    electric_bill_path: required_key(
                        draft,
                        UploadCategory::CompanyElectricity,
                        None,
                    )?,
                    vehicle_path: required_key(draft, UploadCategory::CompanyVehicle, None)?,
                },
            };
            to_finalize(to_body(&body))
        }
        FormFields::Upload { .. } => Ok(None),
    }
}
