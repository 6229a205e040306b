//! Registration form values and the create/finalize request bodies.
//!
//! Field rules mirror the backend validator so obviously bad input is caught
//! before a registration record is created.

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// The registration flows sharing the upload engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormKind {
    Resident,
    Company,
    Upload,
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FormKind::Resident => "resident",
            FormKind::Company => "company",
            FormKind::Upload => "upload",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResidentDetails {
    #[validate(length(min = 3, max = 50, message = "Resident name must be 3-50 characters"))]
    pub resident_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nric_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tin_number: Option<String>,
    #[validate(length(min = 2, max = 10, message = "Contact number must be 2-10 characters"))]
    pub contact_number: String,
    #[validate(email(message = "Invalid email format"))]
    pub contact_email: String,
    #[validate(length(min = 5, max = 100, message = "Address line 1 must be 5-100 characters"))]
    pub resident_address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100, message = "Address line 2 must be at most 100 characters"))]
    pub resident_address_line2: Option<String>,
    #[validate(length(min = 1, message = "Plate number is required"))]
    pub plate_number: String,
    #[validate(length(min = 1, message = "Vehicle type is required"))]
    pub vehicle_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetails {
    #[validate(length(min = 1, message = "Company registration number is required"))]
    pub company_registration_number: String,
    #[serde(default)]
    pub tin_number: String,
    #[validate(length(min = 1, message = "Company name is required"))]
    pub company_name: String,
    #[validate(length(min = 1, message = "Contact person is required"))]
    pub contact_person: String,
    #[validate(length(min = 2, max = 10, message = "Contact number must be 2-10 characters"))]
    pub contact_number: String,
    #[validate(email(message = "Invalid email format"))]
    pub contact_email: String,
    #[validate(length(min = 5, max = 100, message = "Address line 1 must be 5-100 characters"))]
    pub company_address_line1: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Address line 2 must be at most 100 characters"))]
    pub company_address_line2: String,
}

/// Details of the generic upload form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    #[validate(length(min = 1, message = "Company registration number is required"))]
    pub company_registration_number: String,
    #[validate(length(min = 1, message = "Company name is required"))]
    pub company_name: String,
    #[serde(default)]
    pub contact_person: String,
}

/// A declared vehicle in a multi-plate form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateRow {
    pub plate_number: String,
    #[serde(default)]
    pub vehicle_type: String,
    #[serde(default)]
    pub nric_number: String,
}

impl PlateRow {
    pub fn is_blank(&self) -> bool {
        self.plate_number.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompanyRequest<'a> {
    #[serde(flatten)]
    pub details: &'a CompanyDetails,
    pub plate_numbers: Vec<&'a PlateRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest<'a> {
    #[serde(flatten)]
    pub details: &'a ProjectDetails,
    pub plate_numbers: Vec<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentPlateFiles {
    pub plate_number: String,
    pub vehicle_type: String,
    pub vehicle_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentSupportingFiles {
    pub spa_path: String,
    pub electric_bill_path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResidentRequest<'a> {
    #[serde(rename = "registerID")]
    pub register_id: &'a str,
    #[serde(flatten)]
    pub details: &'a ResidentDetails,
    pub resident_plate: ResidentPlateFiles,
    pub resident_supporting_files: ResidentSupportingFiles,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyPlateFiles {
    pub nric_number: String,
    pub plate_number: String,
    pub vehicle_type: String,
    pub spa_path: String,
    pub electric_bill_path: String,
    pub vehicle_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySupportingFiles {
    pub ssm_path: String,
    pub electric_bill_path: String,
    pub vehicle_path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeCompanyRequest<'a> {
    #[serde(rename = "employerID")]
    pub employer_id: &'a str,
    #[serde(flatten)]
    pub details: &'a CompanyDetails,
    pub company_plates: Vec<CompanyPlateFiles>,
    pub company_supporting_files: CompanySupportingFiles,
}

/// Response of the finalize endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinalizedRegistration {
    #[serde(default)]
    pub id: Option<String>,
}
