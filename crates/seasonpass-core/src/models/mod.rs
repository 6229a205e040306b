pub mod registration;
pub mod remote;
pub mod session;
pub mod upload;

pub use registration::{
    CompanyDetails, CompanyPlateFiles, CompanySupportingFiles, CreateCompanyRequest,
    CreateProjectRequest, FinalizeCompanyRequest, FinalizeResidentRequest, FinalizedRegistration,
    FormKind, PlateRow, ProjectDetails, ResidentDetails, ResidentPlateFiles,
    ResidentSupportingFiles,
};
pub use remote::{
    ApiEnvelope, CreatedRegistration, DownloadLink, LocationSettings, RemoteConfig, UploadTarget,
    UploadTokenData, UploadTokenRequest,
};
pub use session::{UploadAuthorization, UploadSession};
pub use upload::{
    FileSource, FileStatus, LocalFile, PlateInfo, TaskId, UploadCategory, UploadResult,
    UploadTask, DEFAULT_CONTENT_TYPE,
};
