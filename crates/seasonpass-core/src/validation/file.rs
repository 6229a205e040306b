//! Client-side file checks run before any network call.
//!
//! These only save wasted uploads; the backend must re-validate.

use crate::config::UploadConfig;
use crate::error::ValidationError;
use crate::models::LocalFile;

#[derive(Clone, Debug)]
pub struct FileValidator {
    max_size_bytes: u64,
    max_size_mb: u64,
    allowed_type_prefixes: Vec<String>,
    allowed_extensions: Vec<String>,
}

impl FileValidator {
    pub fn new(
        max_size_mb: u64,
        allowed_type_prefixes: Vec<String>,
        allowed_extensions: Vec<String>,
    ) -> Self {
        Self {
            max_size_bytes: max_size_mb.saturating_mul(1024 * 1024),
            max_size_mb,
            allowed_type_prefixes: allowed_type_prefixes
                .into_iter()
                .map(|p| p.to_lowercase())
                .collect(),
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            config.max_file_size_mb,
            config.allowed_type_prefixes.clone(),
            config.allowed_extensions.clone(),
        )
    }

    /// Accept or reject a candidate file.
    ///
    /// A declared content type is matched against the prefix allow-list first;
    /// the extension list is the fallback both when the type is missing and
    /// when it is not allowed.
    pub fn validate(&self, file: &LocalFile) -> Result<(), ValidationError> {
        if file.size > self.max_size_bytes {
            return Err(ValidationError::FileTooLarge {
                name: file.name.clone(),
                size: file.size,
                max_mb: self.max_size_mb,
            });
        }

        let extension_allowed = file
            .extension()
            .map(|ext| self.allowed_extensions.iter().any(|allowed| *allowed == ext))
            .unwrap_or(false);

        match file.content_type.as_deref().filter(|ct| !ct.trim().is_empty()) {
            Some(content_type) => {
                let content_type = content_type.to_lowercase();
                let type_allowed = self
                    .allowed_type_prefixes
                    .iter()
                    .any(|prefix| content_type.starts_with(prefix.as_str()));
                if type_allowed || extension_allowed {
                    Ok(())
                } else {
                    Err(ValidationError::TypeNotAllowed {
                        name: file.name.clone(),
                        allowed: self.allowed_type_prefixes.join(", "),
                    })
                }
            }
            None if extension_allowed => Ok(()),
            None => Err(ValidationError::TypeNotRecognized {
                name: file.name.clone(),
                allowed: self.allowed_extensions.join(", "),
            }),
        }
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }
}
