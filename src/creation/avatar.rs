use chrono::Utc;
use rand::Rng;
use thiserror::Error;

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

const KEY_SUFFIX_LEN: usize = 6;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("File is too large. Maximum size: {} MB", megabytes(.max))]
    FileTooLarge { size: usize, max: usize },
    #[error("Please choose an image")]
    NotAnImage { content_type: String },
}

/// An image picked in the form, kept until submit.
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

fn megabytes(bytes: &usize) -> String {
    let megabytes = *bytes as f64 / (1024.0 * 1024.0);
    if megabytes.fract() == 0.0 {
        format!("{}", megabytes)
    } else {
        format!("{:.1}", megabytes)
    }
}

pub fn validate_avatar(file: &AvatarFile, max_bytes: usize) -> Result<(), ValidationError> {
    if file.bytes.len() > max_bytes {
        return Err(ValidationError::FileTooLarge {
            size: file.bytes.len(),
            max: max_bytes,
        });
    }
    if !file.content_type.starts_with("image/") {
        return Err(ValidationError::NotAnImage {
            content_type: file.content_type.clone(),
        });
    }
    Ok(())
}

/// `avatar_<unix millis>_<6 base36 chars>.<original extension>`
pub fn storage_key(file_name: &str) -> String {
    let extension = file_name.rsplit('.').next().unwrap_or(file_name);
    let mut rng = rand::rng();
    let suffix: String = (0..KEY_SUFFIX_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!(
        "avatar_{}_{}.{}",
        Utc::now().timestamp_millis(),
        suffix,
        extension
    )
}
