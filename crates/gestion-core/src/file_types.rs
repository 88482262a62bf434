//! File type and size rules for stored receipts.

use crate::defaults::{ALLOWED_EXTENSIONS, MAX_FILE_BYTES};
use crate::error::{Error, ErrorCode, Result};
use crate::models::StoredFile;

/// MIME type sent for extensions with no explicit mapping.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// MIME types accepted for analysis; sniffed content must be one of these.
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "application/pdf"];

/// Reject files larger than [`MAX_FILE_BYTES`].
pub fn validate_file_size(size: u64) -> Result<()> {
    if size > MAX_FILE_BYTES {
        return Err(Error::validation(
            format!(
                "File exceeds the maximum size of {}MB",
                MAX_FILE_BYTES / (1024 * 1024)
            ),
            "file",
            ErrorCode::FileTooLarge,
        ));
    }
    Ok(())
}

/// Reject files whose extension is not in [`ALLOWED_EXTENSIONS`].
///
/// Returns the lowercased extension.
pub fn validate_file_type(file: &StoredFile) -> Result<String> {
    match file.extension() {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(ext),
        _ => Err(Error::validation(
            format!(
                "File type not allowed. Allowed extensions: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ),
            "file",
            ErrorCode::InvalidFileType,
        )),
    }
}

/// MIME type for a lowercased extension.
pub fn mime_from_extension(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => FALLBACK_MIME,
    }
}

/// Decide the MIME type to send for downloaded bytes.
///
/// Magic bytes win over the extension when they identify an allowed type.
/// Bytes identified as anything outside the allow-list are rejected; bytes
/// with no recognizable signature keep the extension's type.
pub fn resolve_mime_type(ext: &str, data: &[u8]) -> Result<&'static str> {
    let Some(kind) = infer::get(data) else {
        return Ok(mime_from_extension(ext));
    };

    let sniffed = kind.mime_type();
    ALLOWED_MIME_TYPES
        .iter()
        .find(|allowed| **allowed == sniffed)
        .copied()
        .ok_or_else(|| {
            Error::validation(
                format!("File content is {}, which is not an allowed type", sniffed),
                "file",
                ErrorCode::InvalidFileType,
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, 0x4A, 0x46, 0x49, 0x46];
    const ELF_MAGIC: &[u8] = &[0x7F, 0x45, 0x4C, 0x46, 2, 1, 1, 0, 0, 0, 0, 0];

    fn file(path: &str) -> StoredFile {
        StoredFile::from_locator(&format!("bucket/{}", path)).unwrap()
    }

    #[test]
    fn test_size_boundary() {
        assert!(validate_file_size(MAX_FILE_BYTES).is_ok());
        assert!(validate_file_size(0).is_ok());
        let err = validate_file_size(MAX_FILE_BYTES + 1).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FileTooLarge);
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_allowed_extensions_case_insensitive() {
        for name in ["a.jpg", "a.JPEG", "a.Png", "a.webp", "a.PDF"] {
            assert!(validate_file_type(&file(name)).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_disallowed_extensions() {
        for name in ["a.gif", "a.exe", "a.JPG.exe", "a", "dir.jpg/a", "a.heic"] {
            let err = validate_file_type(&file(name)).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidFileType, "{}", name);
        }
    }

    #[test]
    fn test_mime_map() {
        assert_eq!(mime_from_extension("png"), "image/png");
        assert_eq!(mime_from_extension("jpg"), "image/jpeg");
        assert_eq!(mime_from_extension("jpeg"), "image/jpeg");
        assert_eq!(mime_from_extension("webp"), "image/webp");
        assert_eq!(mime_from_extension("pdf"), "application/pdf");
        assert_eq!(mime_from_extension("bin"), FALLBACK_MIME);
    }

    #[test]
    fn test_unrecognized_bytes_keep_extension_type() {
        assert_eq!(resolve_mime_type("jpg", b"not really an image").unwrap(), "image/jpeg");
    }

    #[test]
    fn test_sniffed_type_overrides_extension() {
        assert_eq!(resolve_mime_type("jpg", PNG_MAGIC).unwrap(), "image/png");
        assert_eq!(resolve_mime_type("png", JPEG_MAGIC).unwrap(), "image/jpeg");
    }

    #[test]
    fn test_sniffed_executable_is_rejected() {
        let err = resolve_mime_type("jpg", ELF_MAGIC).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFileType);
    }
}
