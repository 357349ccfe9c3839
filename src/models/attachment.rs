use serde::{Deserialize, Serialize};

/// The UI-safe record of a file that was sent with a message.
///
/// `preview` is only the URL string of the preview resource; the resource
/// itself stays with whoever staged the file and is released after sending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSummary {
    pub name: String,
    pub size: u64,
    pub media_type: String,
    pub preview: Option<String>,
}

impl AttachmentSummary {
    pub fn is_image(&self) -> bool {
        is_image_type(&self.media_type)
    }
}

pub fn is_image_type(media_type: &str) -> bool {
    media_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
}

/// Guess a media type from a file name's extension.
pub fn media_type_for_name(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "json" => "application/json",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        _ => "application/octet-stream",
    }
}
