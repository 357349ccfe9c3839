use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use super::preview::{PreviewHandle, PreviewRegistry};
use crate::config::MAX_ATTACHMENT_BYTES;
use crate::models::attachment::{is_image_type, media_type_for_name};
use crate::models::AttachmentSummary;
use crate::providers::OutboundFile;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("{name} is too large to attach ({size} bytes, limit is {limit} bytes)")]
    Oversize { name: String, size: u64, limit: u64 },
}

fn check_size(name: &str, size: u64) -> Result<(), AttachmentError> {
    if size > MAX_ATTACHMENT_BYTES {
        tracing::warn!("Rejected {}: {} bytes exceeds the attachment limit", name, size);
        return Err(AttachmentError::Oversize {
            name: name.to_string(),
            size,
            limit: MAX_ATTACHMENT_BYTES,
        });
    }
    Ok(())
}

/// A file the user picked, before any validation.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub media_type: String,
    pub data: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk. Files over the attachment limit are rejected
    /// from their metadata without being read.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment")
            .to_string();

        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        check_size(&name, metadata.len())?;

        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let media_type = media_type_for_name(&name);
        Ok(Self::new(name, media_type, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Debug)]
pub struct StagedAttachment {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub media_type: String,
    pub data: Bytes,
    preview: Option<PreviewHandle>,
}

impl StagedAttachment {
    pub fn preview_url(&self) -> Option<&str> {
        self.preview.as_ref().map(|p| p.url())
    }

    #[cfg(test)]
    fn owns_live_preview(&self) -> bool {
        self.preview.as_ref().is_some_and(|p| !p.is_released())
    }

    fn release_preview(&mut self) -> bool {
        match self.preview.as_mut() {
            Some(handle) if !handle.is_released() => {
                handle.release();
                true
            }
            _ => false,
        }
    }

    pub fn summary(&self) -> AttachmentSummary {
        AttachmentSummary {
            name: self.name.clone(),
            size: self.size,
            media_type: self.media_type.clone(),
            preview: self.preview_url().map(str::to_string),
        }
    }

    pub fn to_outbound(&self) -> OutboundFile {
        OutboundFile {
            name: self.name.clone(),
            media_type: self.media_type.clone(),
            data: self.data.clone(),
        }
    }
}

/// Holds files staged for the next send along with their preview resources.
pub struct AttachmentManager {
    registry: Arc<PreviewRegistry>,
    staged: Vec<StagedAttachment>,
}

impl AttachmentManager {
    pub fn new(registry: Arc<PreviewRegistry>) -> Self {
        Self {
            registry,
            staged: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<PreviewRegistry> {
        &self.registry
    }

    pub fn stage(&mut self, file: SelectedFile) -> Result<String, AttachmentError> {
        let size = file.size();
        check_size(&file.name, size)?;

        let preview = if is_image_type(&file.media_type) {
            Some(self.registry.allocate(&file.media_type, file.data.clone()))
        } else {
            None
        };

        let id = Uuid::new_v4().to_string();
        tracing::debug!("Staged {} as {} ({} bytes)", file.name, id, size);
        self.staged.push(StagedAttachment {
            id: id.clone(),
            name: file.name,
            size,
            media_type: file.media_type,
            data: file.data,
            preview,
        });
        Ok(id)
    }

    /// Remove a staged file. Unknown ids are ignored.
    pub fn unstage(&mut self, id: &str) -> bool {
        let Some(index) = self.staged.iter().position(|a| a.id == id) else {
            return false;
        };
        let mut removed = self.staged.remove(index);
        removed.release_preview();
        true
    }

    /// Hand the whole stage to a send. Previews travel with the batch and are
    /// released by it, not by the manager.
    pub fn drain_for_send(&mut self) -> DrainedAttachments {
        DrainedAttachments {
            items: std::mem::take(&mut self.staged),
        }
    }

    /// Release every preview still owned here and empty the stage.
    pub fn release_all(&mut self) -> usize {
        let released = self
            .staged
            .iter_mut()
            .map(|a| a.release_preview())
            .filter(|released| *released)
            .count();
        self.staged.clear();
        released
    }

    pub fn staged(&self) -> &[StagedAttachment] {
        &self.staged
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    #[cfg(test)]
    pub fn owned_previews(&self) -> usize {
        self.staged.iter().filter(|a| a.owns_live_preview()).count()
    }
}

impl Drop for AttachmentManager {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Attachments taken off the stage for one send. Whatever previews are still
/// held when this is dropped get released.
#[derive(Debug)]
pub struct DrainedAttachments {
    items: Vec<StagedAttachment>,
}

impl DrainedAttachments {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn summaries(&self) -> Vec<AttachmentSummary> {
        self.items.iter().map(StagedAttachment::summary).collect()
    }

    pub fn to_outbound(&self) -> Vec<OutboundFile> {
        self.items.iter().map(StagedAttachment::to_outbound).collect()
    }

    pub fn release(mut self) -> usize {
        self.release_previews()
    }

    fn release_previews(&mut self) -> usize {
        self.items
            .iter_mut()
            .map(|a| a.release_preview())
            .filter(|released| *released)
            .count()
    }
}

impl Drop for DrainedAttachments {
    fn drop(&mut self) {
        self.release_previews();
    }
}
