//! Validation of wire file pointers and construction of export pointers

use thiserror::Error;

use super::hashing;
use crate::models::{
    Attachment, AttachmentOwner, AttachmentReference, AttachmentReferenceParams, MediaTierInfo,
    NewAttachment, RenderingFlag, TransitTierInfo,
};
use crate::proto::{
    AttachmentFlag, AttachmentLocator, BackupLocator, FilePointer, Locator, MessageAttachment,
};

/// Content type assumed when a pointer carries none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Field-level problem with a wire file pointer
///
/// Fields are checked in a fixed order and the first missing one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum AttachmentCreationError {
    #[error("backup locator has no media name")]
    MissingMediaName,
    #[error("attachment locator has no cdn key")]
    MissingCdnKey,
    #[error("locator has no encryption key")]
    MissingEncryptionKey,
    #[error("locator has no digest")]
    MissingDigest,
    #[error("locator has a zero size")]
    MissingSize,
    #[error("pointer has an invalid locator")]
    InvalidLocator,
}

/// Where validated bytes can be fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedLocation {
    Backup {
        media_name: String,
        cdn_number: Option<u32>,
        key: Vec<u8>,
        digest: Vec<u8>,
        size: u32,
        /// Transit upload the media-tier copy came from, if still known
        transit: Option<(String, u32)>,
    },
    Transit {
        cdn_key: String,
        cdn_number: u32,
        upload_timestamp: u64,
        key: Vec<u8>,
        digest: Vec<u8>,
        size: u32,
    },
}

/// A file pointer whose locator passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPointer {
    pub content_type: String,
    pub file_name: Option<String>,
    pub caption: Option<String>,
    pub blur_hash: Option<String>,
    pub dimensions: Option<(u32, u32)>,
    pub location: ValidatedLocation,
}

fn validate_backup_locator(
    locator: &BackupLocator,
) -> Result<ValidatedLocation, AttachmentCreationError> {
    if locator.media_name.is_empty() {
        return Err(AttachmentCreationError::MissingMediaName);
    }
    if locator.key.is_empty() {
        return Err(AttachmentCreationError::MissingEncryptionKey);
    }
    if locator.digest.is_empty() {
        return Err(AttachmentCreationError::MissingDigest);
    }
    if locator.size == 0 {
        return Err(AttachmentCreationError::MissingSize);
    }

    // The nested transit location is optional extra metadata
    let transit = locator
        .transit_cdn_key
        .as_ref()
        .filter(|key| !key.is_empty())
        .map(|key| (key.clone(), locator.transit_cdn_number.unwrap_or(0)));

    Ok(ValidatedLocation::Backup {
        media_name: locator.media_name.clone(),
        cdn_number: locator.cdn_number,
        key: locator.key.clone(),
        digest: locator.digest.clone(),
        size: locator.size,
        transit,
    })
}

fn validate_attachment_locator(
    locator: &AttachmentLocator,
) -> Result<ValidatedLocation, AttachmentCreationError> {
    if locator.cdn_key.is_empty() {
        return Err(AttachmentCreationError::MissingCdnKey);
    }
    if locator.key.is_empty() {
        return Err(AttachmentCreationError::MissingEncryptionKey);
    }
    if locator.digest.is_empty() {
        return Err(AttachmentCreationError::MissingDigest);
    }
    if locator.size == 0 {
        return Err(AttachmentCreationError::MissingSize);
    }

    Ok(ValidatedLocation::Transit {
        cdn_key: locator.cdn_key.clone(),
        cdn_number: locator.cdn_number,
        upload_timestamp: locator.upload_timestamp.unwrap_or(0),
        key: locator.key.clone(),
        digest: locator.digest.clone(),
        size: locator.size,
    })
}

/// Check a wire pointer before anything is written
pub fn validate_file_pointer(
    pointer: &FilePointer,
) -> Result<ValidatedPointer, AttachmentCreationError> {
    let location = match &pointer.locator {
        Locator::BackupLocator(locator) => validate_backup_locator(locator)?,
        Locator::AttachmentLocator(locator) => validate_attachment_locator(locator)?,
        Locator::InvalidAttachmentLocator => return Err(AttachmentCreationError::InvalidLocator),
    };

    Ok(ValidatedPointer {
        content_type: pointer
            .content_type
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        file_name: pointer.file_name.clone(),
        caption: pointer.caption.clone(),
        blur_hash: pointer.blur_hash.clone(),
        dimensions: pointer.width.zip(pointer.height),
        location,
    })
}

impl ValidatedPointer {
    /// The attachment row this pointer describes
    pub fn new_attachment(&self) -> NewAttachment {
        let key = match &self.location {
            ValidatedLocation::Backup { key, .. } | ValidatedLocation::Transit { key, .. } => {
                key.clone()
            }
        };
        let mut attachment = NewAttachment::blank(self.content_type.clone(), key);
        attachment.blur_hash = self.blur_hash.clone();

        match &self.location {
            ValidatedLocation::Backup {
                media_name,
                cdn_number,
                digest,
                size,
                transit,
                ..
            } => {
                attachment.media_name = Some(media_name.clone());
                attachment.media_tier = Some(MediaTierInfo {
                    cdn_number: *cdn_number,
                    digest: digest.clone(),
                    unencrypted_byte_count: *size,
                });
                attachment.transit_tier =
                    transit.as_ref().map(|(cdn_key, cdn_number)| TransitTierInfo {
                        cdn_key: cdn_key.clone(),
                        cdn_number: *cdn_number,
                        upload_timestamp: 0,
                        digest: digest.clone(),
                        unencrypted_byte_count: Some(*size),
                    });
            }
            ValidatedLocation::Transit {
                cdn_key,
                cdn_number,
                upload_timestamp,
                digest,
                size,
                ..
            } => {
                attachment.transit_tier = Some(TransitTierInfo {
                    cdn_key: cdn_key.clone(),
                    cdn_number: *cdn_number,
                    upload_timestamp: *upload_timestamp,
                    digest: digest.clone(),
                    unencrypted_byte_count: Some(*size),
                });
            }
        }
        attachment
    }

    /// Owner-side reference data for this pointer
    pub fn reference_params(
        &self,
        owner: AttachmentOwner,
        rendering_flag: RenderingFlag,
        client_uuid: Option<uuid::Uuid>,
    ) -> AttachmentReferenceParams {
        let size = match &self.location {
            ValidatedLocation::Backup { size, .. } | ValidatedLocation::Transit { size, .. } => {
                *size
            }
        };
        AttachmentReferenceParams {
            owner,
            rendering_flag,
            client_uuid,
            source_filename: self.file_name.clone(),
            source_unencrypted_byte_count: Some(size),
            source_media_size_pixels: self.dimensions,
            caption: self.caption.clone(),
        }
    }

    pub fn width(&self) -> Option<u32> {
        self.dimensions.map(|(w, _)| w)
    }

    pub fn height(&self) -> Option<u32> {
        self.dimensions.map(|(_, h)| h)
    }
}

pub fn rendering_flag_from_wire(flag: AttachmentFlag) -> RenderingFlag {
    match flag {
        AttachmentFlag::None => RenderingFlag::Default,
        AttachmentFlag::VoiceMessage => RenderingFlag::VoiceMessage,
        AttachmentFlag::Borderless => RenderingFlag::Borderless,
        AttachmentFlag::Gif => RenderingFlag::ShouldLoop,
    }
}

pub fn rendering_flag_to_wire(flag: RenderingFlag) -> AttachmentFlag {
    match flag {
        RenderingFlag::Default => AttachmentFlag::None,
        RenderingFlag::VoiceMessage => AttachmentFlag::VoiceMessage,
        RenderingFlag::Borderless => AttachmentFlag::Borderless,
        RenderingFlag::ShouldLoop => AttachmentFlag::Gif,
    }
}

fn backup_locator_for(attachment: &Attachment) -> Option<BackupLocator> {
    let media_name = attachment.media_name.clone().or_else(|| {
        attachment
            .sha256_content_hash
            .as_ref()
            .map(|hash| hashing::media_name(hash, &attachment.encryption_key))
    })?;

    let (cdn_number, digest, size) = match (&attachment.media_tier, &attachment.stream) {
        (Some(media), _) => (media.cdn_number, media.digest.clone(), media.unencrypted_byte_count),
        (None, Some(stream)) => (None, stream.digest.clone(), stream.unencrypted_byte_count),
        (None, None) => return None,
    };

    Some(BackupLocator {
        media_name,
        cdn_number,
        key: attachment.encryption_key.clone(),
        digest,
        size,
        transit_cdn_key: attachment.transit_tier.as_ref().map(|t| t.cdn_key.clone()),
        transit_cdn_number: attachment.transit_tier.as_ref().map(|t| t.cdn_number),
    })
}

/// Build the export pointer for one reference
///
/// Media tier or a local stream gives a backup locator, a transit upload
/// alone gives an attachment locator, anything else is marked invalid.
pub fn file_pointer_for(attachment: &Attachment, reference: &AttachmentReference) -> FilePointer {
    let locator = if let Some(backup) = backup_locator_for(attachment) {
        Locator::BackupLocator(backup)
    } else if let Some(transit) = &attachment.transit_tier {
        Locator::AttachmentLocator(AttachmentLocator {
            cdn_key: transit.cdn_key.clone(),
            cdn_number: transit.cdn_number,
            upload_timestamp: Some(transit.upload_timestamp),
            key: attachment.encryption_key.clone(),
            digest: transit.digest.clone(),
            size: transit
                .unencrypted_byte_count
                .or(reference.source_unencrypted_byte_count)
                .unwrap_or(0),
        })
    } else {
        Locator::InvalidAttachmentLocator
    };

    FilePointer {
        content_type: Some(attachment.mime_type.clone()),
        file_name: reference.source_filename.clone(),
        caption: reference.caption.clone(),
        blur_hash: attachment.blur_hash.clone(),
        width: reference.source_media_size_pixels.map(|(w, _)| w),
        height: reference.source_media_size_pixels.map(|(_, h)| h),
        locator,
    }
}

/// Export form of a body or thumbnail reference
pub fn message_attachment_for(
    attachment: &Attachment,
    reference: &AttachmentReference,
) -> MessageAttachment {
    MessageAttachment {
        pointer: file_pointer_for(attachment, reference),
        flag: rendering_flag_to_wire(reference.rendering_flag),
        client_uuid: reference.client_uuid,
        was_downloaded: attachment.is_stream(),
    }
}
