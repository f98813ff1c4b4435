use thiserror::Error;

use super::queue::RgQueueType;

/// RenderGraph 编译期 / 创建期错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RgError {
    #[error("invalid image description for '{name}': {reason}")]
    InvalidImageDesc { name: String, reason: String },

    #[error("invalid buffer description for '{name}': {reason}")]
    InvalidBufferDesc { name: String, reason: String },

    #[error("invalid view of image '{name}': {reason}")]
    InvalidImageView { name: String, reason: String },

    #[error("invalid view of buffer '{name}': {reason}")]
    InvalidBufferView { name: String, reason: String },

    #[error("pass '{pass}' references a resource that is not registered in this graph")]
    UnknownResource { pass: String },

    #[error("pass '{pass}' declares conflicting states for '{resource}'")]
    ConflictingUsage { pass: String, resource: String },

    #[error("pass '{pass}' on the {queue:?} queue uses '{resource}' as an attachment")]
    AttachmentOnNonGraphicsQueue {
        pass: String,
        queue: RgQueueType,
        resource: String,
    },

    #[error("pass '{pass}' uses '{resource}' with stages the {queue:?} queue cannot execute")]
    UnsupportedQueueUsage {
        pass: String,
        queue: RgQueueType,
        resource: String,
    },

    #[error("pass '{pass}' would clear image '{resource}' on the transfer queue")]
    UnsupportedClear { pass: String, resource: String },

    #[error("memory slot {slot} holds '{first}' and '{second}' with overlapping live ranges")]
    AliasOverlap { slot: usize, first: String, second: String },
}
