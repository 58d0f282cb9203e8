use crate::request::PermissionRequest;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("permission denied for: {}", request.title)]
pub struct PermissionDenied {
    pub request: PermissionRequest,
}
