mod yodda;

pub use yodda::{ApiErrorBody, ApiErrorObject, UPSTREAM_BODY_PREVIEW_CHARS, YoddaError};
