pub mod prompt_audio;
pub mod sessions;
pub mod word_audio;

/// Row status for lazily generated audio records. A `pending` row is a claim
/// held by the request currently synthesizing; `ready` rows carry a URL.
pub const STATUS_READY: &str = "ready";
