use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

/// Options for a single screenshot capture.
#[derive(Debug, Clone)]
pub struct ScreenshotOptions {
    pub viewport: Viewport,
    pub full_page: bool,
    pub format: ImageFormat,
    /// Navigation budget handed to the remote browser, in milliseconds.
    pub navigation_timeout_ms: u64,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            full_page: false,
            format: ImageFormat::Png,
            navigation_timeout_ms: 12_000,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GotoOptions {
    pub wait_until: &'static str,
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CaptureOptions {
    pub full_page: bool,
    #[serde(rename = "type")]
    pub format: ImageFormat,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScreenshotRequest<'a> {
    pub url: &'a str,
    pub viewport: Viewport,
    pub goto_options: GotoOptions,
    pub screenshot_options: CaptureOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContentRequest<'a> {
    pub url: &'a str,
    pub goto_options: GotoOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiMessage {
    #[serde(default)]
    pub message: String,
}

/// Envelope used by JSON endpoints and by error bodies.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
}

impl<T> ApiEnvelope<T> {
    pub fn error_text(&self) -> String {
        if self.errors.is_empty() {
            return "unknown error".to_string();
        }
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
