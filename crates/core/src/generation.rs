//! Generation request options and their kind-specific defaults.
//!
//! Callers supply a sparse [`GenerationOptions`]; [`GenerationOptions::resolve`]
//! fills in the defaults for the target [`GenerationKind`] and produces the
//! [`SubmitRequest`] body that is sent to the backend.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::GenerationKind;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default generation method for study guides.
pub const DEFAULT_STUDY_GUIDE_METHOD: &str = "dynamic_chapters";
/// Default generation method for presentations.
pub const DEFAULT_PRESENTATION_METHOD: &str = "dynamic_slides";
/// Default Beamer theme for presentations.
pub const DEFAULT_PRESENTATION_THEME: &str = "madrid";
/// Default Beamer color scheme for presentations.
pub const DEFAULT_PRESENTATION_COLOR_SCHEME: &str = "default";
/// Timezone sent when the local zone cannot be determined.
pub const FALLBACK_TIMEZONE: &str = "UTC";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Caller-supplied generation options. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub generation_method: Option<String>,
    pub theme: Option<String>,
    pub color_scheme: Option<String>,
    /// IANA timezone name, e.g. `Europe/Berlin`.
    pub timezone: Option<String>,
}

/// Fully-resolved body of a "start generation" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitRequest {
    pub generation_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<String>,
    pub timezone: String,
}

impl GenerationOptions {
    /// Apply the defaults for `kind`.
    ///
    /// Study guides carry no theme or color scheme; presentations default
    /// to the `madrid` theme with the `default` color scheme. A missing
    /// timezone resolves to [`local_timezone`].
    pub fn resolve(&self, kind: GenerationKind) -> SubmitRequest {
        let timezone = non_blank(&self.timezone).unwrap_or_else(local_timezone);

        match kind {
            GenerationKind::StudyGuide => SubmitRequest {
                generation_method: non_blank(&self.generation_method)
                    .unwrap_or_else(|| DEFAULT_STUDY_GUIDE_METHOD.to_string()),
                theme: None,
                color_scheme: None,
                timezone,
            },
            GenerationKind::Presentation => SubmitRequest {
                generation_method: non_blank(&self.generation_method)
                    .unwrap_or_else(|| DEFAULT_PRESENTATION_METHOD.to_string()),
                theme: Some(
                    non_blank(&self.theme)
                        .unwrap_or_else(|| DEFAULT_PRESENTATION_THEME.to_string()),
                ),
                color_scheme: Some(
                    non_blank(&self.color_scheme)
                        .unwrap_or_else(|| DEFAULT_PRESENTATION_COLOR_SCHEME.to_string()),
                ),
                timezone,
            },
        }
    }
}

/// The caller's local IANA timezone, taken from `TZ`.
///
/// POSIX-style values with a leading `:` (e.g. `:Europe/Paris`) are
/// accepted. Falls back to [`FALLBACK_TIMEZONE`].
pub fn local_timezone() -> String {
    std::env::var("TZ")
        .ok()
        .map(|tz| tz.trim().trim_start_matches(':').to_string())
        .filter(|tz| !tz.is_empty())
        .unwrap_or_else(|| FALLBACK_TIMEZONE.to_string())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate the identifier of the entity a job is generated for.
pub fn validate_subject_id(subject_id: &str) -> Result<(), CoreError> {
    if subject_id.trim().is_empty() {
        return Err(CoreError::Validation(
            "Subject id must not be empty".to_string(),
        ));
    }
    Ok(())
}
