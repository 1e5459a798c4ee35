use std::path::PathBuf;

use clap::Parser;
use scei_core::generation::GenerationOptions;
use scei_core::types::GenerationKind;

/// Generate a study guide or presentation for a unit and wait for it.
#[derive(Parser, Debug)]
#[command(name = "scei-generate")]
#[command(version, about = "Start an SCEI generation job and follow it to completion", long_about = None)]
pub struct CliArgs {
    /// Artifact to generate: study-guide or presentation
    pub kind: GenerationKind,

    /// Unit the artifact is generated for
    pub unit_id: String,

    /// Generation method (defaults per kind)
    #[arg(long = "method")]
    pub method: Option<String>,

    /// Beamer theme (presentations only)
    #[arg(long = "theme")]
    pub theme: Option<String>,

    /// Beamer color scheme (presentations only)
    #[arg(long = "color-scheme")]
    pub color_scheme: Option<String>,

    /// IANA timezone sent with the request (defaults to the local zone)
    #[arg(long = "timezone")]
    pub timezone: Option<String>,

    /// Write the generated document here instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

impl CliArgs {
    pub fn to_options(&self) -> GenerationOptions {
        GenerationOptions {
            generation_method: self.method.clone(),
            theme: self.theme.clone(),
            color_scheme: self.color_scheme.clone(),
            timezone: self.timezone.clone(),
        }
    }
}
