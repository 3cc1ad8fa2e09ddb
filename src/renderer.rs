//! Diagram source to SVG, delegated to an external renderer.

use std::io::Write;
use std::process::{Command, Stdio};

use serde::Serialize;

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::theme::ThemeName;

/// Shown in place of a diagram the renderer rejected.
pub const PARSE_ERROR_PLACEHOLDER: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="420" height="60"><rect width="100%" height="100%" fill="#fee2e2"/><text x="12" y="36" font-size="14" fill="#b91c1c">Mermaid Parse Error</text></svg>"##;

/// Per-call renderer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub theme: ThemeName,
    pub security_level: String,
    pub font_family: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitDirective<'a> {
    theme: &'a str,
    security_level: &'a str,
    font_family: &'a str,
}

impl RenderSettings {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            theme: config.theme,
            security_level: config.security_level.clone(),
            font_family: config.font_family.clone(),
        }
    }

    /// The `%%{init: ...}%%` line that carries these settings inside the source.
    pub fn init_directive(&self) -> String {
        let directive = InitDirective {
            theme: self.theme.renderer_theme(),
            security_level: &self.security_level,
            font_family: &self.font_family,
        };
        // Serializing three string fields cannot fail.
        let json = serde_json::to_string(&directive).unwrap_or_default();
        format!("%%{{init: {json}}}%%")
    }

    pub fn apply_to(&self, source: &str) -> String {
        format!("{}\n{}", self.init_directive(), source)
    }
}

pub trait DiagramRenderer {
    fn render(&self, source: &str, settings: &RenderSettings) -> Result<String, RenderError>;
}

/// Pipes the source into an external program and reads SVG from its stdout.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl DiagramRenderer for CommandRenderer {
    fn render(&self, source: &str, settings: &RenderSettings) -> Result<String, RenderError> {
        let input = settings.apply_to(source);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // stdin is written while stdout drains; both pipes can fill.
        let stdin = child.stdin.take();
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || -> std::io::Result<()> {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(input.as_bytes())?;
                }
                Ok(())
            });
            let output = child.wait_with_output();
            if let Ok(Err(err)) = writer.join() {
                log::debug!("renderer closed stdin early: {err}");
            }
            output
        })?;

        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let svg = String::from_utf8(output.stdout).map_err(|_| RenderError::InvalidUtf8)?;
        if svg.trim().is_empty() {
            return Err(RenderError::EmptyOutput);
        }
        Ok(svg)
    }
}

/// Renders `source`, substituting the placeholder on failure.
pub fn render_or_placeholder(
    renderer: &dyn DiagramRenderer,
    source: &str,
    settings: &RenderSettings,
) -> String {
    match renderer.render(source, settings) {
        Ok(svg) => svg,
        Err(err) => {
            log::warn!("diagram could not be rendered: {err}");
            PARSE_ERROR_PLACEHOLDER.to_string()
        }
    }
}
