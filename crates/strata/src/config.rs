//! Configuration types for Strata layout.
//!
//! This module provides configuration structures that control how the layout
//! request is built, how the engine is invoked and where trace artifacts go.
//! All types implement [`serde::Deserialize`] so they can be loaded from TOML.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining every section.
//! - [`EngineConfig`] - Engine executable and timeout (`[engine]`).
//! - [`LayoutConfig`] - Spacing, routing and diagram-wide flags (`[layout]`).
//! - [`StyleConfig`] - Background color and label font (`[style]`).
//! - [`TraceConfig`] - Request/response trace artifacts (`[trace]`).
//!
//! # Example
//!
//! ```
//! # use strata::config::AppConfig;
//! let config = AppConfig::default();
//! assert_eq!(config.layout().group_inheritance(), u32::MAX);
//! assert_eq!(config.engine().timeout_secs(), 60);
//! ```

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use strata_core::color::Color;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    engine: EngineConfig,

    #[serde(default)]
    layout: LayoutConfig,

    #[serde(default)]
    style: StyleConfig,

    #[serde(default)]
    trace: TraceConfig,
}

impl AppConfig {
    pub fn new(
        engine: EngineConfig,
        layout: LayoutConfig,
        style: StyleConfig,
        trace: TraceConfig,
    ) -> Self {
        Self {
            engine,
            layout,
            style,
            trace,
        }
    }

    /// Returns this configuration with the `[layout]` section replaced.
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Returns this configuration with the `[style]` section replaced.
    pub fn with_style(mut self, style: StyleConfig) -> Self {
        self.style = style;
        self
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    pub fn trace(&self) -> &TraceConfig {
        &self.trace
    }

    /// Mutable access to the trace section, used by the CLI to apply
    /// `--trace-dir` on top of the file configuration.
    pub fn trace_mut(&mut self) -> &mut TraceConfig {
        &mut self.trace
    }
}

/// Layout engine executable settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Explicit path to the `dot` executable.
    dot_path: Option<PathBuf>,

    /// Seconds before a running engine process is killed.
    timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dot_path: None,
            timeout_secs: 60,
        }
    }
}

impl EngineConfig {
    pub fn new(dot_path: Option<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            dot_path,
            timeout_secs,
        }
    }

    pub fn dot_path(&self) -> Option<&PathBuf> {
        self.dot_path.as_ref()
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Edge routing style requested from the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Splines {
    /// Let the engine use its own default (curved splines).
    #[default]
    Default,
    Polyline,
    Ortho,
}

/// Main flow direction of the diagram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rankdir {
    #[default]
    TopToBottom,
    LeftToRight,
}

/// Request construction settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Caller directives emitted right after the request header. Entries
    /// starting with `nodesep` or `ranksep` are placeholders replaced with the
    /// computed spacing.
    directives: Vec<String>,

    /// Explicit node separation in pixels. Zero means computed.
    nodesep: f32,

    /// Explicit rank separation in pixels. Zero means computed.
    ranksep: f32,

    splines: Splines,
    rankdir: Rankdir,

    /// Number of inheritance links sharing a tail at which they are merged
    /// into a fan-in.
    group_inheritance: u32,

    compatibility_mode: bool,
    swimlanes: bool,
    strict_uml_style: bool,
    hide_empty_description: bool,
    same_class_width: bool,

    /// Regions whose right edge exceeds this x coordinate are reported.
    width_limit: Option<f32>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            directives: vec!["nodesep=.35;".to_string(), "ranksep=0.8;".to_string()],
            nodesep: 0.0,
            ranksep: 0.0,
            splines: Splines::Default,
            rankdir: Rankdir::TopToBottom,
            group_inheritance: u32::MAX,
            compatibility_mode: false,
            swimlanes: false,
            strict_uml_style: false,
            hide_empty_description: false,
            same_class_width: false,
            width_limit: None,
        }
    }
}

impl LayoutConfig {
    pub fn directives(&self) -> &[String] {
        &self.directives
    }

    pub fn nodesep(&self) -> f32 {
        self.nodesep
    }

    pub fn ranksep(&self) -> f32 {
        self.ranksep
    }

    pub fn splines(&self) -> Splines {
        self.splines
    }

    pub fn rankdir(&self) -> Rankdir {
        self.rankdir
    }

    pub fn group_inheritance(&self) -> u32 {
        self.group_inheritance
    }

    pub fn compatibility_mode(&self) -> bool {
        self.compatibility_mode
    }

    pub fn swimlanes(&self) -> bool {
        self.swimlanes
    }

    pub fn strict_uml_style(&self) -> bool {
        self.strict_uml_style
    }

    pub fn hide_empty_description(&self) -> bool {
        self.hide_empty_description
    }

    pub fn same_class_width(&self) -> bool {
        self.same_class_width
    }

    pub fn width_limit(&self) -> Option<f32> {
        self.width_limit
    }

    pub fn with_directives(mut self, directives: Vec<String>) -> Self {
        self.directives = directives;
        self
    }

    pub fn with_nodesep(mut self, nodesep: f32) -> Self {
        self.nodesep = nodesep;
        self
    }

    pub fn with_ranksep(mut self, ranksep: f32) -> Self {
        self.ranksep = ranksep;
        self
    }

    pub fn with_splines(mut self, splines: Splines) -> Self {
        self.splines = splines;
        self
    }

    pub fn with_rankdir(mut self, rankdir: Rankdir) -> Self {
        self.rankdir = rankdir;
        self
    }

    pub fn with_group_inheritance(mut self, limit: u32) -> Self {
        self.group_inheritance = limit;
        self
    }

    pub fn with_compatibility_mode(mut self, enabled: bool) -> Self {
        self.compatibility_mode = enabled;
        self
    }

    pub fn with_swimlanes(mut self, enabled: bool) -> Self {
        self.swimlanes = enabled;
        self
    }

    pub fn with_strict_uml_style(mut self, enabled: bool) -> Self {
        self.strict_uml_style = enabled;
        self
    }

    pub fn with_hide_empty_description(mut self, enabled: bool) -> Self {
        self.hide_empty_description = enabled;
        self
    }

    pub fn with_same_class_width(mut self, enabled: bool) -> Self {
        self.same_class_width = enabled;
        self
    }

    pub fn with_width_limit(mut self, limit: Option<f32>) -> Self {
        self.width_limit = limit;
        self
    }
}

/// Visual styling configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Background color, as a CSS color string.
    background_color: Option<String>,

    /// Font used to measure link labels.
    font_family: String,

    font_size: u16,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            background_color: None,
            font_family: String::from("sans-serif"),
            font_size: 13,
        }
    }
}

impl StyleConfig {
    /// Returns the parsed background [`Color`], or `None` if no color is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured color string cannot be parsed
    /// into a valid [`Color`].
    pub fn background_color(&self) -> Result<Option<Color>, String> {
        self.background_color
            .as_ref()
            .map(|color| Color::new(color))
            .transpose()
            .map_err(|err| format!("Invalid background color in config: {err}"))
    }

    pub fn font_family(&self) -> &str {
        &self.font_family
    }

    pub fn font_size(&self) -> u16 {
        self.font_size
    }

    pub fn with_background_color(mut self, color: Option<String>) -> Self {
        self.background_color = color;
        self
    }
}

/// Security profile governing whether trace artifacts may be written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityProfile {
    Unsecure,
    #[default]
    Legacy,
    Sandbox,
    AllowList,
    Internet,
}

impl SecurityProfile {
    /// Returns true when this profile permits writing trace files.
    pub fn allows_trace(self) -> bool {
        matches!(self, Self::Unsecure | Self::Legacy | Self::Sandbox)
    }
}

/// Trace artifact settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Directory receiving `<stem>.dot` and `<stem>.svg`. Tracing is off when unset.
    directory: Option<PathBuf>,

    /// File stem of the artifacts.
    stem: String,

    security_profile: SecurityProfile,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            directory: None,
            stem: String::from("strata"),
            security_profile: SecurityProfile::default(),
        }
    }
}

impl TraceConfig {
    pub fn directory(&self) -> Option<&PathBuf> {
        self.directory.as_ref()
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn security_profile(&self) -> SecurityProfile {
        self.security_profile
    }

    pub fn set_directory(&mut self, directory: Option<PathBuf>) {
        self.directory = directory;
    }

    pub fn set_stem(&mut self, stem: impl Into<String>) {
        self.stem = stem.into();
    }

    pub fn set_security_profile(&mut self, profile: SecurityProfile) {
        self.security_profile = profile;
    }

    /// Returns the trace directory when tracing is both requested and
    /// permitted.
    pub fn active_directory(&self) -> Option<&PathBuf> {
        self.directory
            .as_ref()
            .filter(|_| self.security_profile.allows_trace())
    }
}
