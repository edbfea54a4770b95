//! Serializing a registry into a layout request and running it.

use std::{fmt::Write, fs, path::Path};

use log::{debug, info, trace, warn};

use strata_core::{
    geometry::{Point, Size},
    model::DiagramKind,
};

use crate::{
    config::{LayoutConfig, Rankdir, Splines, TraceConfig},
    engine::{EngineError, EngineVersion, LayoutEngine, OutputFormat},
    error::LayoutError,
};

use super::{edge::EdgeLine, pixels_to_inches, registry::LayoutRegistry, solve};

/// Number of engine submissions per render: the first try plus one retry
/// after a runtime crash.
pub const MAX_ENGINE_ATTEMPTS: usize = 2;

/// Distance kept between the drawing and the canvas border after solving.
pub const CANVAS_MARGIN: f32 = 6.0;

/// A successful engine run.
#[derive(Debug, Clone)]
pub struct Submission {
    pub document: String,
    /// Number of submissions it took, at most [`MAX_ENGINE_ATTEMPTS`].
    pub attempts: usize,
    /// Engine version the final request was built for.
    pub version: Option<EngineVersion>,
}

/// Turns a populated [`LayoutRegistry`] into request text, submits it and
/// writes the answer back.
#[derive(Debug, Clone, Copy)]
pub struct LayoutRequestBuilder<'a> {
    config: &'a LayoutConfig,
    kind: DiagramKind,
    trace: Option<&'a TraceConfig>,
}

impl<'a> LayoutRequestBuilder<'a> {
    pub fn new(config: &'a LayoutConfig, kind: DiagramKind) -> Self {
        Self {
            config,
            kind,
            trace: None,
        }
    }

    /// Writes the request and the raw response next to each other when the
    /// trace configuration allows it.
    pub fn with_trace(mut self, trace: &'a TraceConfig) -> Self {
        self.trace = Some(trace);
        self
    }

    fn min_nodesep(&self) -> f32 {
        match self.kind {
            DiagramKind::Activity => 20.0,
            _ => 35.0,
        }
    }

    fn min_ranksep(&self) -> f32 {
        if self.kind == DiagramKind::Activity || self.config.compatibility_mode() {
            40.0
        } else {
            60.0
        }
    }

    /// Horizontal separation between nodes, in pixels.
    pub fn nodesep(&self, registry: &LayoutRegistry) -> f32 {
        if self.config.nodesep() != 0.0 {
            return self.config.nodesep();
        }
        let dzeta = max_dzeta(registry, EdgeLine::horizontal_dzeta) / 10.0;
        dzeta.max(self.min_nodesep())
    }

    /// Vertical separation between ranks, in pixels.
    pub fn ranksep(&self, registry: &LayoutRegistry) -> f32 {
        if self.config.ranksep() != 0.0 {
            return self.config.ranksep();
        }
        let divisor = if self.config.compatibility_mode() {
            100.0
        } else {
            10.0
        };
        let dzeta = max_dzeta(registry, EdgeLine::vertical_dzeta) / divisor;
        dzeta.max(self.min_ranksep())
    }

    /// Builds the complete request text.
    ///
    /// `version` decides whether forced labels can be requested with
    /// orthogonal splines. An unknown version is assumed recent.
    pub fn build_request(&self, registry: &LayoutRegistry, version: Option<EngineVersion>) -> String {
        let nodesep = self.nodesep(registry);
        let ranksep = self.ranksep(registry);
        debug!(nodesep = nodesep, ranksep = ranksep; "Computed separations");

        let mut out = String::from("digraph unix {\n");
        for directive in self.config.directives() {
            if directive.starts_with("ranksep") {
                let _ = writeln!(out, "ranksep={};", pixels_to_inches(ranksep));
            } else if directive.starts_with("nodesep") {
                let _ = writeln!(out, "nodesep={};", pixels_to_inches(nodesep));
            } else {
                let _ = writeln!(out, "{directive}");
            }
        }
        out.push_str("remincross=true;\n");
        out.push_str("searchsize=500;\n");
        if registry.has_region_edges() {
            out.push_str("compound=true;\n");
        }

        let splines = self.config.splines();
        match splines {
            Splines::Default => {}
            Splines::Polyline => out.push_str("splines=polyline;\n"),
            Splines::Ortho => {
                out.push_str("splines=ortho;");
                if version.is_none_or(EngineVersion::supports_forced_labels) {
                    out.push_str("forcelabels=true;");
                }
                out.push('\n');
            }
        }
        if self.config.rankdir() == Rankdir::LeftToRight {
            out.push_str("rankdir=LR;\n");
        }

        let tree = registry.tree();
        tree.append_anchors(&mut out);

        let compatibility = self.config.compatibility_mode();
        tree.append_shapes(tree.root(), registry.nodes(), &mut out);
        if compatibility {
            tree.append_regions(tree.root(), registry.nodes(), true, &mut out);
        }
        for edge in registry.plain_edges() {
            edge.append_request(&mut out, splines);
        }
        if !compatibility {
            tree.append_regions(tree.root(), registry.nodes(), false, &mut out);
        }
        for edge in registry.labeled_edges() {
            edge.append_request(&mut out, splines);
        }

        out.push_str("}\n");
        out
    }

    /// Submits the request, retrying once after an engine runtime crash with
    /// a freshly queried version and a rebuilt request.
    ///
    /// # Errors
    ///
    /// [`LayoutError::Timeout`] when the engine did not terminate normally,
    /// [`LayoutError::Engine`] when it could not be driven or crashed on the
    /// last attempt.
    pub fn submit(
        &self,
        registry: &LayoutRegistry,
        engine: &dyn LayoutEngine,
    ) -> Result<Submission, LayoutError> {
        let mut version = engine.version(false);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let request = self.build_request(registry, version);
            self.write_trace("dot", &request);
            trace!(engine = engine.name(), attempt = attempts, request = request.as_str(); "Submitting layout request");

            match engine.submit(&request, OutputFormat::Svg) {
                Ok(output) => {
                    if !output.state.is_ok() {
                        return Err(LayoutError::Timeout {
                            state: output.state,
                            cause: output.cause,
                        });
                    }
                    self.write_trace("svg", &output.document);
                    return Ok(Submission {
                        document: output.document,
                        attempts,
                        version,
                    });
                }
                Err(EngineError::RuntimeCrash { cause }) if attempts < MAX_ENGINE_ATTEMPTS => {
                    warn!(engine = engine.name(), cause = cause.as_str(); "Layout engine crashed, retrying");
                    version = engine.version(true);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Reads `document` into the registry and moves the drawing to the
    /// canvas margin. Returns the canvas size.
    pub fn solve(&self, registry: &mut LayoutRegistry, document: &str) -> Result<Size, LayoutError> {
        solve::solve(registry, document, self.config.compatibility_mode())?;
        Ok(normalize(registry))
    }

    fn write_trace(&self, extension: &str, content: &str) {
        let Some(trace) = self.trace else {
            return;
        };
        let Some(directory) = trace.active_directory() else {
            return;
        };
        let path = directory.join(format!("{}.{extension}", trace.stem()));
        match write_file(&path, content) {
            Ok(()) => info!(path = path.display().to_string(); "Wrote layout trace"),
            Err(err) => warn!(path = path.display().to_string(), err:% = err; "Cannot write layout trace"),
        }
    }
}

fn write_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

fn max_dzeta(registry: &LayoutRegistry, dzeta: fn(&EdgeLine) -> f32) -> f32 {
    registry.edges().iter().map(dzeta).fold(0.0, f32::max)
}

/// Moves the drawing so its minimum corner sits at [`CANVAS_MARGIN`] and
/// returns the resulting canvas size.
pub fn normalize(registry: &mut LayoutRegistry) -> Size {
    let Some(bounds) = registry.bounds() else {
        return Size::new(2.0 * CANVAS_MARGIN, 2.0 * CANVAS_MARGIN);
    };
    let delta = Point::new(CANVAS_MARGIN - bounds.min_x(), CANVAS_MARGIN - bounds.min_y());
    registry.translate_all(delta);
    Size::new(
        bounds.width() + 2.0 * CANVAS_MARGIN,
        bounds.height() + 2.0 * CANVAS_MARGIN,
    )
}
