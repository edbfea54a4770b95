//! Strata - diagram layout through an external graph engine.
//!
//! Strata lays out hierarchical diagrams (entities, nested groups and typed
//! links) by describing them to Graphviz `dot` and reading the positions
//! back from its SVG output. Groups, labels and edges are tagged with unique
//! key colors so they can be recovered from a document that keeps no
//! structural identifiers for them.
//!
//! # Pipeline
//!
//! ```text
//! Diagram model
//!     ↓ structure (sametail reduction, empty-group muting)
//! Layout registry (shapes, edges, regions)
//!     ↓ request (dot text with adaptive spacing)
//! Layout engine
//!     ↓ solve (SVG response → positions)
//! LayoutOutcome
//!     ↓ export
//! SVG preview
//! ```

pub mod config;
pub mod engine;
pub mod export;
pub mod layout;
pub mod outcome;
pub mod pipeline;
pub mod structure;

mod error;

pub use strata_core::{color, geometry, identifier, model, text};

pub use error::{LayoutError, StrataError};

use log::info;

use config::AppConfig;
use engine::{DotExecutable, LayoutEngine};
use export::{Exporter, svg::SvgPreview};
use model::Diagram;
use outcome::LayoutOutcome;
use pipeline::DiagramPipeline;
use text::{FontBounder, StringBounder};

/// Builder for laying out and exporting diagrams.
///
/// # Examples
///
/// ```rust,no_run
/// use strata::{LayoutBuilder, config::AppConfig, model::*, geometry::Size};
///
/// let mut diagram = Diagram::new(DiagramKind::Class);
/// let root = diagram.root();
/// let image = EntityImage::new(Size::new(80.0, 40.0), ShapeType::Rectangle);
/// let a = diagram.add_leaf("A", LeafKind::Class, image, root).unwrap();
/// let b = diagram.add_leaf("B", LeafKind::Class, image, root).unwrap();
/// diagram.add_link(a, b).unwrap().set_head(LinkDecor::Extends);
///
/// let builder = LayoutBuilder::new(AppConfig::default());
/// let outcome = builder.layout(&diagram).expect("Failed to lay out");
/// let svg = builder.render_svg(&outcome);
/// ```
#[derive(Default)]
pub struct LayoutBuilder {
    config: AppConfig,
}

impl LayoutBuilder {
    /// Create a new layout builder with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Lay out `diagram` with the configured `dot` executable and measure
    /// labels with the configured font.
    ///
    /// # Errors
    ///
    /// Returns `StrataError` for configuration errors and fatal layout
    /// failures.
    pub fn layout(&self, diagram: &Diagram) -> Result<LayoutOutcome, StrataError> {
        let engine = DotExecutable::from_config(self.config.engine());
        let style = self.config.style();
        let bounder = FontBounder::new(style.font_family(), style.font_size());
        self.layout_with(diagram, &engine, &bounder)
    }

    /// Lay out `diagram` with an explicit engine and text measurer.
    ///
    /// # Errors
    ///
    /// Returns `StrataError` for configuration errors and fatal layout
    /// failures.
    pub fn layout_with(
        &self,
        diagram: &Diagram,
        engine: &dyn LayoutEngine,
        bounder: &dyn StringBounder,
    ) -> Result<LayoutOutcome, StrataError> {
        info!(engine = engine.name(); "Laying out diagram");
        DiagramPipeline::new(&self.config, engine, bounder).run(diagram)
    }

    /// Render an outcome to an SVG preview string.
    pub fn render_svg(&self, outcome: &LayoutOutcome) -> String {
        SvgPreview::new("")
            .with_background(self.config.style().background_color().ok().flatten())
            .render(outcome)
            .to_string()
    }

    /// Write an SVG preview of `outcome` to `path`.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Export` when the file cannot be written.
    pub fn export_svg(&self, outcome: &LayoutOutcome, path: &str) -> Result<(), StrataError> {
        let mut exporter = SvgPreview::new(path)
            .with_background(self.config.style().background_color().ok().flatten());
        exporter.export_outcome(outcome)?;
        info!(output_file = path; "SVG exported successfully");
        Ok(())
    }
}
