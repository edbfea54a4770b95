//! CLI logic for the Strata layout tool.
//!
//! This module reads a diagram description, lays it out through Graphviz and
//! writes the SVG preview.

pub mod error_adapter;

mod args;
mod config;
mod input;

pub use args::Args;

use std::{fs, path::Path};

use log::{info, warn};

use strata::{LayoutBuilder, StrataError, outcome::LayoutOutcome};

/// Run the Strata CLI application
///
/// # Errors
///
/// Returns `StrataError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Invalid diagram descriptions
/// - Fatal layout errors
/// - Export errors
pub fn run(args: &Args) -> Result<(), StrataError> {
    info!(
        input_path = args.input,
        output_path = args.output;
        "Processing diagram"
    );

    let mut app_config = config::load_config(args.config.as_ref())?;

    if let Some(trace_dir) = &args.trace_dir {
        let trace = app_config.trace_mut();
        trace.set_directory(Some(trace_dir.into()));
        if let Some(stem) = Path::new(&args.input).file_stem() {
            trace.set_stem(stem.to_string_lossy());
        }
    }

    let source = fs::read_to_string(&args.input)?;
    let diagram = input::parse_diagram(&source)?;

    let builder = LayoutBuilder::new(app_config);
    let outcome = builder.layout(&diagram)?;

    match &outcome {
        LayoutOutcome::MissingEngine { lines } => {
            warn!(details = lines.join(" | "); "Graphviz is not available, writing diagnostic");
        }
        LayoutOutcome::Crash { cause, .. } => {
            warn!(cause = cause.as_str(); "Layout engine crashed, writing diagnostic");
        }
        _ => {}
    }

    builder.export_svg(&outcome, &args.output)?;

    Ok(())
}
