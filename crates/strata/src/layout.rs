//! Layout placeholders, the request builder and the response solver.
//!
//! A layout pass populates a [`registry::LayoutRegistry`] with one
//! [`node::ShapeNode`] per entity, one [`edge::EdgeLine`] per link and one
//! [`cluster::Cluster`] per group, serializes it with
//! [`request::LayoutRequestBuilder`], and writes the engine's answer back
//! into the same placeholders through [`solve`].

pub mod cluster;
pub mod edge;
pub mod node;
pub mod registry;
pub mod request;
pub mod solve;

/// Formats a pixel length in the engine's unit (inches at 72 per inch).
///
/// ```
/// # use strata::layout::pixels_to_inches;
/// assert_eq!(pixels_to_inches(36.0), "0.5000");
/// ```
pub fn pixels_to_inches(pixels: f32) -> String {
    format!("{:.4}", pixels / 72.0)
}

/// Renders a fixed-size HTML table cell whose background carries `color`.
///
/// Such a cell is drawn by the engine as a polygon filled with exactly that
/// color, which is how labels and titles are found again in the response.
pub(crate) fn keyed_cell(color: strata_core::color::KeyColor, width: f32, height: f32) -> String {
    format!(
        "<TD BGCOLOR=\"{}\" FIXEDSIZE=\"TRUE\" WIDTH=\"{}\" HEIGHT=\"{}\"></TD>",
        color.hex(),
        width.ceil().max(1.0) as u32,
        height.ceil().max(1.0) as u32
    )
}

/// Wraps rows of cells into a borderless HTML-like label.
pub(crate) fn keyed_table<I: IntoIterator<Item = String>>(cells: I) -> String {
    let mut table = String::from(
        "<<TABLE BORDER=\"0\" CELLBORDER=\"0\" CELLSPACING=\"0\" CELLPADDING=\"0\">",
    );
    for cell in cells {
        table.push_str("<TR>");
        table.push_str(&cell);
        table.push_str("</TR>");
    }
    table.push_str("</TABLE>>");
    table
}

#[cfg(test)]
mod tests {
    use strata_core::color::KeyColor;

    use super::*;

    #[test]
    fn test_pixels_to_inches() {
        assert_eq!(pixels_to_inches(0.0), "0.0000");
        assert_eq!(pixels_to_inches(72.0), "1.0000");
        assert_eq!(pixels_to_inches(35.0), "0.4861");
    }

    #[test]
    fn test_keyed_table() {
        let cell = keyed_cell(KeyColor::from_rgb(0xff), 10.2, 0.0);
        assert_eq!(
            cell,
            "<TD BGCOLOR=\"#0000ff\" FIXEDSIZE=\"TRUE\" WIDTH=\"11\" HEIGHT=\"1\"></TD>"
        );
        let table = keyed_table([cell]);
        assert!(table.starts_with("<<TABLE"));
        assert!(table.ends_with("</TR></TABLE>>"));
    }
}
