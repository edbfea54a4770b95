//! Reading the engine's SVG answer back into the placeholders.
//!
//! The response is never parsed as XML. Every placeholder is found by a
//! marker that only it can produce: shapes by their `<title>` element,
//! regions, labels and edges by their unique key color. Coordinates are read
//! from the attribute that follows the marker and moved from the engine's
//! y-up space into diagram space by adding the document height.

use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use strata_core::{
    color::KeyColor,
    geometry::{Bounds, Point},
    identifier::Id,
    model::ShapeType,
};

use crate::error::LayoutError;

use super::{cluster::Cluster, node::ShapeNode, registry::LayoutRegistry};

const POINTS_EQUALS: &str = "points=\"";
const D_EQUALS: &str = "d=\"";

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)<svg\s+width="(\d+)pt"\s+height="(\d+)pt""#)
            .expect("header regex should be valid")
    })
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?").expect("number regex should be valid")
    })
}

/// A validated engine response.
#[derive(Debug, Clone, Copy)]
pub struct SvgResponse<'a> {
    document: &'a str,
    width: f32,
    full_height: f32,
}

impl<'a> SvgResponse<'a> {
    /// Checks the document and reads its declared size.
    ///
    /// # Errors
    ///
    /// [`LayoutError::EmptyResponse`] for an empty document and
    /// [`LayoutError::MissingHeader`] when the `<svg width=".." height="..">`
    /// header is absent.
    pub fn parse(document: &'a str) -> Result<Self, LayoutError> {
        if document.is_empty() {
            return Err(LayoutError::EmptyResponse);
        }
        let captures = header_regex()
            .captures(document)
            .ok_or(LayoutError::MissingHeader)?;
        let dimension = |group: usize| -> Result<f32, LayoutError> {
            captures[group]
                .parse::<f32>()
                .map_err(|_| LayoutError::MissingHeader)
        };
        Ok(Self {
            document,
            width: dimension(1)?,
            full_height: dimension(2)?,
        })
    }

    pub fn document(&self) -> &'a str {
        self.document
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn full_height(&self) -> f32 {
        self.full_height
    }

    fn find_from(&self, needle: &str, from: usize) -> Option<usize> {
        self.document
            .get(from..)
            .and_then(|rest| rest.find(needle))
            .map(|idx| idx + from)
    }

    fn to_diagram(&self, x: f32, y: f32) -> Point {
        Point::new(x, y + self.full_height)
    }

    /// Offset of the `<title>` element naming `uid`.
    pub fn find_title(&self, uid: Id) -> Option<usize> {
        self.document.find(&format!("<title>{uid}</title>"))
    }

    /// Offset of the first use of `color`, either as an attribute value or
    /// inside a `style` declaration.
    pub fn find_color(&self, color: KeyColor) -> Option<usize> {
        let hex = color.hex();
        self.document
            .find(&format!("=\"{hex}\""))
            .or_else(|| self.document.find(&format!("stroke:{hex};")))
    }

    /// Like [`SvgResponse::find_color`], failing when the color is absent.
    pub fn locate_color(&self, color: KeyColor) -> Result<usize, LayoutError> {
        self.find_color(color)
            .ok_or_else(|| LayoutError::UnlocatableColor { color: color.hex() })
    }

    fn attribute_body(&self, marker: &str, from: usize) -> Result<&'a str, LayoutError> {
        let attribute = match marker {
            D_EQUALS => "d",
            _ => "points",
        };
        let malformed = || LayoutError::MalformedAttribute {
            attribute,
            offset: from,
        };
        let start = self.find_from(marker, from).ok_or_else(malformed)? + marker.len();
        let end = self.find_from("\"", start).ok_or_else(malformed)?;
        Ok(&self.document[start..end])
    }

    fn coordinate_pairs(&self, body: &str, attribute: &'static str, offset: usize) -> Result<Vec<Point>, LayoutError> {
        let numbers = number_regex()
            .find_iter(body)
            .map(|m| m.as_str().parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| LayoutError::MalformedAttribute { attribute, offset })?;
        if numbers.is_empty() || numbers.len() % 2 != 0 {
            return Err(LayoutError::MalformedAttribute { attribute, offset });
        }
        Ok(numbers
            .chunks_exact(2)
            .map(|pair| self.to_diagram(pair[0], pair[1]))
            .collect())
    }

    /// Points of the first `points` attribute at or after `from`.
    pub fn points_after(&self, from: usize) -> Result<Vec<Point>, LayoutError> {
        let body = self.attribute_body(POINTS_EQUALS, from)?;
        self.coordinate_pairs(body, "points", from)
    }

    /// Every coordinate pair of the first `d` attribute at or after `from`.
    pub fn path_after(&self, from: usize) -> Result<Vec<Point>, LayoutError> {
        let body = self.attribute_body(D_EQUALS, from)?;
        self.coordinate_pairs(body, "d", from)
    }

    /// Numeric value of the first `name="…"` attribute at or after `from`.
    pub fn value_after(&self, from: usize, name: &'static str) -> Result<f32, LayoutError> {
        let malformed = || LayoutError::MalformedAttribute {
            attribute: name,
            offset: from,
        };
        let marker = format!(" {name}=\"");
        let start = self.find_from(&marker, from).ok_or_else(malformed)? + marker.len();
        let end = self.find_from("\"", start).ok_or_else(malformed)?;
        self.document[start..end]
            .trim()
            .parse()
            .map_err(|_| malformed())
    }
}

/// How the engine drew a rounded rectangle.
///
/// Newer engines emit a single `path`; older ones emit four polygons, one per
/// side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineEncoding {
    Path(usize),
    Polygons(usize),
}

impl OutlineEncoding {
    /// Picks whichever outline attribute follows the shape's title first.
    pub fn detect(response: &SvgResponse<'_>, title: usize) -> Result<Self, LayoutError> {
        let path = response.find_from(D_EQUALS, title + 1);
        let polygon = response.find_from(POINTS_EQUALS, title + 1);
        match (path, polygon) {
            (Some(path), None) => Ok(Self::Path(path)),
            (Some(path), Some(polygon)) if path < polygon => Ok(Self::Path(path)),
            (_, Some(polygon)) => Ok(Self::Polygons(polygon)),
            (None, None) => Err(LayoutError::MalformedAttribute {
                attribute: "points",
                offset: title,
            }),
        }
    }

    pub fn read(self, response: &SvgResponse<'_>) -> Result<Vec<Point>, LayoutError> {
        match self {
            Self::Path(idx) => response.path_after(idx),
            Self::Polygons(idx) => {
                let mut points = response.points_after(idx)?;
                let mut cursor = idx;
                for _ in 0..3 {
                    cursor = response
                        .find_from(POINTS_EQUALS, cursor + 1)
                        .ok_or(LayoutError::MalformedAttribute {
                            attribute: "points",
                            offset: cursor,
                        })?;
                    points.extend(response.points_after(cursor)?);
                }
                Ok(points)
            }
        }
    }
}

fn min_corner(points: &[Point], offset: usize) -> Result<Point, LayoutError> {
    Bounds::from_points(points)
        .map(|b| b.min_point())
        .ok_or(LayoutError::MalformedAttribute {
            attribute: "points",
            offset,
        })
}

/// Positions one shape from the response.
pub fn read_shape(response: &SvgResponse<'_>, node: &mut ShapeNode) -> Result<(), LayoutError> {
    let unrecognized = |node: &ShapeNode| LayoutError::UnrecognizedShape {
        shape: node.shape(),
        entity: node.uid().to_string(),
    };
    if node.shape() == ShapeType::Port {
        return Err(unrecognized(node));
    }
    let idx = response
        .find_title(node.uid())
        .ok_or_else(|| LayoutError::MissingShape {
            uid: node.uid().to_string(),
        })?;

    match node.shape() {
        ShapeType::Rectangle
        | ShapeType::RectangleHtmlForPorts
        | ShapeType::RectangleWithCircleInside
        | ShapeType::RectanglePort
        | ShapeType::Folder
        | ShapeType::Diamond => {
            let points = response.points_after(idx)?;
            node.set_position(min_corner(&points, idx)?);
        }
        ShapeType::RoundRectangle => {
            let encoding = OutlineEncoding::detect(response, idx)?;
            debug!(uid = node.uid().to_string(), encoding:? = encoding; "Reading rounded outline");
            let points = encoding.read(response)?;
            node.set_position(min_corner(&points, idx)?);
        }
        ShapeType::Octagon | ShapeType::Hexagon => {
            let start = response.find_from(POINTS_EQUALS, idx + 1).ok_or(
                LayoutError::MalformedAttribute {
                    attribute: "points",
                    offset: idx,
                },
            )?;
            let points = response.points_after(start)?;
            let min = min_corner(&points, start)?;
            node.set_position(min);
            node.set_outline(min, &points);
        }
        ShapeType::Circle | ShapeType::Oval => {
            let cx = response.value_after(idx, "cx")?;
            let cy = response.value_after(idx, "cy")?;
            let rx = response.value_after(idx, "rx")?;
            let ry = response.value_after(idx, "ry")?;
            let center = response.to_diagram(cx, cy);
            node.set_position(Point::new(center.x() - rx, center.y() - ry));
        }
        ShapeType::Port => return Err(unrecognized(node)),
    }
    Ok(())
}

/// Positions one region, its title and, in compatibility mode, its notes.
pub fn read_cluster(
    response: &SvgResponse<'_>,
    cluster: &mut Cluster,
    compatibility: bool,
) -> Result<(), LayoutError> {
    let idx = response.locate_color(cluster.color())?;
    let points = response.points_after(idx)?;
    let bounds = Bounds::from_points(&points).ok_or(LayoutError::MalformedAttribute {
        attribute: "points",
        offset: idx,
    })?;
    cluster.set_bounds(bounds);

    if !cluster.header().has_title() {
        return Ok(());
    }
    let idx = response.locate_color(cluster.title_color())?;
    cluster.set_title_position(min_corner(&response.points_after(idx)?, idx)?);

    if compatibility {
        if cluster.notes().top.is_some() {
            let idx = response.locate_color(cluster.note_top_color())?;
            cluster.set_note_top_position(min_corner(&response.points_after(idx)?, idx)?);
        }
        if cluster.notes().bottom.is_some() {
            let idx = response.locate_color(cluster.note_bottom_color())?;
            cluster.set_note_bottom_position(min_corner(&response.points_after(idx)?, idx)?);
        }
    }
    Ok(())
}

/// Writes the response into every placeholder of `registry`: shapes,
/// regions (packed ones excepted), edges, then the label collision pass.
pub fn solve(
    registry: &mut LayoutRegistry,
    document: &str,
    compatibility: bool,
) -> Result<(), LayoutError> {
    let response = SvgResponse::parse(document)?;
    debug!(
        width = response.width(),
        height = response.full_height();
        "Solving layout response"
    );

    for node in registry.nodes_mut() {
        read_shape(&response, node)?;
    }

    for cluster in registry.tree_mut().regions_mut() {
        if cluster.is_packed() {
            continue;
        }
        read_cluster(&response, cluster, compatibility)?;
    }

    let mut unresolved = 0;
    for edge in registry.edges_mut() {
        if !edge.resolve(&response)? {
            unresolved += 1;
        }
    }
    if unresolved > 0 {
        debug!(unresolved = unresolved; "Edges without a route in the response");
    }

    let shapes: Vec<Bounds> = registry
        .nodes()
        .values()
        .filter_map(ShapeNode::bounds)
        .collect();
    for edge in registry.edges_mut() {
        edge.avoid_collisions(shapes.iter().copied());
    }
    Ok(())
}
