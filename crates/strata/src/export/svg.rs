//! SVG preview of a layout outcome.
//!
//! The preview draws exactly what the layout produced: region borders, shape
//! outlines by shape family, routed edges and label boxes. It is meant for
//! inspecting a layout, not as a finished rendering.

use std::{fs::File, io::Write};

use log::{debug, error, info};
use svg::{
    Document,
    node::element::{Ellipse, Group, Path, Polygon, Rectangle, Text, path::Data},
};

use strata_core::{
    color::Color,
    geometry::{Bounds, Point},
    model::ShapeType,
};

use crate::{
    export,
    outcome::{LayoutOutcome, PositionedCluster, PositionedDiagram, PositionedEdge, PositionedNode},
};

const FONT_FAMILY: &str = "sans-serif";
const FONT_SIZE: u16 = 12;
const LINE_HEIGHT: f32 = 16.0;
const ROUNDING: f32 = 6.0;

/// Writes an SVG preview of an outcome to a file.
pub struct SvgPreview {
    file_name: String,
    background: Option<Color>,
}

impl SvgPreview {
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            background: None,
        }
    }

    /// Fills the canvas with `background` unless the outcome carries its own.
    pub fn with_background(mut self, background: Option<Color>) -> Self {
        self.background = background;
        self
    }

    /// Renders `outcome` into a document.
    pub fn render(&self, outcome: &LayoutOutcome) -> Document {
        let canvas = outcome.canvas();
        let doc = Document::new()
            .set(
                "viewBox",
                format!("0 0 {} {}", canvas.width(), canvas.height()),
            )
            .set("width", canvas.width())
            .set("height", canvas.height());

        let background = match outcome {
            LayoutOutcome::Single { background, .. } => background.as_ref(),
            LayoutOutcome::Positioned(diagram) => diagram.background(),
            _ => None,
        }
        .or(self.background.as_ref());
        let doc = match background {
            Some(color) => doc.add(
                Rectangle::new()
                    .set("width", "100%")
                    .set("height", "100%")
                    .set("fill", color),
            ),
            None => doc,
        };

        match outcome {
            LayoutOutcome::Empty { .. } => doc,
            LayoutOutcome::Single { image, .. } => doc.add(
                Rectangle::new()
                    .set("x", 0)
                    .set("y", 0)
                    .set("width", image.size().width())
                    .set("height", image.size().height())
                    .set("fill", "none")
                    .set("stroke", "black"),
            ),
            LayoutOutcome::MissingEngine { lines } => {
                doc.add(render_lines(lines.iter().map(String::as_str)))
            }
            LayoutOutcome::Crash { source, cause } => doc.add(render_lines(
                ["An error has occurred:", cause.as_str(), ""]
                    .into_iter()
                    .chain(source.lines()),
            )),
            LayoutOutcome::Positioned(diagram) => doc.add(render_diagram(diagram)),
        }
    }

    /// Writes an SVG document to the configured file.
    pub fn write_document(&self, doc: Document) -> Result<(), export::Error> {
        info!(file_name = self.file_name; "Creating SVG file");
        let f = match File::create(&self.file_name) {
            Ok(file) => file,
            Err(err) => {
                error!(file_name = self.file_name, err:err; "Failed to create SVG file");
                return Err(export::Error::Io(err));
            }
        };

        if let Err(err) = write!(&f, "{doc}") {
            error!(file_name = self.file_name, err:err; "Failed to write SVG content");
            return Err(export::Error::Io(err));
        }

        Ok(())
    }
}

impl export::Exporter for SvgPreview {
    fn export_outcome(&mut self, outcome: &LayoutOutcome) -> Result<(), export::Error> {
        let doc = self.render(outcome);
        debug!("SVG document rendered");

        self.write_document(doc)
    }
}

fn text(content: &str, x: f32, y: f32) -> Text {
    Text::new(content)
        .set("x", x)
        .set("y", y)
        .set("font-family", FONT_FAMILY)
        .set("font-size", FONT_SIZE)
}

fn render_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Group {
    lines
        .enumerate()
        .fold(Group::new(), |group, (idx, line)| {
            group.add(text(line, 10.0, 10.0 + LINE_HEIGHT * (idx as f32 + 1.0)))
        })
}

fn render_diagram(diagram: &PositionedDiagram) -> Group {
    let mut group = Group::new();
    for cluster in diagram.clusters() {
        if let Some(element) = render_cluster(cluster) {
            group = group.add(element);
        }
    }
    for node in diagram.nodes() {
        group = group.add(render_node(node));
    }
    for edge in diagram.edges() {
        group = group.add(render_edge(edge));
    }
    group
}

fn render_cluster(cluster: &PositionedCluster) -> Option<Group> {
    let bounds = cluster.bounds()?;
    let mut group = Group::new().set("id", cluster.uid().to_string()).add(
        rectangle(bounds)
            .set("fill", "none")
            .set("stroke", "black"),
    );
    if let Some(title) = cluster.title() {
        let center = title.center();
        group = group.add(
            text(cluster.name(), center.x(), center.y())
                .set("text-anchor", "middle")
                .set("dominant-baseline", "middle"),
        );
    }
    Some(group)
}

fn rectangle(bounds: Bounds) -> Rectangle {
    Rectangle::new()
        .set("x", bounds.min_x())
        .set("y", bounds.min_y())
        .set("width", bounds.width())
        .set("height", bounds.height())
}

fn points_attribute(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.x(), p.y()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_node(node: &PositionedNode) -> Group {
    let bounds = node.bounds();
    let group = Group::new().set("id", node.uid().to_string());
    let group = match node.shape() {
        ShapeType::RoundRectangle => group.add(
            rectangle(bounds)
                .set("rx", ROUNDING)
                .set("fill", "none")
                .set("stroke", "black"),
        ),
        ShapeType::Octagon | ShapeType::Hexagon => {
            let outline = node.outline().unwrap_or_else(|| {
                vec![
                    bounds.min_point(),
                    Point::new(bounds.max_x(), bounds.min_y()),
                    bounds.max_point(),
                    Point::new(bounds.min_x(), bounds.max_y()),
                ]
            });
            group.add(
                Polygon::new()
                    .set("points", points_attribute(&outline))
                    .set("fill", "none")
                    .set("stroke", "black"),
            )
        }
        ShapeType::Circle | ShapeType::Oval => {
            let center = bounds.center();
            group.add(
                Ellipse::new()
                    .set("cx", center.x())
                    .set("cy", center.y())
                    .set("rx", bounds.width() / 2.0)
                    .set("ry", bounds.height() / 2.0)
                    .set("fill", "none")
                    .set("stroke", "black"),
            )
        }
        ShapeType::Diamond => {
            let center = bounds.center();
            let diamond = [
                Point::new(center.x(), bounds.min_y()),
                Point::new(bounds.max_x(), center.y()),
                Point::new(center.x(), bounds.max_y()),
                Point::new(bounds.min_x(), center.y()),
            ];
            group.add(
                Polygon::new()
                    .set("points", points_attribute(&diamond))
                    .set("fill", "none")
                    .set("stroke", "black"),
            )
        }
        ShapeType::Rectangle
        | ShapeType::RectangleHtmlForPorts
        | ShapeType::RectangleWithCircleInside
        | ShapeType::RectanglePort
        | ShapeType::Folder
        | ShapeType::Port => group.add(
            rectangle(bounds)
                .set("fill", "none")
                .set("stroke", "black"),
        ),
    };

    let center = bounds.center();
    group.add(
        text(node.name(), center.x(), center.y())
            .set("text-anchor", "middle")
            .set("dominant-baseline", "middle"),
    )
}

/// Path data for an engine route: cubic segments when the point count
/// allows it, a polyline otherwise.
fn route_data(points: &[Point]) -> Data {
    let Some((first, rest)) = points.split_first() else {
        return Data::new();
    };
    let data = Data::new().move_to((first.x(), first.y()));
    if !rest.is_empty() && rest.len() % 3 == 0 {
        rest.chunks_exact(3).fold(data, |data, c| {
            data.cubic_curve_to((c[0].x(), c[0].y(), c[1].x(), c[1].y(), c[2].x(), c[2].y()))
        })
    } else {
        rest.iter()
            .fold(data, |data, p| data.line_to((p.x(), p.y())))
    }
}

fn render_edge(edge: &PositionedEdge) -> Group {
    let mut group = Group::new().set("id", edge.uid().to_string());
    if let Some(points) = edge.path() {
        let mut path = Path::new()
            .set("d", route_data(points))
            .set("fill", "none")
            .set("stroke", "black");
        if edge.is_opale() {
            path = path.set("stroke-dasharray", "4 2");
        }
        group = group.add(path);
    }
    for label in edge.labels() {
        let Some(bounds) = label.bounds() else {
            continue;
        };
        group = group.add(text(
            label.text(),
            bounds.min_x(),
            bounds.min_y() + bounds.height().min(LINE_HEIGHT),
        ));
    }
    group
}
