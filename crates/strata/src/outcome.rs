//! What a layout pass hands back to the caller.

use indexmap::IndexMap;

use strata_core::{
    color::Color,
    geometry::{Bounds, Point, Size},
    identifier::Id,
    model::{EntityId, EntityImage, LeafKind, LinkId, ShapeType},
};

use crate::{
    layout::{
        edge::{EdgeLine, LabelKind},
        node::{OpaleWiring, ShapeNode},
        registry::LayoutRegistry,
    },
    structure::FanInGroup,
};

/// Result of laying out one diagram.
#[derive(Debug, Clone)]
pub enum LayoutOutcome {
    /// The diagram had nothing to lay out.
    Empty { size: Size },
    /// A lone entity, drawn directly without consulting the engine.
    Single {
        entity: EntityId,
        image: EntityImage,
        background: Option<Color>,
    },
    /// No usable engine executable. `lines` explain what was checked.
    MissingEngine { lines: Vec<String> },
    /// The engine could not be driven or returned nothing.
    Crash { source: String, cause: String },
    Positioned(PositionedDiagram),
}

impl LayoutOutcome {
    /// Size of the canvas needed to draw this outcome.
    pub fn canvas(&self) -> Size {
        match self {
            Self::Empty { size } => *size,
            Self::Single { image, .. } => image.size(),
            Self::MissingEngine { lines } => text_block_size(lines.iter().map(String::as_str)),
            Self::Crash { source, cause } => {
                text_block_size(std::iter::once(cause.as_str()).chain(source.lines()))
            }
            Self::Positioned(diagram) => diagram.canvas(),
        }
    }

    pub fn positioned(&self) -> Option<&PositionedDiagram> {
        match self {
            Self::Positioned(diagram) => Some(diagram),
            _ => None,
        }
    }
}

const TEXT_ADVANCE: f32 = 7.0;
const TEXT_LINE: f32 = 16.0;

fn text_block_size<'a>(lines: impl Iterator<Item = &'a str>) -> Size {
    let (count, widest) = lines.fold((0usize, 0usize), |(count, widest), line| {
        (count + 1, widest.max(line.chars().count()))
    });
    Size::new(
        widest as f32 * TEXT_ADVANCE + 20.0,
        count as f32 * TEXT_LINE + 20.0,
    )
}

/// A placed shape.
#[derive(Debug, Clone)]
pub struct PositionedNode {
    entity: EntityId,
    uid: Id,
    name: String,
    kind: LeafKind,
    shape: ShapeType,
    bounds: Bounds,
    outline: Option<Vec<Point>>,
    opale: Option<OpaleWiring>,
}

impl PositionedNode {
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn uid(&self) -> Id {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LeafKind {
        self.kind
    }

    pub fn shape(&self) -> ShapeType {
        self.shape
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Polygon outline in absolute coordinates, for octagons and hexagons.
    pub fn outline(&self) -> Option<Vec<Point>> {
        let origin = self.bounds.min_point();
        self.outline
            .as_ref()
            .map(|points| points.iter().map(|p| p.add_point(origin)).collect())
    }

    /// Set when this note is visually merged with its single link.
    pub fn opale(&self) -> Option<OpaleWiring> {
        self.opale
    }
}

/// A placed edge label.
#[derive(Debug, Clone)]
pub struct PositionedLabel {
    kind: LabelKind,
    text: String,
    bounds: Option<Bounds>,
}

impl PositionedLabel {
    pub fn kind(&self) -> LabelKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// `None` when the engine did not draw the label.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }
}

/// A routed edge.
#[derive(Debug, Clone)]
pub struct PositionedEdge {
    link: LinkId,
    uid: Id,
    source: Id,
    target: Id,
    path: Option<Vec<Point>>,
    labels: Vec<PositionedLabel>,
    opale: bool,
}

impl PositionedEdge {
    pub fn link(&self) -> LinkId {
        self.link
    }

    pub fn uid(&self) -> Id {
        self.uid
    }

    /// Node name of the source end: a shape uid or a region anchor.
    pub fn source(&self) -> Id {
        self.source
    }

    pub fn target(&self) -> Id {
        self.target
    }

    /// Route points as emitted by the engine: a start point followed by
    /// cubic segments of three points each. `None` for unrouted edges.
    pub fn path(&self) -> Option<&[Point]> {
        self.path.as_deref()
    }

    pub fn labels(&self) -> &[PositionedLabel] {
        &self.labels
    }

    pub fn is_opale(&self) -> bool {
        self.opale
    }
}

/// A placed region.
#[derive(Debug, Clone)]
pub struct PositionedCluster {
    group: EntityId,
    uid: Id,
    name: String,
    parent: Option<Id>,
    bounds: Option<Bounds>,
    title: Option<Bounds>,
    note_top: Option<Point>,
    note_bottom: Option<Point>,
}

impl PositionedCluster {
    pub fn group(&self) -> EntityId {
        self.group
    }

    pub fn uid(&self) -> Id {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uid of the enclosing region, `None` at top level.
    pub fn parent(&self) -> Option<Id> {
        self.parent
    }

    /// `None` for packed regions, which are not drawn.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn title(&self) -> Option<Bounds> {
        self.title
    }

    pub fn note_top(&self) -> Option<Point> {
        self.note_top
    }

    pub fn note_bottom(&self) -> Option<Point> {
        self.note_bottom
    }
}

/// A fully laid-out diagram.
#[derive(Debug, Clone)]
pub struct PositionedDiagram {
    nodes: Vec<PositionedNode>,
    edges: Vec<PositionedEdge>,
    clusters: Vec<PositionedCluster>,
    fan_ins: Vec<FanInGroup>,
    canvas: Size,
    background: Option<Color>,
    engine_version: Option<String>,
    attempts: usize,
    max_x: IndexMap<String, f32>,
}

impl PositionedDiagram {
    /// Collects the solved placeholders of `registry`.
    ///
    /// Shapes the engine did not place are left out.
    pub(crate) fn from_registry(
        registry: &LayoutRegistry,
        names: impl Fn(EntityId) -> String,
        fan_ins: Vec<FanInGroup>,
        canvas: Size,
    ) -> Self {
        let nodes = registry
            .nodes()
            .values()
            .filter_map(|node| positioned_node(node, &names))
            .collect();
        let edges = registry.edges().iter().map(positioned_edge).collect();
        let tree = registry.tree();
        let clusters = tree
            .regions()
            .map(|cluster| PositionedCluster {
                group: cluster.group(),
                uid: cluster.uid(),
                name: cluster.name().to_string(),
                parent: cluster
                    .parent()
                    .filter(|parent| *parent != tree.root())
                    .map(|parent| tree.cluster(parent).uid()),
                bounds: cluster.bounds(),
                title: cluster
                    .title_position()
                    .map(|p| Bounds::new_from_top_left(p, cluster.header().title())),
                note_top: cluster.note_top_position(),
                note_bottom: cluster.note_bottom_position(),
            })
            .collect();

        Self {
            nodes,
            edges,
            clusters,
            fan_ins,
            canvas,
            background: None,
            engine_version: None,
            attempts: 1,
            max_x: registry.max_x(),
        }
    }

    pub(crate) fn with_background(mut self, background: Option<Color>) -> Self {
        self.background = background;
        self
    }

    pub(crate) fn with_engine(mut self, version: Option<String>, attempts: usize) -> Self {
        self.engine_version = version;
        self.attempts = attempts;
        self
    }

    pub fn nodes(&self) -> &[PositionedNode] {
        &self.nodes
    }

    pub fn node(&self, uid: Id) -> Option<&PositionedNode> {
        self.nodes.iter().find(|node| node.uid == uid)
    }

    pub fn edges(&self) -> &[PositionedEdge] {
        &self.edges
    }

    pub fn clusters(&self) -> &[PositionedCluster] {
        &self.clusters
    }

    pub fn cluster(&self, uid: Id) -> Option<&PositionedCluster> {
        self.clusters.iter().find(|cluster| cluster.uid == uid)
    }

    pub fn fan_ins(&self) -> &[FanInGroup] {
        &self.fan_ins
    }

    pub fn canvas(&self) -> Size {
        self.canvas
    }

    pub fn background(&self) -> Option<&Color> {
        self.background.as_ref()
    }

    /// Version string reported in the engine response comment.
    pub fn engine_version(&self) -> Option<&str> {
        self.engine_version.as_deref()
    }

    /// Number of engine submissions the layout took.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// One line per region whose right edge lies beyond `limit`.
    ///
    /// ```
    /// # use strata::outcome::PositionedDiagram;
    /// fn report(diagram: &PositionedDiagram) -> String {
    ///     diagram.width_warnings(800.0).concat()
    /// }
    /// ```
    pub fn width_warnings(&self, limit: f32) -> Vec<String> {
        self.max_x
            .iter()
            .filter(|(_, max_x)| **max_x > limit)
            .map(|(name, _)| format!("{name} is overpassing the width limit.\n"))
            .collect()
    }
}

fn positioned_node(node: &ShapeNode, names: &impl Fn(EntityId) -> String) -> Option<PositionedNode> {
    Some(PositionedNode {
        entity: node.entity(),
        uid: node.uid(),
        name: names(node.entity()),
        kind: node.kind(),
        shape: node.shape(),
        bounds: node.bounds()?,
        outline: node.outline().map(<[Point]>::to_vec),
        opale: node.opale(),
    })
}

fn positioned_edge(edge: &EdgeLine) -> PositionedEdge {
    PositionedEdge {
        link: edge.link(),
        uid: edge.uid(),
        source: edge.source().node,
        target: edge.target().node,
        path: edge.path().map(<[Point]>::to_vec),
        labels: edge
            .labels()
            .iter()
            .map(|label| PositionedLabel {
                kind: label.kind(),
                text: label.text().to_string(),
                bounds: label.bounds(),
            })
            .collect(),
        opale: edge.is_opale(),
    }
}
