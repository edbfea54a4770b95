//! Shape placeholders.

use std::fmt::Write;

use strata_core::{
    geometry::{Bounds, Point, Size},
    identifier::Id,
    model::{EntityId, LeafKind, LinkId, ShapeType},
};

use super::pixels_to_inches;

/// A note visually merged with the single link it is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpaleWiring {
    /// The absorbed link.
    pub link: LinkId,
    /// The shape at the other end of the link.
    pub other: Id,
}

/// Layout-time stand-in for one entity.
#[derive(Debug, Clone)]
pub struct ShapeNode {
    entity: EntityId,
    uid: Id,
    kind: LeafKind,
    shape: ShapeType,
    size: Size,
    position: Option<Point>,
    outline: Option<Vec<Point>>,
    opale: Option<OpaleWiring>,
}

impl ShapeNode {
    pub fn new(entity: EntityId, uid: Id, kind: LeafKind, shape: ShapeType, size: Size) -> Self {
        Self {
            entity,
            uid,
            kind,
            shape,
            size,
            position: None,
            outline: None,
            opale: None,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn uid(&self) -> Id {
        self.uid
    }

    pub fn kind(&self) -> LeafKind {
        self.kind
    }

    pub fn shape(&self) -> ShapeType {
        self.shape
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Top-left corner, once solved.
    pub fn position(&self) -> Option<Point> {
        self.position
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.position
            .map(|position| Bounds::new_from_top_left(position, self.size))
    }

    /// Outline polygon relative to [`ShapeNode::position`], for octagons and hexagons.
    pub fn outline(&self) -> Option<&[Point]> {
        self.outline.as_deref()
    }

    pub fn opale(&self) -> Option<OpaleWiring> {
        self.opale
    }

    pub fn set_width(&mut self, width: f32) {
        self.size = self.size.with_width(width);
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = Some(position);
    }

    /// Records the outline polygon, stored relative to `min`.
    pub fn set_outline(&mut self, min: Point, points: &[Point]) {
        self.outline = Some(points.iter().map(|p| p.sub_point(min)).collect());
    }

    pub fn attach_opale(&mut self, wiring: OpaleWiring) {
        self.opale = Some(wiring);
    }

    pub fn translate(&mut self, delta: Point) {
        if let Some(position) = self.position.as_mut() {
            *position = position.add_point(delta);
        }
    }

    fn shape_attributes(&self) -> &'static str {
        match self.shape {
            ShapeType::Rectangle
            | ShapeType::RectangleHtmlForPorts
            | ShapeType::RectangleWithCircleInside
            | ShapeType::RectanglePort
            | ShapeType::Port => "shape=rect",
            ShapeType::RoundRectangle => "shape=rect,style=rounded",
            ShapeType::Octagon => "shape=octagon",
            ShapeType::Hexagon => "shape=hexagon",
            ShapeType::Circle => "shape=circle",
            ShapeType::Oval => "shape=ellipse",
            ShapeType::Diamond => "shape=diamond",
            ShapeType::Folder => "shape=folder",
        }
    }

    /// Appends the node statement to a layout request.
    ///
    /// ```
    /// # use strata::layout::node::ShapeNode;
    /// # use strata_core::{geometry::Size, identifier::Id, model::*};
    /// # let mut diagram = Diagram::new(DiagramKind::Class);
    /// # let root = diagram.root();
    /// # let image = EntityImage::new(Size::new(72.0, 36.0), ShapeType::Rectangle);
    /// # let entity = diagram.add_leaf("A", LeafKind::Class, image, root).unwrap();
    /// let node = ShapeNode::new(entity, Id::new("ent0001"), LeafKind::Class, ShapeType::Rectangle, Size::new(72.0, 36.0));
    /// let mut request = String::new();
    /// node.append_request(&mut request);
    /// assert_eq!(request, "ent0001 [shape=rect,label=\"\",width=1.0000,height=0.5000,fixedsize=true];\n");
    /// ```
    pub fn append_request(&self, out: &mut String) {
        let _ = writeln!(
            out,
            "{} [{},label=\"\",width={},height={},fixedsize=true];",
            self.uid,
            self.shape_attributes(),
            pixels_to_inches(self.size.width()),
            pixels_to_inches(self.size.height())
        );
    }
}
