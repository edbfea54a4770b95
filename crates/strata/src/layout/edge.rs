//! Edge placeholders.
//!
//! Every link becomes an [`EdgeLine`] tagged with a unique line color. Its
//! labels are sent as fixed-size boxes, each with its own color, so both the
//! routed path and the label positions can be recovered from the response.

use std::fmt::Write;

use strata_core::{
    color::{ColorSequence, KeyColor},
    geometry::{Bounds, Point, Size},
    identifier::Id,
    model::{Link, LinkDecor, LinkId},
    text::StringBounder,
};

use crate::{config::Splines, error::LayoutError};

use super::{keyed_cell, keyed_table, solve::SvgResponse};

/// Margin added around shapes when checking label collisions.
const COLLISION_MARGIN: f32 = 8.0;

/// Where a label sits along its link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Center,
    Head,
    Tail,
}

/// A label box of an edge.
#[derive(Debug, Clone)]
pub struct LabelBox {
    kind: LabelKind,
    text: String,
    color: KeyColor,
    size: Size,
    position: Option<Point>,
}

impl LabelBox {
    pub fn kind(&self) -> LabelKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn color(&self) -> KeyColor {
        self.color
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn position(&self) -> Option<Point> {
        self.position
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.position
            .map(|position| Bounds::new_from_top_left(position, self.size))
    }
}

/// One end of an edge in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// Node name the edge attaches to.
    pub node: Id,
    /// Region the edge is clipped at, when the endpoint is a group.
    pub cluster: Option<Id>,
}

impl Endpoint {
    pub fn shape(node: Id) -> Self {
        Self {
            node,
            cluster: None,
        }
    }

    pub fn region(anchor: Id, cluster: Id) -> Self {
        Self {
            node: anchor,
            cluster: Some(cluster),
        }
    }
}

/// Layout-time stand-in for one link.
#[derive(Debug, Clone)]
pub struct EdgeLine {
    link: LinkId,
    uid: Id,
    source: Endpoint,
    target: Endpoint,
    head: LinkDecor,
    tail: LinkDecor,
    length: u32,
    invisible: bool,
    self_link: bool,
    sametail: Option<Id>,
    color: KeyColor,
    labels: Vec<LabelBox>,
    path: Option<Vec<Point>>,
    opale: bool,
}

impl EdgeLine {
    /// Builds the placeholder for `link`, measuring its labels with `bounder`.
    pub fn new<B: StringBounder + ?Sized>(
        link: &Link,
        source: Endpoint,
        target: Endpoint,
        sametail: Option<Id>,
        colors: &mut ColorSequence,
        bounder: &B,
    ) -> Self {
        let color = colors.next_color();
        let labels = [
            (LabelKind::Center, link.label()),
            (LabelKind::Head, link.head_label()),
            (LabelKind::Tail, link.tail_label()),
        ]
        .into_iter()
        .filter_map(|(kind, text)| text.map(|text| (kind, text)))
        .map(|(kind, text)| LabelBox {
            kind,
            text: text.to_string(),
            color: colors.next_color(),
            size: bounder.measure(text),
            position: None,
        })
        .collect();

        Self {
            link: link.id(),
            uid: link.uid(),
            source,
            target,
            head: link.head(),
            tail: link.tail(),
            length: link.length(),
            invisible: link.is_invisible(),
            self_link: link.is_self_link(),
            sametail,
            color,
            labels,
            path: None,
            opale: false,
        }
    }

    pub fn link(&self) -> LinkId {
        self.link
    }

    pub fn uid(&self) -> Id {
        self.uid
    }

    pub fn source(&self) -> Endpoint {
        self.source
    }

    pub fn target(&self) -> Endpoint {
        self.target
    }

    pub fn color(&self) -> KeyColor {
        self.color
    }

    pub fn labels(&self) -> &[LabelBox] {
        &self.labels
    }

    /// Resolved route, in diagram coordinates. `None` for edges the engine
    /// did not draw, such as invisible ones.
    pub fn path(&self) -> Option<&[Point]> {
        self.path.as_deref()
    }

    pub fn is_opale(&self) -> bool {
        self.opale
    }

    pub fn set_opale(&mut self, opale: bool) {
        self.opale = opale;
    }

    pub fn targets_region(&self) -> bool {
        self.source.cluster.is_some() || self.target.cluster.is_some()
    }

    /// Rank length 1 and no label.
    pub fn is_plain(&self) -> bool {
        self.length == 1 && self.labels.is_empty()
    }

    fn decor_dzeta(&self) -> f32 {
        self.head.margin() + self.tail.margin()
    }

    /// Horizontal spread: the summed label widths plus decoration margins,
    /// for same-rank edges only.
    pub fn horizontal_dzeta(&self) -> f32 {
        if self.self_link || self.length != 1 {
            return 0.0;
        }
        self.labels.iter().map(|l| l.size.width()).sum::<f32>() + self.decor_dzeta()
    }

    /// Vertical spread: the summed label heights plus decoration margins,
    /// for edges spanning more than one rank.
    pub fn vertical_dzeta(&self) -> f32 {
        if self.self_link || self.length == 1 {
            return 0.0;
        }
        self.labels.iter().map(|l| l.size.height()).sum::<f32>() + self.decor_dzeta()
    }

    /// Appends the edge statement to a layout request.
    pub fn append_request(&self, out: &mut String, splines: Splines) {
        let _ = write!(
            out,
            "{}->{}[arrowtail=none,arrowhead=none,minlen={},color=\"{}\"",
            self.source.node,
            self.target.node,
            self.length - 1,
            self.color.hex()
        );

        for label in &self.labels {
            let attribute = match (label.kind, splines) {
                (LabelKind::Center, Splines::Ortho) => "xlabel",
                (LabelKind::Center, _) => "label",
                (LabelKind::Head, _) => "headlabel",
                (LabelKind::Tail, _) => "taillabel",
            };
            let cell = keyed_cell(label.color, label.size.width(), label.size.height());
            let _ = write!(out, ",{attribute}={}", keyed_table([cell]));
        }

        if let Some(key) = self.sametail {
            let _ = write!(out, ",sametail={key}");
        }
        if let Some(cluster) = self.source.cluster {
            let _ = write!(out, ",ltail=cluster{cluster}");
        }
        if let Some(cluster) = self.target.cluster {
            let _ = write!(out, ",lhead=cluster{cluster}");
        }
        if self.invisible {
            out.push_str(",style=invis");
        }
        out.push_str("];\n");
    }

    /// Reads the route and label positions from the response.
    ///
    /// Returns `Ok(false)` and leaves the edge unresolved when its line color
    /// does not occur in the response.
    pub fn resolve(&mut self, response: &SvgResponse<'_>) -> Result<bool, LayoutError> {
        let Some(idx) = response.find_color(self.color) else {
            return Ok(false);
        };
        self.path = Some(response.path_after(idx)?);

        for label in &mut self.labels {
            if let Some(idx) = response.find_color(label.color) {
                let points = response.points_after(idx)?;
                label.position = Bounds::from_points(&points).map(|b| b.min_point());
            }
        }
        Ok(true)
    }

    /// Moves head and tail labels out of the margin-expanded bounds of every
    /// shape they overlap, away from the shape center.
    pub fn avoid_collisions<I>(&mut self, shapes: I)
    where
        I: IntoIterator<Item = Bounds>,
    {
        for shape in shapes {
            let obstacle = shape.expand(COLLISION_MARGIN);
            for label in self
                .labels
                .iter_mut()
                .filter(|label| label.kind != LabelKind::Center)
            {
                let Some(bounds) = label.bounds() else {
                    continue;
                };
                if bounds.intersects(&obstacle) {
                    let delta = push_away(&obstacle, &bounds);
                    label.position = label.position.map(|p| p.add_point(delta));
                }
            }
        }
    }

    pub fn translate(&mut self, delta: Point) {
        if let Some(path) = self.path.as_mut() {
            for point in path.iter_mut() {
                *point = point.add_point(delta);
            }
        }
        for label in &mut self.labels {
            label.position = label.position.map(|p| p.add_point(delta));
        }
    }

    /// Bounds of the resolved path and labels.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut points: Vec<Point> = self.path.clone().unwrap_or_default();
        for bounds in self.labels.iter().filter_map(LabelBox::bounds) {
            points.push(bounds.min_point());
            points.push(bounds.max_point());
        }
        Bounds::from_points(&points)
    }
}

/// Smallest move of `moving` along the center-to-center direction that
/// clears `fixed`.
fn push_away(fixed: &Bounds, moving: &Bounds) -> Point {
    let from = fixed.center();
    let to = moving.center();
    let (mut dx, mut dy) = (to.x() - from.x(), to.y() - from.y());
    let len = dx.hypot(dy);
    if len == 0.0 {
        (dx, dy) = (0.0, -1.0);
    } else {
        (dx, dy) = (dx / len, dy / len);
    }

    let need_x = if dx > 0.0 {
        (fixed.max_x() - moving.min_x()) / dx
    } else if dx < 0.0 {
        (moving.max_x() - fixed.min_x()) / -dx
    } else {
        f32::INFINITY
    };
    let need_y = if dy > 0.0 {
        (fixed.max_y() - moving.min_y()) / dy
    } else if dy < 0.0 {
        (moving.max_y() - fixed.min_y()) / -dy
    } else {
        f32::INFINITY
    };
    let t = need_x.min(need_y);
    Point::new(dx * t, dy * t)
}
