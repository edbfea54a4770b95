//! Region placeholders and their nesting.
//!
//! Each group becomes a [`Cluster`] in a [`ClusterTree`]. The tree is built
//! while walking the diagram, with [`ClusterTree::create_child`] entering a
//! region and [`ClusterTree::close`] leaving it, and is serialized into
//! `subgraph cluster…` blocks.

use std::fmt::Write;

use indexmap::IndexMap;
use log::trace;

use strata_core::{
    color::{ColorSequence, KeyColor},
    geometry::{Bounds, Point, Size},
    identifier::Id,
    model::{Entity, EntityId, GroupNotes},
    text::StringBounder,
};

use crate::error::LayoutError;

use super::{keyed_cell, keyed_table, node::ShapeNode};

/// Index of a cluster inside its [`ClusterTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterId(usize);

impl ClusterId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Measured title of a region.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClusterHeader {
    title: Size,
}

impl ClusterHeader {
    pub fn new(title: Size) -> Self {
        Self { title }
    }

    /// Measures the group name. An unnamed group has an empty title.
    pub fn measure<B: StringBounder + ?Sized>(name: &str, bounder: &B) -> Self {
        if name.is_empty() {
            return Self::default();
        }
        Self::new(bounder.measure(name))
    }

    pub fn title(&self) -> Size {
        self.title
    }

    pub fn has_title(&self) -> bool {
        !self.title.is_degenerate()
    }
}

/// Layout-time stand-in for one group.
#[derive(Debug, Clone)]
pub struct Cluster {
    id: ClusterId,
    parent: Option<ClusterId>,
    children: Vec<ClusterId>,
    group: EntityId,
    uid: Id,
    name: String,
    header: ClusterHeader,
    notes: GroupNotes,
    packed: bool,
    color: KeyColor,
    title_color: KeyColor,
    note_top_color: KeyColor,
    note_bottom_color: KeyColor,
    shapes: Vec<Id>,
    bounds: Option<Bounds>,
    title_position: Option<Point>,
    note_top_position: Option<Point>,
    note_bottom_position: Option<Point>,
}

impl Cluster {
    fn new(
        id: ClusterId,
        parent: Option<ClusterId>,
        header: ClusterHeader,
        colors: &mut ColorSequence,
        group: &Entity,
    ) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            group: group.id(),
            uid: group.uid(),
            name: group.name().to_string(),
            header,
            notes: *group.notes(),
            packed: group.is_packed(),
            color: colors.next_color(),
            title_color: colors.next_color(),
            note_top_color: colors.next_color(),
            note_bottom_color: colors.next_color(),
            shapes: Vec::new(),
            bounds: None,
            title_position: None,
            note_top_position: None,
            note_bottom_position: None,
        }
    }

    pub fn id(&self) -> ClusterId {
        self.id
    }

    pub fn parent(&self) -> Option<ClusterId> {
        self.parent
    }

    pub fn children(&self) -> &[ClusterId] {
        &self.children
    }

    pub fn group(&self) -> EntityId {
        self.group
    }

    pub fn uid(&self) -> Id {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> ClusterHeader {
        self.header
    }

    pub fn notes(&self) -> &GroupNotes {
        &self.notes
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    pub fn color(&self) -> KeyColor {
        self.color
    }

    pub fn title_color(&self) -> KeyColor {
        self.title_color
    }

    pub fn note_top_color(&self) -> KeyColor {
        self.note_top_color
    }

    pub fn note_bottom_color(&self) -> KeyColor {
        self.note_bottom_color
    }

    /// Uids of the shapes placed directly in this region.
    pub fn shapes(&self) -> &[Id] {
        &self.shapes
    }

    /// Name of the invisible point every region contains, used as the
    /// endpoint of edges that attach to the region itself.
    pub fn anchor(&self) -> Id {
        self.uid.with_suffix("a")
    }

    /// Name of the `subgraph` block in the request.
    pub fn subgraph_name(&self) -> String {
        format!("cluster{}", self.uid)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn title_position(&self) -> Option<Point> {
        self.title_position
    }

    pub fn note_top_position(&self) -> Option<Point> {
        self.note_top_position
    }

    pub fn note_bottom_position(&self) -> Option<Point> {
        self.note_bottom_position
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = Some(bounds);
    }

    pub fn set_title_position(&mut self, position: Point) {
        self.title_position = Some(position);
    }

    pub fn set_note_top_position(&mut self, position: Point) {
        self.note_top_position = Some(position);
    }

    pub fn set_note_bottom_position(&mut self, position: Point) {
        self.note_bottom_position = Some(position);
    }

    pub fn translate(&mut self, delta: Point) {
        self.bounds = self.bounds.map(|b| b.translate(delta));
        for position in [
            &mut self.title_position,
            &mut self.note_top_position,
            &mut self.note_bottom_position,
        ] {
            *position = position.map(|p| p.add_point(delta));
        }
    }

    fn min_anchor(&self) -> Id {
        Id::new(&format!("minpt{}", self.color.hex().trim_start_matches('#')))
    }

    fn max_anchor(&self) -> Id {
        Id::new(&format!("maxpt{}", self.color.hex().trim_start_matches('#')))
    }

    fn label(&self, compatibility: bool) -> String {
        let mut rows = Vec::new();
        if compatibility && let Some(size) = self.notes.top {
            rows.push(keyed_cell(self.note_top_color, size.width(), size.height()));
        }
        if self.header.has_title() {
            let title = self.header.title;
            rows.push(keyed_cell(self.title_color, title.width(), title.height()));
        }
        if compatibility && let Some(size) = self.notes.bottom {
            rows.push(keyed_cell(
                self.note_bottom_color,
                size.width(),
                size.height(),
            ));
        }
        if rows.is_empty() {
            return "\"\"".to_string();
        }
        keyed_table(rows)
    }
}

/// The region hierarchy of one layout pass.
///
/// The root cluster stands for the diagram's root group and is never
/// emitted as a `subgraph`; its shapes are placed at the top level of the
/// request.
#[derive(Debug, Clone)]
pub struct ClusterTree {
    clusters: Vec<Cluster>,
    current: ClusterId,
    by_group: IndexMap<EntityId, ClusterId>,
    anchored: bool,
}

impl ClusterTree {
    /// Creates a tree holding only the root region for `root`.
    ///
    /// With `anchored` set, every region gets a pair of rank anchors that
    /// stretch it from the first to the last rank (activity swimlanes).
    pub fn new(root: &Entity, colors: &mut ColorSequence, anchored: bool) -> Self {
        let id = ClusterId(0);
        let cluster = Cluster::new(id, None, ClusterHeader::default(), colors, root);
        let mut by_group = IndexMap::new();
        by_group.insert(root.id(), id);
        Self {
            clusters: vec![cluster],
            current: id,
            by_group,
            anchored,
        }
    }

    pub fn root(&self) -> ClusterId {
        ClusterId(0)
    }

    pub fn current(&self) -> ClusterId {
        self.current
    }

    pub fn cluster(&self, id: ClusterId) -> &Cluster {
        &self.clusters[id.0]
    }

    pub fn cluster_mut(&mut self, id: ClusterId) -> &mut Cluster {
        &mut self.clusters[id.0]
    }

    /// Returns the region created for `group`, if any.
    pub fn cluster_of(&self, group: EntityId) -> Option<&Cluster> {
        self.by_group.get(&group).map(|id| &self.clusters[id.0])
    }

    /// All non-root regions in creation order.
    pub fn regions(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().skip(1)
    }

    pub fn regions_mut(&mut self) -> impl Iterator<Item = &mut Cluster> {
        self.clusters.iter_mut().skip(1)
    }

    /// Creates a region for `group` under the current one and enters it.
    pub fn create_child(
        &mut self,
        header: ClusterHeader,
        colors: &mut ColorSequence,
        group: &Entity,
    ) -> ClusterId {
        let id = ClusterId(self.clusters.len());
        let parent = self.current;
        self.clusters
            .push(Cluster::new(id, Some(parent), header, colors, group));
        self.clusters[parent.0].children.push(id);
        self.by_group.insert(group.id(), id);
        self.current = id;
        trace!(cluster = id.0, parent = parent.0; "Opened region");
        id
    }

    /// Leaves the current region.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidOperation`] when the current region is
    /// the root.
    pub fn close(&mut self) -> Result<(), LayoutError> {
        let parent = self.clusters[self.current.0].parent.ok_or_else(|| {
            LayoutError::InvalidOperation("cannot close the root region".to_string())
        })?;
        self.current = parent;
        Ok(())
    }

    /// Places a shape in the current region.
    pub fn add_shape(&mut self, uid: Id) {
        self.clusters[self.current.0].shapes.push(uid);
    }

    /// Rank anchors of every region, as `(minimum, maximum)` lists.
    pub fn anchors(&self) -> (Vec<Id>, Vec<Id>) {
        if !self.anchored {
            return (Vec::new(), Vec::new());
        }
        self.regions()
            .map(|cluster| (cluster.min_anchor(), cluster.max_anchor()))
            .unzip()
    }

    /// Appends the rank anchor declarations, once for all regions.
    pub fn append_anchors(&self, out: &mut String) {
        let (min, max) = self.anchors();
        for (rank, anchors) in [("min", min), ("max", max)] {
            if anchors.is_empty() {
                continue;
            }
            let _ = write!(out, "{{rank={rank};");
            for anchor in anchors {
                let _ = write!(out, "{anchor} [shape=point,width=.01,label=\"\"];");
            }
            out.push_str("}\n");
        }
    }

    /// Appends the statements of the shapes placed directly in `id`.
    pub fn append_shapes(&self, id: ClusterId, nodes: &IndexMap<Id, ShapeNode>, out: &mut String) {
        for uid in &self.clusters[id.0].shapes {
            if let Some(node) = nodes.get(uid) {
                node.append_request(out);
            }
        }
    }

    /// Appends the `subgraph` blocks of every child region of `id`,
    /// recursively.
    pub fn append_regions(
        &self,
        id: ClusterId,
        nodes: &IndexMap<Id, ShapeNode>,
        compatibility: bool,
        out: &mut String,
    ) {
        for child in &self.clusters[id.0].children {
            self.append_body(*child, nodes, compatibility, out);
        }
    }

    fn append_body(
        &self,
        id: ClusterId,
        nodes: &IndexMap<Id, ShapeNode>,
        compatibility: bool,
        out: &mut String,
    ) {
        let cluster = &self.clusters[id.0];
        let _ = writeln!(out, "subgraph {} {{", cluster.subgraph_name());
        if cluster.packed {
            out.push_str("style=invis;\n");
        } else {
            out.push_str("style=solid;\n");
        }
        let _ = writeln!(out, "color=\"{}\";", cluster.color.hex());
        let _ = writeln!(out, "label={};", cluster.label(compatibility));
        let _ = writeln!(
            out,
            "{} [shape=point,width=.01,label=\"\"];",
            cluster.anchor()
        );
        if self.anchored {
            let _ = writeln!(out, "{};{};", cluster.min_anchor(), cluster.max_anchor());
        }
        self.append_shapes(id, nodes, out);
        self.append_regions(id, nodes, compatibility, out);
        out.push_str("}\n");
    }
}
