//! Per-render registry of every layout placeholder.

use indexmap::IndexMap;

use strata_core::{
    color::ColorSequence,
    geometry::{Bounds, Point},
    identifier::Id,
    model::{Entity, EntityKind},
};

use crate::error::LayoutError;

use super::{
    cluster::{ClusterHeader, ClusterId, ClusterTree},
    edge::{EdgeLine, Endpoint},
    node::ShapeNode,
};

/// Owns the shapes, edges, regions and the key color sequence of one
/// layout pass.
///
/// A registry is created fresh for every render and never shared.
#[derive(Debug)]
pub struct LayoutRegistry {
    colors: ColorSequence,
    nodes: IndexMap<Id, ShapeNode>,
    edges: Vec<EdgeLine>,
    tree: ClusterTree,
}

impl LayoutRegistry {
    pub fn new(root: &Entity, anchored: bool) -> Self {
        let mut colors = ColorSequence::new();
        let tree = ClusterTree::new(root, &mut colors, anchored);
        Self {
            colors,
            nodes: IndexMap::new(),
            edges: Vec::new(),
            tree,
        }
    }

    pub fn colors_mut(&mut self) -> &mut ColorSequence {
        &mut self.colors
    }

    pub fn tree(&self) -> &ClusterTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ClusterTree {
        &mut self.tree
    }

    /// Opens a region for `group` below the current one.
    pub fn open_cluster(&mut self, header: ClusterHeader, group: &Entity) -> ClusterId {
        self.tree.create_child(header, &mut self.colors, group)
    }

    pub fn close_cluster(&mut self) -> Result<(), LayoutError> {
        self.tree.close()
    }

    /// Registers a shape in the current region.
    pub fn add_node(&mut self, node: ShapeNode) {
        self.tree.add_shape(node.uid());
        self.nodes.insert(node.uid(), node);
    }

    pub fn add_edge(&mut self, edge: EdgeLine) {
        self.edges.push(edge);
    }

    pub fn nodes(&self) -> &IndexMap<Id, ShapeNode> {
        &self.nodes
    }

    pub fn node(&self, uid: Id) -> Option<&ShapeNode> {
        self.nodes.get(&uid)
    }

    pub fn node_mut(&mut self, uid: Id) -> Option<&mut ShapeNode> {
        self.nodes.get_mut(&uid)
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut ShapeNode> {
        self.nodes.values_mut()
    }

    pub fn edges(&self) -> &[EdgeLine] {
        &self.edges
    }

    pub fn edges_mut(&mut self) -> &mut [EdgeLine] {
        &mut self.edges
    }

    /// Edges of rank length 1 without any label.
    pub fn plain_edges(&self) -> impl Iterator<Item = &EdgeLine> {
        self.edges.iter().filter(|e| e.is_plain())
    }

    /// Every edge that is not plain.
    pub fn labeled_edges(&self) -> impl Iterator<Item = &EdgeLine> {
        self.edges.iter().filter(|e| !e.is_plain())
    }

    /// True when some edge attaches to a region rather than a shape.
    pub fn has_region_edges(&self) -> bool {
        self.edges.iter().any(EdgeLine::targets_region)
    }

    /// Resolves what an edge attached to `entity` connects to in the
    /// request: the entity's shape, or the anchor of its region.
    ///
    /// Returns `None` when the entity was not laid out.
    pub fn endpoint(&self, entity: &Entity) -> Option<Endpoint> {
        if self.nodes.contains_key(&entity.uid()) {
            return Some(Endpoint::shape(entity.uid()));
        }
        match entity.kind() {
            EntityKind::Group(_) => self
                .tree
                .cluster_of(entity.id())
                .filter(|cluster| cluster.parent().is_some())
                .map(|cluster| Endpoint::region(cluster.anchor(), cluster.uid())),
            EntityKind::Leaf(_) => None,
        }
    }

    /// Moves every placeholder by `delta`.
    pub fn translate_all(&mut self, delta: Point) {
        for node in self.nodes.values_mut() {
            node.translate(delta);
        }
        for edge in &mut self.edges {
            edge.translate(delta);
        }
        for cluster in self.tree.regions_mut() {
            cluster.translate(delta);
        }
    }

    /// Bounds enclosing every solved placeholder.
    pub fn bounds(&self) -> Option<Bounds> {
        self.nodes
            .values()
            .filter_map(ShapeNode::bounds)
            .chain(self.edges.iter().filter_map(EdgeLine::bounds))
            .chain(self.tree.regions().filter_map(|c| c.bounds()))
            .reduce(|acc, b| acc.merge(&b))
    }

    /// Rightmost coordinate of each named region.
    pub fn max_x(&self) -> IndexMap<String, f32> {
        let mut max_x = IndexMap::new();
        for cluster in self.tree.regions() {
            if let Some(bounds) = cluster.bounds() {
                let entry = max_x
                    .entry(cluster.name().to_string())
                    .or_insert(bounds.max_x());
                *entry = entry.max(bounds.max_x());
            }
        }
        max_x
    }
}

#[cfg(test)]
mod tests {
    use strata_core::{
        geometry::Size,
        model::{Diagram, DiagramKind, EntityImage, GroupKind, LeafKind, ShapeType},
        text::FixedBounder,
    };

    use super::*;

    #[test]
    fn test_endpoint_resolution() {
        let mut diagram = Diagram::new(DiagramKind::Class);
        let root = diagram.root();
        let group = diagram.add_group("pkg", GroupKind::Package, root).unwrap();
        let leaf = diagram
            .add_leaf("A", LeafKind::Class, EntityImage::default(), group)
            .unwrap();
        let orphan = diagram
            .add_leaf("B", LeafKind::Class, EntityImage::default(), root)
            .unwrap();

        let mut registry = LayoutRegistry::new(diagram.entity(root), false);
        let header = ClusterHeader::measure("pkg", &FixedBounder::default());
        registry.open_cluster(header, diagram.entity(group));
        let entity = diagram.entity(leaf);
        registry.add_node(ShapeNode::new(
            leaf,
            entity.uid(),
            LeafKind::Class,
            ShapeType::Rectangle,
            Size::new(10.0, 10.0),
        ));
        registry.close_cluster().unwrap();

        assert_eq!(
            registry.endpoint(entity),
            Some(Endpoint::shape(entity.uid()))
        );
        let region = registry.endpoint(diagram.entity(group)).unwrap();
        assert_eq!(region.cluster, Some(diagram.entity(group).uid()));
        assert_eq!(region.node, diagram.entity(group).uid().with_suffix("a"));
        assert!(registry.endpoint(diagram.entity(orphan)).is_none());
        assert!(registry.endpoint(diagram.entity(root)).is_none());
    }

    #[test]
    fn test_translate_and_bounds() {
        let mut diagram = Diagram::new(DiagramKind::Class);
        let root = diagram.root();
        let leaf = diagram
            .add_leaf("A", LeafKind::Class, EntityImage::default(), root)
            .unwrap();
        let mut registry = LayoutRegistry::new(diagram.entity(root), false);
        let mut node = ShapeNode::new(
            leaf,
            diagram.entity(leaf).uid(),
            LeafKind::Class,
            ShapeType::Rectangle,
            Size::new(10.0, 20.0),
        );
        node.set_position(Point::new(-4.0, 2.0));
        registry.add_node(node);

        registry.translate_all(Point::new(10.0, 4.0));
        let bounds = registry.bounds().unwrap();
        assert_eq!(bounds.min_point(), Point::new(6.0, 6.0));
        assert_eq!(bounds.max_point(), Point::new(16.0, 26.0));
    }
}
