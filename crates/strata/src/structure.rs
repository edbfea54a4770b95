//! Read-only view of a diagram for one layout pass.
//!
//! [`GraphModel`] answers the structural questions the pipeline asks while
//! populating the layout registry (which leaves sit at the root, which groups
//! are empty, which diagrams are degenerate), and owns the sametail
//! reduction that decides which inheritance links are merged into a fan-in.
//!
//! The underlying [`Diagram`] is never mutated. Per-pass decisions (sametail
//! keys, fan-in groups, groups muted to empty packages) are stored here.

use std::collections::HashSet;

use indexmap::IndexMap;
use log::debug;

use strata_core::{
    identifier::Id,
    model::{Diagram, DiagramKind, Entity, EntityId, EntityKind, LeafKind, Link, LinkId},
};

/// Links merged into a single visual fan-in at one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanInGroup {
    entity: EntityId,
    merged: Vec<LinkId>,
    touching: Vec<LinkId>,
}

impl FanInGroup {
    /// The entity the fan-in is drawn at.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Links sharing the retained sametail key.
    pub fn merged(&self) -> &[LinkId] {
        &self.merged
    }

    /// Every link touching [`FanInGroup::entity`].
    pub fn touching(&self) -> &[LinkId] {
        &self.touching
    }
}

/// Structural view of a [`Diagram`] for one layout pass.
#[derive(Debug)]
pub struct GraphModel<'a> {
    diagram: &'a Diagram,
    sametails: Vec<Option<Id>>,
    fan_ins: IndexMap<EntityId, FanInGroup>,
    muted: HashSet<EntityId>,
}

impl<'a> GraphModel<'a> {
    pub fn new(diagram: &'a Diagram) -> Self {
        Self {
            diagram,
            sametails: diagram.links().iter().map(Link::sametail).collect(),
            fan_ins: IndexMap::new(),
            muted: HashSet::new(),
        }
    }

    pub fn diagram(&self) -> &'a Diagram {
        self.diagram
    }

    pub fn kind(&self) -> DiagramKind {
        self.diagram.kind()
    }

    pub fn root(&self) -> EntityId {
        self.diagram.root()
    }

    pub fn entity(&self, id: EntityId) -> &'a Entity {
        self.diagram.entity(id)
    }

    pub fn link(&self, id: LinkId) -> &'a Link {
        self.diagram.link(id)
    }

    /// Links that are not removed, in declaration order.
    pub fn links(&self) -> impl Iterator<Item = &'a Link> + use<'a> {
        self.diagram.links().iter().filter(|link| !link.is_removed())
    }

    /// Leaf entities that are not removed, in declaration order.
    pub fn leaves(&self) -> impl Iterator<Item = &'a Entity> + use<'a> {
        self.diagram
            .entities()
            .iter()
            .filter(|entity| !entity.is_group() && !entity.is_removed())
    }

    /// Groups other than the root that are not removed.
    pub fn groups(&self) -> impl Iterator<Item = &'a Entity> + use<'a> {
        let root = self.root();
        self.diagram
            .entities()
            .iter()
            .filter(move |entity| entity.is_group() && !entity.is_removed() && entity.id() != root)
    }

    /// True when the diagram has no groups, no links and exactly `leaves` leaves.
    pub fn is_degenerate_with(&self, leaves: usize) -> bool {
        self.groups().next().is_none()
            && self.links().next().is_none()
            && self.leaves().count() == leaves
    }

    /// True when `group` contains no live entity.
    pub fn is_empty_group(&self, group: EntityId) -> bool {
        self.entity(group)
            .children()
            .iter()
            .all(|child| self.entity(*child).is_removed())
    }

    /// Direct child groups of `parent`, in declaration order.
    pub fn child_groups(&self, parent: EntityId) -> Vec<EntityId> {
        self.entity(parent)
            .children()
            .iter()
            .copied()
            .filter(|child| {
                let entity = self.entity(*child);
                entity.is_group() && !entity.is_removed()
            })
            .collect()
    }

    /// Direct child leaves of `parent`, in declaration order.
    pub fn child_leaves(&self, parent: EntityId) -> Vec<EntityId> {
        self.entity(parent)
            .children()
            .iter()
            .copied()
            .filter(|child| {
                let entity = self.entity(*child);
                !entity.is_group() && !entity.is_removed()
            })
            .collect()
    }

    /// Leaves placed directly in the root group.
    pub fn unpackaged_leaves(&self) -> Vec<EntityId> {
        self.child_leaves(self.root())
    }

    /// Records that `group` is drawn as an [`LeafKind::EmptyPackage`] leaf.
    pub fn mute_to_empty_package(&mut self, group: EntityId) {
        self.muted.insert(group);
    }

    pub fn is_muted(&self, entity: EntityId) -> bool {
        self.muted.contains(&entity)
    }

    /// The leaf kind an entity is laid out as, taking muting into account.
    pub fn effective_leaf_kind(&self, entity: EntityId) -> Option<LeafKind> {
        if self.is_muted(entity) {
            return Some(LeafKind::EmptyPackage);
        }
        match self.entity(entity).kind() {
            EntityKind::Leaf(kind) => Some(kind),
            EntityKind::Group(_) => None,
        }
    }

    /// Current sametail key of `link`.
    pub fn sametail(&self, link: LinkId) -> Option<Id> {
        self.sametails.get(link.index()).copied().flatten()
    }

    pub fn fan_in(&self, entity: EntityId) -> Option<&FanInGroup> {
        self.fan_ins.get(&entity)
    }

    pub fn fan_ins(&self) -> impl Iterator<Item = &FanInGroup> {
        self.fan_ins.values()
    }

    /// Decides which inheritance links are merged into a fan-in.
    ///
    /// Every extends-like link is keyed by the uid of its source entity. Keys
    /// shared by fewer than `limit` links are cleared so those links are drawn
    /// individually; keys reaching `limit` are kept and the entity they
    /// identify receives a [`FanInGroup`]. Explicit keys supplied on links
    /// are counted alongside.
    ///
    /// Running the reduction again yields the same assignment.
    pub fn reduce_sametails(&mut self, limit: u32) {
        let links = self.diagram.links();
        self.fan_ins.clear();

        let mut counts: IndexMap<Id, u32> = IndexMap::new();
        for link in links.iter().filter(|link| !link.is_removed()) {
            let slot = link.id().index();
            if link.head().is_extends_like() {
                let key = self.entity(link.source()).uid();
                self.sametails[slot] = Some(key);
            }
            if let Some(key) = self.sametails[slot] {
                *counts.entry(key).or_insert(0) += 1;
            }
        }

        let mut cleared = HashSet::new();
        for (key, count) in counts {
            if count < limit {
                cleared.insert(key);
                continue;
            }

            let merged: Vec<LinkId> = links
                .iter()
                .filter(|link| !link.is_removed() && self.sametails[link.id().index()] == Some(key))
                .map(Link::id)
                .collect();
            let Some(entity) = self.leaves().find(|leaf| leaf.uid() == key).map(Entity::id) else {
                debug!(key = key.to_string(); "Sametail key names no leaf, no fan-in attached");
                continue;
            };
            let touching = links
                .iter()
                .filter(|link| !link.is_removed() && link.contains(entity))
                .map(Link::id)
                .collect();
            debug!(key = key.to_string(), count = count; "Sametail key retained");
            self.fan_ins.insert(
                entity,
                FanInGroup {
                    entity,
                    merged,
                    touching,
                },
            );
        }

        for key in self.sametails.iter_mut() {
            if key.is_some_and(|k| cleared.contains(&k)) {
                *key = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use strata_core::{
        geometry::Size,
        model::{EntityImage, GroupKind, LinkDecor, ShapeType},
    };

    use super::*;

    fn image() -> EntityImage {
        EntityImage::new(Size::new(40.0, 20.0), ShapeType::Rectangle)
    }

    /// One subtype with `n` extends links to distinct supertypes.
    fn fan_diagram(n: usize) -> (Diagram, EntityId) {
        let mut diagram = Diagram::new(DiagramKind::Class);
        let root = diagram.root();
        let sub = diagram.add_leaf("Sub", LeafKind::Class, image(), root).unwrap();
        for i in 0..n {
            let sup = diagram
                .add_leaf(&format!("Super{i}"), LeafKind::Interface, image(), root)
                .unwrap();
            diagram
                .add_link(sub, sup)
                .unwrap()
                .set_head(LinkDecor::Extends);
        }
        (diagram, sub)
    }

    #[test]
    fn test_count_below_limit_is_cleared() {
        let (diagram, sub) = fan_diagram(2);
        let mut model = GraphModel::new(&diagram);
        model.reduce_sametails(3);

        assert!(model.fan_in(sub).is_none());
        for link in diagram.links() {
            assert_eq!(model.sametail(link.id()), None);
        }
    }

    #[test]
    fn test_count_at_limit_is_retained() {
        let (diagram, sub) = fan_diagram(3);
        let mut model = GraphModel::new(&diagram);
        model.reduce_sametails(3);

        let fan_in = model.fan_in(sub).expect("fan-in attached");
        assert_eq!(fan_in.entity(), sub);
        assert_eq!(fan_in.merged().len(), 3);
        assert_eq!(fan_in.touching().len(), 3);
        let key = diagram.entity(sub).uid();
        for link in diagram.links() {
            assert_eq!(model.sametail(link.id()), Some(key));
        }
    }

    #[test]
    fn test_touching_includes_unmerged_links() {
        let (mut diagram, sub) = fan_diagram(2);
        let root = diagram.root();
        let other = diagram.add_leaf("User", LeafKind::Class, image(), root).unwrap();
        diagram.add_link(other, sub).unwrap().set_head(LinkDecor::Arrow);

        let mut model = GraphModel::new(&diagram);
        model.reduce_sametails(2);

        let fan_in = model.fan_in(sub).unwrap();
        assert_eq!(fan_in.merged().len(), 2);
        assert_eq!(fan_in.touching().len(), 3);
    }

    #[test]
    fn test_explicit_keys_are_counted() {
        let (mut diagram, sub) = fan_diagram(1);
        let key = diagram.entity(sub).uid();
        let root = diagram.root();
        let a = diagram.add_leaf("A", LeafKind::Class, image(), root).unwrap();
        diagram.add_link(sub, a).unwrap().set_sametail(Some(key));

        let mut model = GraphModel::new(&diagram);
        model.reduce_sametails(2);
        assert!(model.fan_in(sub).is_some());
    }

    #[test]
    fn test_removed_links_are_ignored() {
        let (mut diagram, sub) = fan_diagram(2);
        let first = diagram.links()[0].id();
        diagram.link_mut(first).set_removed(true);

        let mut model = GraphModel::new(&diagram);
        model.reduce_sametails(2);
        assert!(model.fan_in(sub).is_none());
    }

    #[test]
    fn test_default_limit_disables_merging() {
        let (diagram, sub) = fan_diagram(6);
        let mut model = GraphModel::new(&diagram);
        model.reduce_sametails(u32::MAX);
        assert!(model.fan_in(sub).is_none());
    }

    #[test]
    fn test_degenerate_and_empty_groups() {
        let mut diagram = Diagram::new(DiagramKind::Class);
        assert!(GraphModel::new(&diagram).is_degenerate_with(0));

        let root = diagram.root();
        let leaf = diagram.add_leaf("A", LeafKind::Class, image(), root).unwrap();
        assert!(GraphModel::new(&diagram).is_degenerate_with(1));

        let group = diagram.add_group("pkg", GroupKind::Package, root).unwrap();
        let model = GraphModel::new(&diagram);
        assert!(!model.is_degenerate_with(1));
        assert!(model.is_empty_group(group));
        assert_eq!(model.child_groups(root), vec![group]);
        assert_eq!(model.unpackaged_leaves(), vec![leaf]);
    }

    #[test]
    fn test_muting() {
        let mut diagram = Diagram::new(DiagramKind::Class);
        let root = diagram.root();
        let group = diagram.add_group("pkg", GroupKind::Package, root).unwrap();
        let mut model = GraphModel::new(&diagram);
        assert_eq!(model.effective_leaf_kind(group), None);
        model.mute_to_empty_package(group);
        assert_eq!(model.effective_leaf_kind(group), Some(LeafKind::EmptyPackage));
    }
}

#[cfg(test)]
mod proptest_tests {
    use proptest::prelude::*;

    use strata_core::{
        geometry::Size,
        model::{EntityImage, LinkDecor, ShapeType},
    };

    use super::*;

    // ===================
    // Strategies
    // ===================

    fn decor_strategy() -> impl Strategy<Value = LinkDecor> {
        prop_oneof![
            Just(LinkDecor::None),
            Just(LinkDecor::Arrow),
            Just(LinkDecor::Extends),
            Just(LinkDecor::Redefines),
            Just(LinkDecor::Composition),
        ]
    }

    /// (source, target, head decor, explicit key index)
    type LinkSpec = (usize, usize, LinkDecor, Option<usize>);

    fn links_strategy(entities: usize) -> impl Strategy<Value = Vec<LinkSpec>> {
        prop::collection::vec(
            (
                0..entities,
                0..entities,
                decor_strategy(),
                prop::option::weighted(0.2, 0..entities),
            ),
            0..24,
        )
    }

    fn build(entities: usize, links: &[LinkSpec]) -> Diagram {
        let mut diagram = Diagram::new(DiagramKind::Class);
        let root = diagram.root();
        let image = EntityImage::new(Size::new(40.0, 20.0), ShapeType::Rectangle);
        let ids: Vec<EntityId> = (0..entities)
            .map(|i| {
                diagram
                    .add_leaf(&format!("E{i}"), LeafKind::Class, image, root)
                    .unwrap()
            })
            .collect();
        for (source, target, decor, key) in links {
            let key = key.map(|k| diagram.entity(ids[k]).uid());
            diagram
                .add_link(ids[*source], ids[*target])
                .unwrap()
                .set_head(*decor)
                .set_sametail(key);
        }
        diagram
    }

    fn assignment(model: &GraphModel<'_>) -> Vec<Option<Id>> {
        model
            .diagram()
            .links()
            .iter()
            .map(|link| model.sametail(link.id()))
            .collect()
    }

    // ===================
    // Property Test Functions
    // ===================

    /// Running the reduction twice yields the assignment of running it once.
    fn check_reduction_is_idempotent(
        entities: usize,
        links: Vec<LinkSpec>,
        limit: u32,
    ) -> Result<(), TestCaseError> {
        let diagram = build(entities, &links);
        let mut model = GraphModel::new(&diagram);

        model.reduce_sametails(limit);
        let once = assignment(&model);
        let fan_ins_once: Vec<FanInGroup> = model.fan_ins().cloned().collect();

        model.reduce_sametails(limit);
        prop_assert_eq!(assignment(&model), once);
        let fan_ins_twice: Vec<FanInGroup> = model.fan_ins().cloned().collect();
        prop_assert_eq!(fan_ins_twice, fan_ins_once);
        Ok(())
    }

    /// A key is merged iff its count reaches the limit.
    fn check_merge_iff_count_reaches_limit(count: usize, limit: u32) -> Result<(), TestCaseError> {
        let mut diagram = Diagram::new(DiagramKind::Class);
        let root = diagram.root();
        let image = EntityImage::new(Size::new(40.0, 20.0), ShapeType::Rectangle);
        let sub = diagram.add_leaf("Sub", LeafKind::Class, image, root).unwrap();
        for i in 0..count {
            let sup = diagram
                .add_leaf(&format!("S{i}"), LeafKind::Class, image, root)
                .unwrap();
            diagram
                .add_link(sub, sup)
                .unwrap()
                .set_head(LinkDecor::Extends);
        }

        let mut model = GraphModel::new(&diagram);
        model.reduce_sametails(limit);

        let retained = count as u32 >= limit;
        prop_assert_eq!(model.fan_in(sub).is_some(), retained);
        for link in diagram.links() {
            prop_assert_eq!(model.sametail(link.id()).is_some(), retained);
        }
        Ok(())
    }

    // ===================
    // Proptest Wrappers
    // ===================

    proptest! {
        #[test]
        fn reduction_is_idempotent(
            (entities, links) in (1usize..8).prop_flat_map(|n| (Just(n), links_strategy(n))),
            limit in 0u32..6,
        ) {
            check_reduction_is_idempotent(entities, links, limit)?;
        }

        #[test]
        fn merge_iff_count_reaches_limit(count in 1usize..10, limit in 1u32..10) {
            check_merge_iff_count_reaches_limit(count, limit)?;
        }

        #[test]
        fn limit_minus_one_clears_and_limit_retains(limit in 1u32..10) {
            if limit > 1 {
                check_merge_iff_count_reaches_limit(limit as usize - 1, limit)?;
            }
            check_merge_iff_count_reaches_limit(limit as usize, limit)?;
        }
    }
}
