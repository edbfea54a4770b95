//! The diagram model handed to the layout pipeline.
//!
//! Entities and links live in an arena owned by [`Diagram`]. Hierarchy is
//! expressed through [`EntityId`] references (a child records its parent, a
//! group records its ordered children), so traversal never goes through
//! owning pointers.
//!
//! The root group is created together with the diagram and is always
//! [`Diagram::root`].
//!
//! # Examples
//!
//! ```
//! # use strata_core::model::*;
//! # use strata_core::geometry::Size;
//! # fn main() -> Result<(), ModelError> {
//! let mut diagram = Diagram::new(DiagramKind::Class);
//! let root = diagram.root();
//! let shapes = diagram.add_group("shapes", GroupKind::Package, root)?;
//! let image = EntityImage::new(Size::new(80.0, 40.0), ShapeType::Rectangle);
//! let base = diagram.add_leaf("Shape", LeafKind::AbstractClass, image, shapes)?;
//! let circle = diagram.add_leaf("Circle", LeafKind::Class, image, shapes)?;
//! diagram.add_link(circle, base)?.set_head(LinkDecor::Extends);
//!
//! assert_eq!(diagram.entity(shapes).children(), &[base, circle]);
//! assert_eq!(diagram.links().len(), 1);
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;
use thiserror::Error;

use crate::{geometry::Size, identifier::Id};

/// Errors raised while assembling a [`Diagram`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("entity {0:?} does not exist")]
    UnknownEntity(EntityId),

    #[error("entity `{0}` is not a group and cannot contain children")]
    NotAGroup(String),
}

/// Arena index of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Arena index of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(usize);

impl LinkId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The kind of diagram being laid out.
///
/// Only a few kinds change layout behavior: activity diagrams use smaller
/// minimum separations and may have swimlane anchors, and state diagrams are
/// never short-circuited to a single-entity image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagramKind {
    #[default]
    Class,
    Object,
    Description,
    Activity,
    State,
}

/// The kind of a leaf entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeafKind {
    Class,
    AbstractClass,
    Interface,
    Enum,
    Annotation,
    Object,
    Note,
    Actor,
    UseCase,
    Component,
    Activity,
    State,
    Description,
    /// A package with no content, drawn as a single shape.
    EmptyPackage,
}

impl LeafKind {
    /// Returns true for leaves drawn with a class-style compartment box.
    pub fn is_like_class(self) -> bool {
        matches!(
            self,
            Self::Class | Self::AbstractClass | Self::Interface | Self::Enum | Self::Annotation
        )
    }
}

/// The kind of a group entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKind {
    /// The implicit top-level container of every diagram.
    #[serde(skip)]
    Root,
    Package,
    Namespace,
    Rectangle,
    State,
    /// A region of a composite state. Laid out by its enclosing state.
    ConcurrentState,
}

/// Leaf or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Leaf(LeafKind),
    Group(GroupKind),
}

/// Geometric family of an entity's shape.
///
/// The family decides how the shape is requested from the layout engine and
/// how its position is read back from the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeType {
    #[default]
    Rectangle,
    RectangleHtmlForPorts,
    RectangleWithCircleInside,
    RectanglePort,
    RoundRectangle,
    Octagon,
    Hexagon,
    Circle,
    Oval,
    Diamond,
    Folder,
    /// A connection point on a component border. Ports are positioned by
    /// their owner and have no geometry of their own in the response.
    Port,
}

impl ShapeType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Rectangle => "RECTANGLE",
            Self::RectangleHtmlForPorts => "RECTANGLE_HTML_FOR_PORTS",
            Self::RectangleWithCircleInside => "RECTANGLE_WITH_CIRCLE_INSIDE",
            Self::RectanglePort => "RECTANGLE_PORT",
            Self::RoundRectangle => "ROUND_RECTANGLE",
            Self::Octagon => "OCTAGON",
            Self::Hexagon => "HEXAGON",
            Self::Circle => "CIRCLE",
            Self::Oval => "OVAL",
            Self::Diamond => "DIAMOND",
            Self::Folder => "FOLDER",
            Self::Port => "PORT",
        }
    }
}

/// Drawing symbol of an entity, independent of its shape family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Symbol {
    #[default]
    Default,
    Hexagon,
    Folder,
    Node,
    Cloud,
    Database,
}

/// The pre-rendered image of an entity: its size and shape family.
///
/// Painting is done elsewhere; layout only needs the dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EntityImage {
    size: Size,
    shape: ShapeType,
    symbol: Symbol,
}

impl EntityImage {
    pub fn new(size: Size, shape: ShapeType) -> Self {
        Self {
            size,
            shape,
            symbol: Symbol::Default,
        }
    }

    pub fn with_symbol(mut self, symbol: Symbol) -> Self {
        self.symbol = symbol;
        self
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn shape(&self) -> ShapeType {
        self.shape
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }
}

/// Sizes of the note regions attached above and below a group.
///
/// Only honored in compatibility mode.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroupNotes {
    pub top: Option<Size>,
    pub bottom: Option<Size>,
}

/// A node or a group.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    uid: Id,
    name: String,
    kind: EntityKind,
    image: EntityImage,
    removed: bool,
    packed: bool,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    notes: GroupNotes,
}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Stable uid, also used as the node name in layout requests.
    pub fn uid(&self) -> Id {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, EntityKind::Group(_))
    }

    /// Returns the leaf kind, or `None` for groups.
    pub fn leaf_kind(&self) -> Option<LeafKind> {
        match self.kind {
            EntityKind::Leaf(kind) => Some(kind),
            EntityKind::Group(_) => None,
        }
    }

    /// Returns the group kind, or `None` for leaves.
    pub fn group_kind(&self) -> Option<GroupKind> {
        match self.kind {
            EntityKind::Group(kind) => Some(kind),
            EntityKind::Leaf(_) => None,
        }
    }

    pub fn image(&self) -> &EntityImage {
        &self.image
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Packed groups are laid out by their own strategy and are not searched
    /// for in the engine response.
    pub fn is_packed(&self) -> bool {
        self.packed
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn notes(&self) -> &GroupNotes {
        &self.notes
    }

    pub fn set_removed(&mut self, removed: bool) {
        self.removed = removed;
    }

    pub fn set_packed(&mut self, packed: bool) {
        self.packed = packed;
    }

    pub fn set_image(&mut self, image: EntityImage) {
        self.image = image;
    }

    pub fn set_notes(&mut self, notes: GroupNotes) {
        self.notes = notes;
    }
}

/// Decoration drawn at one end of a link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkDecor {
    #[default]
    None,
    Arrow,
    Extends,
    Redefines,
    Composition,
    Aggregation,
}

impl LinkDecor {
    /// Space, in pixels, the decoration takes at its end of the link.
    pub fn margin(self) -> f32 {
        match self {
            Self::None => 2.0,
            Self::Arrow => 10.0,
            Self::Extends | Self::Redefines => 30.0,
            Self::Composition | Self::Aggregation => 15.0,
        }
    }

    /// Inheritance-style decorations, eligible for fan-in merging.
    pub fn is_extends_like(self) -> bool {
        matches!(self, Self::Extends | Self::Redefines)
    }
}

/// A typed edge between two entities.
#[derive(Debug, Clone)]
pub struct Link {
    id: LinkId,
    uid: Id,
    source: EntityId,
    target: EntityId,
    head: LinkDecor,
    tail: LinkDecor,
    label: Option<String>,
    head_label: Option<String>,
    tail_label: Option<String>,
    length: u32,
    invisible: bool,
    removed: bool,
    sametail: Option<Id>,
}

impl Link {
    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn uid(&self) -> Id {
        self.uid
    }

    pub fn source(&self) -> EntityId {
        self.source
    }

    pub fn target(&self) -> EntityId {
        self.target
    }

    /// Returns the endpoint opposite to `entity`, or `None` if the link does
    /// not touch `entity`.
    pub fn other(&self, entity: EntityId) -> Option<EntityId> {
        if entity == self.source {
            Some(self.target)
        } else if entity == self.target {
            Some(self.source)
        } else {
            None
        }
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.source == entity || self.target == entity
    }

    pub fn is_self_link(&self) -> bool {
        self.source == self.target
    }

    /// Decoration at the target end.
    pub fn head(&self) -> LinkDecor {
        self.head
    }

    /// Decoration at the source end.
    pub fn tail(&self) -> LinkDecor {
        self.tail
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn head_label(&self) -> Option<&str> {
        self.head_label.as_deref()
    }

    pub fn tail_label(&self) -> Option<&str> {
        self.tail_label.as_deref()
    }

    pub fn has_any_label(&self) -> bool {
        self.label.is_some() || self.head_label.is_some() || self.tail_label.is_some()
    }

    /// Rank length. A length of 1 keeps both ends on the same rank.
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn is_invisible(&self) -> bool {
        self.invisible
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Explicit sametail key supplied with the link.
    pub fn sametail(&self) -> Option<Id> {
        self.sametail
    }

    pub fn set_head(&mut self, decor: LinkDecor) -> &mut Self {
        self.head = decor;
        self
    }

    pub fn set_tail(&mut self, decor: LinkDecor) -> &mut Self {
        self.tail = decor;
        self
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = Some(label.into());
        self
    }

    pub fn set_head_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.head_label = Some(label.into());
        self
    }

    pub fn set_tail_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.tail_label = Some(label.into());
        self
    }

    /// Sets the rank length. Values below 1 are raised to 1.
    pub fn set_length(&mut self, length: u32) -> &mut Self {
        self.length = length.max(1);
        self
    }

    pub fn set_invisible(&mut self, invisible: bool) -> &mut Self {
        self.invisible = invisible;
        self
    }

    pub fn set_removed(&mut self, removed: bool) -> &mut Self {
        self.removed = removed;
        self
    }

    pub fn set_sametail(&mut self, key: Option<Id>) -> &mut Self {
        self.sametail = key;
        self
    }
}

/// Arena of entities and links making up one diagram.
#[derive(Debug, Clone)]
pub struct Diagram {
    kind: DiagramKind,
    entities: Vec<Entity>,
    links: Vec<Link>,
    source: String,
}

impl Diagram {
    /// Creates an empty diagram holding only its root group.
    pub fn new(kind: DiagramKind) -> Self {
        let root = Entity {
            id: EntityId(0),
            uid: Id::entity(0),
            name: String::new(),
            kind: EntityKind::Group(GroupKind::Root),
            image: EntityImage::default(),
            removed: false,
            packed: false,
            parent: None,
            children: Vec::new(),
            notes: GroupNotes::default(),
        };
        Self {
            kind,
            entities: vec![root],
            links: Vec::new(),
            source: String::new(),
        }
    }

    pub fn kind(&self) -> DiagramKind {
        self.kind
    }

    pub fn root(&self) -> EntityId {
        EntityId(0)
    }

    /// The source text the diagram was built from, reported with render
    /// failures.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    /// Adds a leaf under `parent`.
    ///
    /// # Errors
    ///
    /// Fails if `parent` does not exist or is not a group.
    pub fn add_leaf(
        &mut self,
        name: &str,
        kind: LeafKind,
        image: EntityImage,
        parent: EntityId,
    ) -> Result<EntityId, ModelError> {
        self.push_entity(name, EntityKind::Leaf(kind), image, parent)
    }

    /// Adds a group under `parent`.
    ///
    /// # Errors
    ///
    /// Fails if `parent` does not exist or is not a group.
    pub fn add_group(
        &mut self,
        name: &str,
        kind: GroupKind,
        parent: EntityId,
    ) -> Result<EntityId, ModelError> {
        self.push_entity(name, EntityKind::Group(kind), EntityImage::default(), parent)
    }

    fn push_entity(
        &mut self,
        name: &str,
        kind: EntityKind,
        image: EntityImage,
        parent: EntityId,
    ) -> Result<EntityId, ModelError> {
        let parent_entity = self
            .entities
            .get(parent.0)
            .ok_or(ModelError::UnknownEntity(parent))?;
        if !parent_entity.is_group() {
            return Err(ModelError::NotAGroup(parent_entity.name.clone()));
        }

        let id = EntityId(self.entities.len());
        self.entities.push(Entity {
            id,
            uid: Id::entity(id.0),
            name: name.to_string(),
            kind,
            image,
            removed: false,
            packed: false,
            parent: Some(parent),
            children: Vec::new(),
            notes: GroupNotes::default(),
        });
        self.entities[parent.0].children.push(id);
        Ok(id)
    }

    /// Adds a link of length 1 without decorations and returns it for
    /// further configuration.
    ///
    /// # Errors
    ///
    /// Fails if either endpoint does not exist.
    pub fn add_link(
        &mut self,
        source: EntityId,
        target: EntityId,
    ) -> Result<&mut Link, ModelError> {
        for endpoint in [source, target] {
            if endpoint.0 >= self.entities.len() {
                return Err(ModelError::UnknownEntity(endpoint));
            }
        }

        let id = LinkId(self.links.len());
        self.links.push(Link {
            id,
            uid: Id::link(id.0),
            source,
            target,
            head: LinkDecor::None,
            tail: LinkDecor::None,
            label: None,
            head_label: None,
            tail_label: None,
            length: 1,
            invisible: false,
            removed: false,
            sametail: None,
        });
        Ok(&mut self.links[id.0])
    }

    /// Returns the entity at `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this diagram.
    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0]
    }

    /// Returns the link at `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this diagram.
    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    pub fn link_mut(&mut self, id: LinkId) -> &mut Link {
        &mut self.links[id.0]
    }

    /// All entities, root included, in insertion order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Looks an entity up by its uid.
    pub fn find_by_uid(&self, uid: Id) -> Option<&Entity> {
        self.entities.iter().find(|e| e.uid == uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> EntityImage {
        EntityImage::new(Size::new(10.0, 10.0), ShapeType::Rectangle)
    }

    #[test]
    fn test_new_diagram_has_root() {
        let diagram = Diagram::new(DiagramKind::State);
        let root = diagram.entity(diagram.root());
        assert_eq!(root.group_kind(), Some(GroupKind::Root));
        assert!(root.parent().is_none());
        assert_eq!(diagram.entities().len(), 1);
    }

    #[test]
    fn test_add_leaf_records_hierarchy() {
        let mut diagram = Diagram::new(DiagramKind::Class);
        let root = diagram.root();
        let group = diagram.add_group("pkg", GroupKind::Package, root).unwrap();
        let leaf = diagram
            .add_leaf("A", LeafKind::Class, image(), group)
            .unwrap();

        assert_eq!(diagram.entity(leaf).parent(), Some(group));
        assert_eq!(diagram.entity(group).children(), &[leaf]);
        assert_eq!(diagram.entity(root).children(), &[group]);
        assert_eq!(diagram.entity(leaf).uid(), "ent0002");
    }

    #[test]
    fn test_leaf_cannot_contain_children() {
        let mut diagram = Diagram::new(DiagramKind::Class);
        let root = diagram.root();
        let leaf = diagram.add_leaf("A", LeafKind::Class, image(), root).unwrap();
        let err = diagram
            .add_leaf("B", LeafKind::Class, image(), leaf)
            .unwrap_err();
        assert_eq!(err, ModelError::NotAGroup("A".to_string()));
    }

    #[test]
    fn test_add_link_unknown_endpoint() {
        let mut diagram = Diagram::new(DiagramKind::Class);
        let root = diagram.root();
        let a = diagram.add_leaf("A", LeafKind::Class, image(), root).unwrap();
        let err = diagram.add_link(a, EntityId(42)).unwrap_err();
        assert_eq!(err, ModelError::UnknownEntity(EntityId(42)));
    }

    #[test]
    fn test_link_other_endpoint() {
        let mut diagram = Diagram::new(DiagramKind::Class);
        let root = diagram.root();
        let a = diagram.add_leaf("A", LeafKind::Class, image(), root).unwrap();
        let b = diagram.add_leaf("B", LeafKind::Class, image(), root).unwrap();
        let c = diagram.add_leaf("C", LeafKind::Class, image(), root).unwrap();
        let link = diagram.add_link(a, b).unwrap();

        assert_eq!(link.other(a), Some(b));
        assert_eq!(link.other(b), Some(a));
        assert_eq!(link.other(c), None);
        assert_eq!(link.uid(), "lnk0000");
    }

    #[test]
    fn test_link_length_is_at_least_one() {
        let mut diagram = Diagram::new(DiagramKind::Class);
        let root = diagram.root();
        let a = diagram.add_leaf("A", LeafKind::Class, image(), root).unwrap();
        let link = diagram.add_link(a, a).unwrap();
        link.set_length(0);
        assert_eq!(link.length(), 1);
        assert!(link.is_self_link());
    }

    #[test]
    fn test_decor_margins() {
        assert_eq!(LinkDecor::None.margin(), 2.0);
        assert_eq!(LinkDecor::Arrow.margin(), 10.0);
        assert_eq!(LinkDecor::Extends.margin(), 30.0);
        assert!(LinkDecor::Redefines.is_extends_like());
        assert!(!LinkDecor::Composition.is_extends_like());
    }

    #[test]
    fn test_like_class() {
        assert!(LeafKind::Interface.is_like_class());
        assert!(!LeafKind::Note.is_like_class());
        assert!(!LeafKind::EmptyPackage.is_like_class());
    }
}
