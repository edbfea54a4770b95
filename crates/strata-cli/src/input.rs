//! Diagram descriptions read by the CLI.
//!
//! The CLI does not parse a diagram language. It reads a TOML description of
//! the already-measured entities, groups and links:
//!
//! ```toml
//! kind = "class"
//!
//! [[groups]]
//! name = "zoo"
//! kind = "package"
//!
//! [[entities]]
//! name = "Animal"
//! kind = "abstract-class"
//! width = 96
//! height = 48
//! parent = "zoo"
//!
//! [[links]]
//! from = "Dog"
//! to = "Animal"
//! head = "extends"
//! ```
//!
//! Groups are created in file order, so a group's parent must be declared
//! before it. Names must be unique across groups and entities.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use strata::{
    StrataError,
    geometry::Size,
    model::{
        Diagram, DiagramKind, EntityId, EntityImage, GroupKind, GroupNotes, LeafKind, LinkDecor,
        ModelError, ShapeType, Symbol,
    },
};

/// Errors in a diagram description.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to parse diagram description: {0}")]
    Parse(String),

    #[error("Duplicate name `{0}`")]
    DuplicateName(String),

    #[error("Unknown reference `{0}`")]
    UnknownReference(String),

    #[error("Invalid size for `{name}`: {width}x{height}")]
    InvalidSize { name: String, width: f32, height: f32 },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<InputError> for StrataError {
    fn from(err: InputError) -> Self {
        StrataError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            err.to_string(),
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DiagramFile {
    #[serde(default)]
    kind: DiagramKind,
    #[serde(default)]
    groups: Vec<GroupSpec>,
    #[serde(default)]
    entities: Vec<EntitySpec>,
    #[serde(default)]
    links: Vec<LinkSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupSpec {
    name: String,
    kind: GroupKind,
    parent: Option<String>,
    #[serde(default)]
    packed: bool,
    note_top: Option<[f32; 2]>,
    note_bottom: Option<[f32; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntitySpec {
    name: String,
    kind: LeafKind,
    #[serde(default)]
    shape: ShapeType,
    #[serde(default)]
    symbol: Symbol,
    width: f32,
    height: f32,
    parent: Option<String>,
    #[serde(default)]
    removed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinkSpec {
    from: String,
    to: String,
    #[serde(default)]
    head: LinkDecor,
    #[serde(default)]
    tail: LinkDecor,
    label: Option<String>,
    head_label: Option<String>,
    tail_label: Option<String>,
    #[serde(default = "default_length")]
    length: u32,
    #[serde(default)]
    invisible: bool,
}

fn default_length() -> u32 {
    1
}

fn size_of(note: Option<[f32; 2]>) -> Option<Size> {
    note.map(|[width, height]| Size::new(width, height))
}

/// Builds a diagram from its TOML description. The description itself is
/// kept as the diagram source for error reports.
///
/// # Errors
///
/// Returns [`InputError`] for malformed TOML, duplicate names, references to
/// undeclared names and non-positive entity sizes.
pub fn parse_diagram(source: &str) -> Result<Diagram, InputError> {
    let file: DiagramFile = toml::from_str(source).map_err(|e| InputError::Parse(e.to_string()))?;

    let mut diagram = Diagram::new(file.kind);
    diagram.set_source(source);
    let root = diagram.root();
    let mut names: HashMap<String, EntityId> = HashMap::new();

    let resolve = |names: &HashMap<String, EntityId>, name: Option<&String>| match name {
        None => Ok(root),
        Some(name) => names
            .get(name)
            .copied()
            .ok_or_else(|| InputError::UnknownReference(name.clone())),
    };

    for group in &file.groups {
        if names.contains_key(&group.name) {
            return Err(InputError::DuplicateName(group.name.clone()));
        }
        let parent = resolve(&names, group.parent.as_ref())?;
        let id = diagram.add_group(&group.name, group.kind, parent)?;
        let entity = diagram.entity_mut(id);
        entity.set_packed(group.packed);
        entity.set_notes(GroupNotes {
            top: size_of(group.note_top),
            bottom: size_of(group.note_bottom),
        });
        names.insert(group.name.clone(), id);
    }

    for entry in &file.entities {
        if names.contains_key(&entry.name) {
            return Err(InputError::DuplicateName(entry.name.clone()));
        }
        if entry.width <= 0.0 || entry.height <= 0.0 {
            return Err(InputError::InvalidSize {
                name: entry.name.clone(),
                width: entry.width,
                height: entry.height,
            });
        }
        let parent = resolve(&names, entry.parent.as_ref())?;
        let image = EntityImage::new(Size::new(entry.width, entry.height), entry.shape)
            .with_symbol(entry.symbol);
        let id = diagram.add_leaf(&entry.name, entry.kind, image, parent)?;
        diagram.entity_mut(id).set_removed(entry.removed);
        names.insert(entry.name.clone(), id);
    }

    for entry in &file.links {
        let from = resolve(&names, Some(&entry.from))?;
        let to = resolve(&names, Some(&entry.to))?;
        let link = diagram.add_link(from, to)?;
        link.set_head(entry.head)
            .set_tail(entry.tail)
            .set_length(entry.length.max(1))
            .set_invisible(entry.invisible);
        if let Some(label) = &entry.label {
            link.set_label(label.as_str());
        }
        if let Some(label) = &entry.head_label {
            link.set_head_label(label.as_str());
        }
        if let Some(label) = &entry.tail_label {
            link.set_tail_label(label.as_str());
        }
    }

    Ok(diagram)
}
