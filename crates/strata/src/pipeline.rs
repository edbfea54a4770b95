//! The end-to-end layout of one diagram.
//!
//! [`DiagramPipeline::run`] short-circuits degenerate diagrams, populates a
//! fresh [`LayoutRegistry`] from the diagram's group hierarchy, submits the
//! request through the configured [`LayoutEngine`] and converts the solved
//! registry into a [`LayoutOutcome`].

use std::{collections::HashMap, sync::OnceLock};

use log::{debug, error, info, warn};
use regex::Regex;

use strata_core::{
    geometry::Size,
    identifier::Id,
    model::{
        Diagram, DiagramKind, Entity, EntityId, EntityKind, GroupKind, LeafKind, Link, LinkId,
        ShapeType, Symbol,
    },
    text::StringBounder,
};

use crate::{
    config::AppConfig,
    engine::{EngineError, LayoutEngine},
    error::{LayoutError, StrataError},
    layout::{
        cluster::ClusterHeader,
        edge::EdgeLine,
        node::{OpaleWiring, ShapeNode},
        registry::LayoutRegistry,
        request::LayoutRequestBuilder,
    },
    outcome::{LayoutOutcome, PositionedDiagram},
    structure::GraphModel,
};

/// Canvas of a diagram with nothing to lay out.
const EMPTY_CANVAS: f32 = 10.0;

/// Padding added around the name of a group drawn as an empty package.
const EMPTY_PACKAGE_PADDING: f32 = 10.0;

/// Extracts the version from the `<!-- Generated by graphviz … -->` comment.
///
/// ```
/// # use strata::pipeline::engine_version_of;
/// let svg = "<!-- Generated by graphviz version 2.43.0 (0)\n -->";
/// assert_eq!(engine_version_of(svg).as_deref(), Some("version 2.43.0 (0)"));
/// assert!(engine_version_of("<svg/>").is_none());
/// ```
pub fn engine_version_of(document: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?mi)!-- generated by graphviz(.*)").expect("version comment regex should be valid")
    });
    re.captures(document)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Lays out diagrams with one engine, one text measurer and one configuration.
pub struct DiagramPipeline<'a> {
    config: &'a AppConfig,
    engine: &'a dyn LayoutEngine,
    bounder: &'a dyn StringBounder,
}

impl<'a> DiagramPipeline<'a> {
    pub fn new(
        config: &'a AppConfig,
        engine: &'a dyn LayoutEngine,
        bounder: &'a dyn StringBounder,
    ) -> Self {
        Self {
            config,
            engine,
            bounder,
        }
    }

    /// Lays out `diagram`.
    ///
    /// # Errors
    ///
    /// [`StrataError::Config`] for an invalid background color and
    /// [`StrataError::Render`] for a failed layout, including a runtime crash
    /// that survives the retry. An engine that cannot be started or returns
    /// nothing, and a missing executable, are reported as outcomes.
    pub fn run(&self, diagram: &Diagram) -> Result<LayoutOutcome, StrataError> {
        let background = self
            .config
            .style()
            .background_color()
            .map_err(StrataError::Config)?;

        let mut model = GraphModel::new(diagram);
        info!(diagram_kind:? = diagram.kind(); "Building layout");

        if model.is_degenerate_with(0) {
            debug!("Diagram is empty");
            return Ok(LayoutOutcome::Empty {
                size: Size::new(EMPTY_CANVAS, EMPTY_CANVAS),
            });
        }
        if model.is_degenerate_with(1)
            && diagram.kind() != DiagramKind::State
            && let Some(single) = model.leaves().next()
            && single.parent() == Some(model.root())
            && single.image().symbol() != Symbol::Hexagon
        {
            debug!(uid = single.uid().to_string(); "Single entity, bypassing the engine");
            return Ok(LayoutOutcome::Single {
                entity: single.id(),
                image: *single.image(),
                background,
            });
        }

        let layout = self.config.layout();
        model.reduce_sametails(layout.group_inheritance());

        let anchored = layout.swimlanes() && diagram.kind() == DiagramKind::Activity;
        let mut registry = LayoutRegistry::new(diagram.entity(model.root()), anchored);
        let widest_class = if layout.same_class_width() {
            self.widest_class(&model)
        } else {
            None
        };

        let root = model.root();
        self.add_groups(&mut registry, &mut model, root, widest_class)
            .map_err(|err| StrataError::new_render_error(err, diagram.source(), None))?;
        for leaf in model.unpackaged_leaves() {
            self.add_shape(&mut registry, &model, leaf, widest_class);
        }
        self.add_edges(&mut registry, &model);
        info!(
            shapes = registry.nodes().len(),
            edges = registry.edges().len(),
            regions = registry.tree().regions().count();
            "Layout registry populated"
        );

        let executable_state = self.engine.executable_state();
        if !executable_state.is_usable() {
            let path = self
                .engine
                .executable()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string());
            warn!(path = path.as_str(), state = executable_state.message(); "No usable layout engine");
            return Ok(LayoutOutcome::MissingEngine {
                lines: vec![
                    format!("Dot Executable: {path}"),
                    executable_state.message().to_string(),
                    "Cannot find Graphviz.".to_string(),
                    "Set `engine.dot_path` or the GRAPHVIZ_DOT environment variable.".to_string(),
                ],
            });
        }

        let builder =
            LayoutRequestBuilder::new(layout, diagram.kind()).with_trace(self.config.trace());
        let submission = match builder.submit(&registry, self.engine) {
            Ok(submission) => submission,
            Err(LayoutError::Engine(
                err @ (EngineError::Io(_) | EngineError::Spawn { .. } | EngineError::NoExecutable),
            )) => {
                error!(err:% = err; "Layout engine failed");
                return Ok(LayoutOutcome::Crash {
                    source: diagram.source().to_string(),
                    cause: err.to_string(),
                });
            }
            Err(err) => return Err(StrataError::new_render_error(err, diagram.source(), None)),
        };
        if submission.document.is_empty() {
            error!("Layout engine returned an empty document");
            return Ok(LayoutOutcome::Crash {
                source: diagram.source().to_string(),
                cause: LayoutError::EmptyResponse.to_string(),
            });
        }

        let engine_version = engine_version_of(&submission.document);
        debug!(engine_version:? = engine_version, attempts = submission.attempts; "Engine answered");
        let canvas = builder
            .solve(&mut registry, &submission.document)
            .map_err(|err| {
                StrataError::new_render_error(err, diagram.source(), engine_version.clone())
            })?;

        let positioned = PositionedDiagram::from_registry(
            &registry,
            |entity| diagram.entity(entity).name().to_string(),
            model.fan_ins().cloned().collect(),
            canvas,
        )
        .with_background(background)
        .with_engine(engine_version, submission.attempts);

        if let Some(limit) = layout.width_limit() {
            for line in positioned.width_warnings(limit) {
                warn!(limit = limit; "{}", line.trim_end());
            }
        }
        info!(width = canvas.width(), height = canvas.height(); "Layout solved");
        Ok(LayoutOutcome::Positioned(positioned))
    }

    fn widest_class(&self, model: &GraphModel<'_>) -> Option<f32> {
        model
            .leaves()
            .filter(|leaf| leaf.leaf_kind().is_some_and(LeafKind::is_like_class))
            .map(|leaf| leaf.image().size().width())
            .reduce(f32::max)
    }

    fn add_shape(
        &self,
        registry: &mut LayoutRegistry,
        model: &GraphModel<'_>,
        id: EntityId,
        widest_class: Option<f32>,
    ) {
        let entity = model.entity(id);
        let Some(kind) = model.effective_leaf_kind(id) else {
            return;
        };
        let (shape, size) = if model.is_muted(id) {
            let title = ClusterHeader::measure(entity.name(), self.bounder).title();
            (ShapeType::Folder, title.grow(EMPTY_PACKAGE_PADDING))
        } else {
            (entity.image().shape(), entity.image().size())
        };
        let mut node = ShapeNode::new(id, entity.uid(), kind, shape, size);
        if let Some(width) = widest_class
            && kind.is_like_class()
        {
            node.set_width(width);
        }
        registry.add_node(node);
    }

    fn add_groups(
        &self,
        registry: &mut LayoutRegistry,
        model: &mut GraphModel<'_>,
        parent: EntityId,
        widest_class: Option<f32>,
    ) -> Result<(), LayoutError> {
        let hide_empty = self.config.layout().hide_empty_description();
        for group in model.child_groups(parent) {
            let entity = model.entity(group);
            let kind = entity.group_kind();
            if model.is_empty_group(group) && (kind == Some(GroupKind::Package) || hide_empty) {
                model.mute_to_empty_package(group);
                self.add_shape(registry, model, group, widest_class);
                continue;
            }
            if kind == Some(GroupKind::ConcurrentState) {
                debug!(uid = entity.uid().to_string(); "Concurrent state is not laid out as a region");
                continue;
            }

            let header = ClusterHeader::measure(entity.name(), self.bounder);
            registry.open_cluster(header, entity);
            for leaf in model.child_leaves(group) {
                self.add_shape(registry, model, leaf, widest_class);
            }
            self.add_groups(registry, model, group, widest_class)?;
            registry.close_cluster()?;
        }
        Ok(())
    }

    fn add_edges(&self, registry: &mut LayoutRegistry, model: &GraphModel<'_>) {
        let opales = self.absorbable_notes(model);
        for link in model.links() {
            let mut edge = match self.edge_for(registry, model, link) {
                Ok(edge) => edge,
                Err(err) => {
                    error!(link = link.uid().to_string(), err:% = err; "Cannot lay out link, skipping");
                    continue;
                }
            };
            if let Some((note, other)) = opales.get(&link.id())
                && registry.node(*other).is_some()
            {
                edge.set_opale(true);
                if let Some(node) = registry.node_mut(*note) {
                    node.attach_opale(OpaleWiring {
                        link: link.id(),
                        other: *other,
                    });
                }
            }
            registry.add_edge(edge);
        }
    }

    fn edge_for(
        &self,
        registry: &mut LayoutRegistry,
        model: &GraphModel<'_>,
        link: &Link,
    ) -> Result<EdgeLine, LayoutError> {
        let endpoint = |entity: &Entity| {
            registry
                .endpoint(entity)
                .ok_or_else(|| LayoutError::UnresolvedEndpoint {
                    link: link.uid().to_string(),
                    entity: entity.uid().to_string(),
                })
        };
        let source = endpoint(model.entity(link.source()))?;
        let target = endpoint(model.entity(link.target()))?;
        Ok(EdgeLine::new(
            link,
            source,
            target,
            model.sametail(link.id()),
            registry.colors_mut(),
            self.bounder,
        ))
    }

    /// Notes that can be drawn merged with their only link, keyed by that
    /// link, with the note uid and the uid of the other end.
    fn absorbable_notes(&self, model: &GraphModel<'_>) -> HashMap<LinkId, (Id, Id)> {
        let mut absorbable = HashMap::new();
        if self.config.layout().strict_uml_style() {
            return absorbable;
        }
        for note in model
            .leaves()
            .filter(|leaf| matches!(leaf.kind(), EntityKind::Leaf(LeafKind::Note)))
        {
            let mut visible = model
                .links()
                .filter(|link| link.contains(note.id()) && !link.is_invisible());
            let (Some(link), None) = (visible.next(), visible.next()) else {
                continue;
            };
            let Some(other) = link.other(note.id()).map(|id| model.entity(id)) else {
                continue;
            };
            if other.leaf_kind() == Some(LeafKind::Note) {
                continue;
            }
            absorbable.insert(link.id(), (note.uid(), other.uid()));
        }
        absorbable
    }
}
