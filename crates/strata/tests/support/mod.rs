//! Synthetic layout engines for integration tests.
//!
//! [`FakeDot`] reads the request text back and answers with a document laid
//! out the way Graphviz writes its SVG: shapes in one row, regions wrapped
//! around their members with their keyed title cells, edges stroked with
//! their key color. It does no real layout; it only has to produce a
//! response the solver can read.

#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt::Write,
    path::PathBuf,
    sync::OnceLock,
};

use regex::Regex;

use strata::engine::{
    EngineError, EngineOutput, EngineVersion, ExecutableState, LayoutEngine, OutputFormat,
    ProcessState,
};

/// Declared document height. Diagram space is engine space moved down by it.
pub const DOCUMENT_HEIGHT: f32 = 400.0;
/// Diagram-space top of every shape.
pub const ROW_TOP: f32 = 100.0;
const ROW_GAP: f32 = 20.0;
const REGION_PADDING: f32 = 8.0;

/// How rounded rectangles are drawn in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundedOutline {
    /// One `path` element, as recent Graphviz releases do.
    Path,
    /// Four `polygon` elements, one per side, as older releases do.
    Polygons,
}

pub struct FakeDot {
    version: Option<EngineVersion>,
    rounded: RoundedOutline,
    state: ExecutableState,
    crashes: Cell<usize>,
    requests: RefCell<Vec<String>>,
    version_requests: RefCell<Vec<bool>>,
}

impl FakeDot {
    pub fn new() -> Self {
        Self {
            version: Some(EngineVersion::new(2, 43, 0)),
            rounded: RoundedOutline::Path,
            state: ExecutableState::Ok,
            crashes: Cell::new(0),
            requests: RefCell::new(Vec::new()),
            version_requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_version(mut self, version: Option<EngineVersion>) -> Self {
        self.version = version;
        self
    }

    pub fn with_rounded(mut self, rounded: RoundedOutline) -> Self {
        self.rounded = rounded;
        self
    }

    pub fn with_state(mut self, state: ExecutableState) -> Self {
        self.state = state;
        self
    }

    /// Crash the runtime on the next `count` submissions.
    pub fn crashing(self, count: usize) -> Self {
        self.crashes.set(count);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn version_requests(&self) -> Vec<bool> {
        self.version_requests.borrow().clone()
    }
}

impl LayoutEngine for FakeDot {
    fn name(&self) -> &str {
        "fake-dot"
    }

    fn submit(&self, request: &str, _format: OutputFormat) -> Result<EngineOutput, EngineError> {
        self.requests.borrow_mut().push(request.to_string());
        let crashes = self.crashes.get();
        if crashes > 0 {
            self.crashes.set(crashes - 1);
            return Err(EngineError::RuntimeCrash {
                cause: "simulated runtime crash".to_string(),
            });
        }
        Ok(EngineOutput::ok(respond(request, self.version, self.rounded)))
    }

    fn executable(&self) -> Option<PathBuf> {
        Some(PathBuf::from("/opt/graphviz/bin/dot"))
    }

    fn executable_state(&self) -> ExecutableState {
        self.state
    }

    fn version(&self, refresh: bool) -> Option<EngineVersion> {
        self.version_requests.borrow_mut().push(refresh);
        self.version
    }
}

/// Answers every submission with the same document and state.
pub struct StaticEngine {
    document: String,
    state: ProcessState,
    cause: Option<String>,
}

impl StaticEngine {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            state: ProcessState::TerminatedOk,
            cause: None,
        }
    }

    pub fn terminated(mut self, state: ProcessState, cause: &str) -> Self {
        self.state = state;
        self.cause = Some(cause.to_string());
        self
    }
}

impl LayoutEngine for StaticEngine {
    fn name(&self) -> &str {
        "static"
    }

    fn submit(&self, _request: &str, _format: OutputFormat) -> Result<EngineOutput, EngineError> {
        Ok(EngineOutput {
            document: self.document.clone(),
            state: self.state,
            cause: self.cause.clone(),
        })
    }

    fn executable(&self) -> Option<PathBuf> {
        None
    }

    fn executable_state(&self) -> ExecutableState {
        ExecutableState::Embedded
    }

    fn version(&self, _refresh: bool) -> Option<EngineVersion> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl Rect {
    fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x + width,
            y1: y + height,
        }
    }

    fn union(self, other: Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    fn center(self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    fn corners(self) -> Vec<(f32, f32)> {
        vec![
            (self.x0, self.y1),
            (self.x0, self.y0),
            (self.x1, self.y0),
            (self.x1, self.y1),
            (self.x0, self.y1),
        ]
    }
}

#[derive(Default)]
struct OpenRegion {
    uid: String,
    color: String,
    cells: Vec<(String, f32, f32)>,
    members: Option<Rect>,
    packed: bool,
}

impl OpenRegion {
    fn include(&mut self, rect: Rect) {
        self.members = Some(match self.members {
            Some(members) => members.union(rect),
            None => rect,
        });
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

fn node_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"^(\w+) \[shape=(\w+)(,style=rounded)?,label="",width=([\d.]+),height=([\d.]+),fixedsize=true\];$"#,
    )
}

fn point_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^(\w+) \[shape=point,")
}

fn subgraph_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^subgraph cluster(\w+) \{$")
}

fn region_color_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#"^color="(#[0-9a-f]{6})";$"#)
}

fn cell_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"BGCOLOR="(#[0-9a-f]{6})" FIXEDSIZE="TRUE" WIDTH="(\d+)" HEIGHT="(\d+)""#,
    )
}

fn edge_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^(\w+)->(\w+)\[(.*)\];$")
}

fn edge_color_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#",color="(#[0-9a-f]{6})""#)
}

fn edge_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"(xlabel|headlabel|taillabel|label)=<<TABLE[^>]*><TR><TD BGCOLOR="(#[0-9a-f]{6})" FIXEDSIZE="TRUE" WIDTH="(\d+)" HEIGHT="(\d+)""#,
    )
}

fn engine_points(points: &[(f32, f32)]) -> String {
    points
        .iter()
        .map(|(x, y)| format!("{x:.2},{:.2}", y - DOCUMENT_HEIGHT))
        .collect::<Vec<_>>()
        .join(" ")
}

fn polygon(fill: &str, stroke: &str, points: &[(f32, f32)]) -> String {
    format!(
        "<polygon fill=\"{fill}\" stroke=\"{stroke}\" points=\"{}\"/>\n",
        engine_points(points)
    )
}

fn inches(value: &str) -> f32 {
    value.parse::<f32>().unwrap() * 72.0
}

fn shape_element(shape: &str, rounded: bool, rect: Rect, outline: RoundedOutline) -> String {
    let (cx, cy) = rect.center();
    let (w, h) = (rect.x1 - rect.x0, rect.y1 - rect.y0);
    match (shape, rounded) {
        ("rect", true) => {
            let r = 4.0;
            match outline {
                RoundedOutline::Path => {
                    let corners = [
                        (rect.x0 + r, rect.y0),
                        (rect.x0, rect.y0),
                        (rect.x0, rect.y0),
                        (rect.x0, rect.y0 + r),
                        (rect.x0, rect.y1 - r),
                        (rect.x0, rect.y1),
                        (rect.x0, rect.y1),
                        (rect.x0 + r, rect.y1),
                        (rect.x1 - r, rect.y1),
                        (rect.x1, rect.y1),
                        (rect.x1, rect.y1),
                        (rect.x1, rect.y1 - r),
                        (rect.x1, rect.y0 + r),
                    ];
                    let mut d = String::new();
                    for (idx, (x, y)) in corners.iter().enumerate() {
                        let command = match idx {
                            0 => "M",
                            1 | 5 | 9 => "C",
                            4 | 8 | 12 => "L",
                            _ => " ",
                        };
                        let _ = write!(d, "{command}{x:.2},{:.2}", y - DOCUMENT_HEIGHT);
                    }
                    format!("<path fill=\"none\" stroke=\"black\" d=\"{d}Z\"/>\n")
                }
                RoundedOutline::Polygons => [
                    [(rect.x0 + r, rect.y0), (rect.x1 - r, rect.y0)],
                    [(rect.x1, rect.y0 + r), (rect.x1, rect.y1 - r)],
                    [(rect.x1 - r, rect.y1), (rect.x0 + r, rect.y1)],
                    [(rect.x0, rect.y1 - r), (rect.x0, rect.y0 + r)],
                ]
                .iter()
                .map(|side| polygon("none", "black", side))
                .collect(),
            }
        }
        ("circle" | "ellipse", _) => format!(
            "<ellipse fill=\"none\" stroke=\"black\" cx=\"{cx:.2}\" cy=\"{:.2}\" rx=\"{:.2}\" ry=\"{:.2}\"/>\n",
            cy - DOCUMENT_HEIGHT,
            w / 2.0,
            h / 2.0
        ),
        ("diamond", _) => polygon(
            "none",
            "black",
            &[
                (cx, rect.y0),
                (rect.x1, cy),
                (cx, rect.y1),
                (rect.x0, cy),
                (cx, rect.y0),
            ],
        ),
        ("hexagon", _) => polygon(
            "none",
            "black",
            &[
                (rect.x1, cy),
                (rect.x1 - w / 4.0, rect.y1),
                (rect.x0 + w / 4.0, rect.y1),
                (rect.x0, cy),
                (rect.x0 + w / 4.0, rect.y0),
                (rect.x1 - w / 4.0, rect.y0),
                (rect.x1, cy),
            ],
        ),
        ("octagon", _) => {
            let (qx, qy) = (w / 4.0, h / 4.0);
            polygon(
                "none",
                "black",
                &[
                    (rect.x1, rect.y0 + qy),
                    (rect.x1, rect.y1 - qy),
                    (rect.x1 - qx, rect.y1),
                    (rect.x0 + qx, rect.y1),
                    (rect.x0, rect.y1 - qy),
                    (rect.x0, rect.y0 + qy),
                    (rect.x0 + qx, rect.y0),
                    (rect.x1 - qx, rect.y0),
                    (rect.x1, rect.y0 + qy),
                ],
            )
        }
        _ => polygon("none", "black", &rect.corners()),
    }
}

/// Lays `request` out in a single row and writes the SVG Graphviz would.
pub fn respond(request: &str, version: Option<EngineVersion>, outline: RoundedOutline) -> String {
    let mut cursor = 10.0_f32;
    let mut placed: HashMap<String, Rect> = HashMap::new();
    let mut stack: Vec<OpenRegion> = Vec::new();
    let mut edges: Vec<&str> = Vec::new();
    let mut body = String::new();
    let mut node_count = 0;
    let mut region_count = 0;

    for line in request.lines() {
        if let Some(caps) = subgraph_regex().captures(line) {
            stack.push(OpenRegion {
                uid: caps[1].to_string(),
                ..OpenRegion::default()
            });
        } else if line == "style=invis;" {
            if let Some(region) = stack.last_mut() {
                region.packed = true;
            }
        } else if let Some(caps) = region_color_regex().captures(line) {
            if let Some(region) = stack.last_mut() {
                region.color = caps[1].to_string();
            }
        } else if line.starts_with("label=") {
            if let Some(region) = stack.last_mut() {
                region.cells = cell_regex()
                    .captures_iter(line)
                    .map(|c| (c[1].to_string(), c[2].parse().unwrap(), c[3].parse().unwrap()))
                    .collect();
            }
        } else if let Some(caps) = node_regex().captures(line) {
            let rect = Rect::new(cursor, ROW_TOP, inches(&caps[4]), inches(&caps[5]));
            cursor = rect.x1 + ROW_GAP;
            node_count += 1;
            let _ = write!(
                body,
                "<!-- {uid} -->\n<g id=\"node{node_count}\" class=\"node\">\n<title>{uid}</title>\n{}</g>\n",
                shape_element(&caps[2], caps.get(3).is_some(), rect, outline),
                uid = &caps[1],
            );
            placed.insert(caps[1].to_string(), rect);
            if let Some(region) = stack.last_mut() {
                region.include(rect);
            }
        } else if let Some(caps) = point_regex().captures(line) {
            let rect = Rect::new(cursor, ROW_TOP, 1.0, 1.0);
            cursor = rect.x1 + ROW_GAP;
            placed.insert(caps[1].to_string(), rect);
            if let Some(region) = stack.last_mut() {
                region.include(rect);
            }
        } else if line == "}" {
            let Some(region) = stack.pop() else {
                continue;
            };
            region_count += 1;
            let rect = close_region(region, region_count, cursor, &mut body);
            if let Some(parent) = stack.last_mut() {
                parent.include(rect);
            }
        } else if edge_regex().is_match(line) {
            edges.push(line);
        }
    }

    for (idx, line) in edges.iter().enumerate() {
        write_edge(line, idx + 1, &placed, &mut body);
    }

    let width = (cursor + 10.0).ceil() as u32;
    let mut document = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n",
    );
    if let Some(version) = version {
        let _ = writeln!(document, "<!-- Generated by graphviz version {version} (0)\n -->");
    }
    let _ = write!(
        document,
        "<!-- Title: unix Pages: 1 -->\n<svg width=\"{width}pt\" height=\"{height}pt\"\n viewBox=\"0.00 0.00 {width}.00 {height}.00\" xmlns=\"http://www.w3.org/2000/svg\">\n<g id=\"graph0\" class=\"graph\" transform=\"scale(1 1) rotate(0) translate(4 {translate})\">\n{body}</g>\n</svg>\n",
        height = DOCUMENT_HEIGHT as u32,
        translate = DOCUMENT_HEIGHT as u32 - 4,
    );
    document
}

fn close_region(region: OpenRegion, index: usize, cursor: f32, body: &mut String) -> Rect {
    let members = region
        .members
        .unwrap_or_else(|| Rect::new(cursor, ROW_TOP, 1.0, 1.0));
    let header: f32 = region.cells.iter().map(|(_, _, h)| h).sum();
    let header_width = region.cells.iter().map(|(_, w, _)| *w).fold(0.0, f32::max);
    let gap = if header > 0.0 { 4.0 } else { 0.0 };
    let rect = Rect {
        x0: members.x0 - REGION_PADDING,
        y0: members.y0 - REGION_PADDING - header - gap,
        x1: (members.x1 + REGION_PADDING).max(members.x0 + header_width + REGION_PADDING),
        y1: members.y1 + REGION_PADDING,
    };
    if region.packed {
        return rect;
    }

    let _ = write!(
        body,
        "<g id=\"clust{index}\" class=\"cluster\">\n<title>cluster{}</title>\n{}",
        region.uid,
        polygon("none", &region.color, &rect.corners())
    );
    let mut top = rect.y0 + 2.0;
    for (color, width, height) in &region.cells {
        let cell = Rect::new(rect.x0 + REGION_PADDING, top, *width, *height);
        body.push_str(&polygon(color, "transparent", &cell.corners()));
        top += height;
    }
    body.push_str("</g>\n");
    rect
}

fn write_edge(line: &str, index: usize, placed: &HashMap<String, Rect>, body: &mut String) {
    let Some(caps) = edge_regex().captures(line) else {
        return;
    };
    let attributes = &caps[3];
    if attributes.contains("style=invis") {
        return;
    }
    let (Some(source), Some(target), Some(color)) = (
        placed.get(&caps[1]),
        placed.get(&caps[2]),
        edge_color_regex().captures(attributes),
    ) else {
        return;
    };

    let (sx, sy) = source.center();
    let (tx, ty) = target.center();
    let _ = write!(
        body,
        "<g id=\"edge{index}\" class=\"edge\">\n<title>{}&#45;&gt;{}</title>\n<path fill=\"none\" stroke=\"{}\" d=\"M{sx:.2},{:.2}C{sx:.2},{:.2} {tx:.2},{:.2} {tx:.2},{:.2}\"/>\n",
        &caps[1],
        &caps[2],
        &color[1],
        sy - DOCUMENT_HEIGHT,
        sy + 10.0 - DOCUMENT_HEIGHT,
        ty - 10.0 - DOCUMENT_HEIGHT,
        ty - DOCUMENT_HEIGHT,
    );
    for label in edge_label_regex().captures_iter(attributes) {
        let (x, y) = match &label[1] {
            "headlabel" => (tx, ty),
            "taillabel" => (sx, sy),
            _ => ((sx + tx) / 2.0, (sy + ty) / 2.0),
        };
        let cell = Rect::new(x, y, label[3].parse().unwrap(), label[4].parse().unwrap());
        body.push_str(&polygon(&label[2], "transparent", &cell.corners()));
    }
    body.push_str("</g>\n");
}
