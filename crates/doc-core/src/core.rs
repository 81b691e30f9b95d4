use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ops::{Op, Path, Transaction};
use crate::plugin::{CommandError, PluginRegistry, QueryError};

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type ElementKind = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::Element(ElementNode {
            kind: "paragraph".to_string(),
            attrs: Attrs::default(),
            children: vec![Node::Text(TextNode {
                text: text.into(),
                marks: Marks::default(),
            })],
        })
    }

    pub fn empty_text() -> Self {
        Node::Text(TextNode {
            text: String::new(),
            marks: Marks::default(),
        })
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Node::Void(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

/// A block with no user-editable text. Its single empty text child is
/// structural (every leaf position in the tree is a text node) and is
/// restored by normalization whenever it goes missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl VoidNode {
    pub fn new(kind: impl Into<String>, attrs: Attrs) -> Self {
        Self {
            kind: kind.into(),
            attrs,
            children: vec![Node::empty_text()],
        }
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub superscript: bool,
    #[serde(default)]
    pub subscript: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(
        default,
        rename = "backgroundColor",
        skip_serializing_if = "Option::is_none"
    )]
    pub background_color: Option<String>,
    #[serde(default, rename = "fontSize", skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
    #[serde(default, rename = "fontFamily", skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, rename = "className", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Raw declaration string carried through from markup import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Reconciled declarations with no typed field of their own.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[derive(Debug, Default)]
pub struct EditorConfig {
    pub max_normalize_iterations: usize,
}

impl EditorConfig {
    fn with_defaults(mut self) -> Self {
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        self
    }
}

pub struct Editor {
    doc: Document,
    selection: Selection,
    registry: PluginRegistry,
    config: EditorConfig,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: PluginRegistry) -> Self {
        let config = EditorConfig::default().with_defaults();
        let mut editor = Self {
            doc,
            selection,
            registry,
            config,
        };
        editor.normalize_in_place();
        editor
    }

    pub fn with_default_plugins() -> Self {
        let registry = PluginRegistry::richtext();
        let doc = Document {
            children: vec![Node::paragraph("")],
        };
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, selection, registry)
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.normalize_selection_in_place();
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        for op in tx.ops {
            self.apply_op(op)?;
        }

        if let Some(sel) = tx.selection_after {
            self.selection = sel;
        }

        self.normalize_to_fixed_point()?;
        self.normalize_selection_in_place();
        Ok(())
    }

    pub fn run_command(
        &mut self,
        id: &str,
        args: Option<serde_json::Value>,
    ) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        (command.handler)(self, args)
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::new(format!("Unknown query: {id}")));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value)
            .map_err(|err| QueryError::new(format!("Failed to decode query result: {err}")))
    }

    fn normalize_in_place(&mut self) {
        let _ = self.normalize_to_fixed_point();
        self.normalize_selection_in_place();
    }

    fn normalize_selection_in_place(&mut self) {
        self.selection = self
            .registry
            .normalize_selection(&self.doc, &self.selection);
    }

    fn normalize_to_fixed_point(&mut self) -> Result<(), ApplyError> {
        for _ in 0..self.config.max_normalize_iterations {
            let ops = self.registry.normalize(&self.doc);
            if ops.is_empty() {
                return Ok(());
            }
            for op in ops {
                self.apply_op(op)?;
            }
        }
        Err(ApplyError::NormalizeDidNotConverge)
    }

    fn apply_op(&mut self, op: Op) -> Result<(), ApplyError> {
        apply_op_to(&mut self.doc, &mut self.selection, op)
    }
}

fn apply_op_to(doc: &mut Document, selection: &mut Selection, op: Op) -> Result<(), ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            transform_selection_insert_text(selection, &path, offset, text.len());
            Ok(())
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            let start =
                clamp_to_char_boundary(&text_node.text, range.start.min(text_node.text.len()));
            let end = clamp_to_char_boundary(&text_node.text, range.end.min(text_node.text.len()));
            if start >= end {
                return Ok(());
            }
            text_node.text.replace_range(start..end, "");
            transform_selection_remove_text(selection, &path, start..end);
            Ok(())
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, &path, node)?;
            transform_selection_insert_node(selection, &path);
            Ok(())
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(doc, &path)?;
            transform_selection_remove_node(selection, &path, &removed, doc);
            Ok(())
        }
        Op::SetNodeAttrs { path, patch } => {
            let node = node_mut(doc, &path)?;
            match node {
                Node::Element(el) => patch_apply(&mut el.attrs, &patch),
                Node::Void(v) => patch_apply(&mut v.attrs, &patch),
                Node::Text(_) => return Err(ApplyError::InvalidPath("Text has no attrs".into())),
            }
            Ok(())
        }
        Op::SetTextMarks { path, marks } => {
            let text_node = node_text_mut(doc, &path)?;
            text_node.marks = marks;
            Ok(())
        }
    }
}

#[derive(Debug)]
pub enum ApplyError {
    InvalidPath(String),
    NormalizeDidNotConverge,
}

impl From<PathError> for ApplyError {
    fn from(value: PathError) -> Self {
        ApplyError::InvalidPath(value.0)
    }
}

#[derive(Debug)]
pub struct PathError(pub String);

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path {
            continue;
        }
        if point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_insert_node(selection: &mut Selection, path: &[usize]) {
    if path.is_empty() {
        return;
    }
    let (parent_path, index) = path.split_at(path.len() - 1);
    let index = index[0];

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() {
            continue;
        }
        if !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        if point.path[depth] >= index {
            point.path[depth] += 1;
        }
    }
}

fn transform_selection_remove_node(
    selection: &mut Selection,
    path: &[usize],
    removed: &Node,
    doc_after_remove: &Document,
) {
    if path.is_empty() {
        return;
    }
    let (parent_path, index) = path.split_at(path.len() - 1);
    let index = index[0];

    let merge_prefix_len = match (removed, index.checked_sub(1)) {
        (Node::Text(removed_text), Some(left_index)) => {
            let mut left_path = parent_path.to_vec();
            left_path.push(left_index);
            match node_ref(doc_after_remove, &left_path) {
                Some(Node::Text(left_text))
                    if left_text.marks == removed_text.marks
                        && left_text.text.ends_with(&removed_text.text) =>
                {
                    Some(left_text.text.len().saturating_sub(removed_text.text.len()))
                }
                _ => None,
            }
        }
        _ => None,
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() {
            continue;
        }
        if !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
            continue;
        }
        if ix < index {
            continue;
        }

        // Point was inside the removed subtree. Map it to a nearby point.
        if let (Some(prefix), Node::Text(removed_text), Some(left_index)) =
            (merge_prefix_len, removed, index.checked_sub(1))
        {
            point.path.truncate(depth + 1);
            point.path[depth] = left_index;
            point.offset = (prefix + point.offset).min(prefix + removed_text.text.len());
        } else {
            point.path.truncate(depth + 1);
            point.path[depth] = index.saturating_sub(1);
            point.offset = 0;
        }
    }
}

pub(crate) fn node_ref<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    if path.is_empty() {
        return None;
    }

    let mut node = doc.children.get(path[0])?;
    for &ix in path.iter().skip(1) {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Void(v) => v.children.get(ix)?,
            Node::Text(_) => return None,
        };
    }
    Some(node)
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, PathError> {
    if path.is_empty() {
        return Err(PathError("Empty path".into()));
    }

    let mut current: *mut Node = std::ptr::null_mut();
    let mut children: *mut Vec<Node> = &mut doc.children;

    for (depth, &ix) in path.iter().enumerate() {
        // SAFETY: We only keep raw pointers within this loop iteration.
        let vec = unsafe { &mut *children };
        if ix >= vec.len() {
            return Err(PathError(format!(
                "Path out of bounds at depth {depth}: {ix} >= {}",
                vec.len()
            )));
        }
        current = &mut vec[ix];
        if depth + 1 < path.len() {
            children = match unsafe { &mut *current } {
                Node::Element(el) => &mut el.children,
                Node::Void(v) => &mut v.children,
                Node::Text(_) => {
                    return Err(PathError(format!("Non-container node at depth {depth}")));
                }
            };
        }
    }

    // SAFETY: current points to a node in the document tree.
    unsafe { current.as_mut() }.ok_or_else(|| PathError("Failed to resolve path".into()))
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        _ => Err(PathError("Expected Text node".into())),
    }
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), PathError> {
    if path.is_empty() {
        return Err(PathError("Empty insert path".into()));
    }

    let (parent_path, index) = path.split_at(path.len() - 1);
    let index = index[0];

    let children = if parent_path.is_empty() {
        &mut doc.children
    } else {
        match node_mut(doc, parent_path)? {
            Node::Element(el) => &mut el.children,
            Node::Void(v) => &mut v.children,
            Node::Text(_) => {
                return Err(PathError("Insert parent is not a container".into()));
            }
        }
    };

    if index > children.len() {
        return Err(PathError(format!(
            "Insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, PathError> {
    if path.is_empty() {
        return Err(PathError("Empty remove path".into()));
    }

    let (parent_path, index) = path.split_at(path.len() - 1);
    let index = index[0];

    let children = if parent_path.is_empty() {
        &mut doc.children
    } else {
        match node_mut(doc, parent_path)? {
            Node::Element(el) => &mut el.children,
            Node::Void(v) => &mut v.children,
            Node::Text(_) => {
                return Err(PathError("Remove parent is not a container".into()));
            }
        }
    };

    if index >= children.len() {
        return Err(PathError(format!(
            "Remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(index))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

fn patch_apply(attrs: &mut Attrs, patch: &AttrPatch) {
    for (k, v) in &patch.set {
        attrs.insert(k.clone(), v.clone());
    }
    for key in &patch.remove {
        attrs.remove(key);
    }
}
