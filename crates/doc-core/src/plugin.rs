use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{
    Attrs, Document, ElementNode, Marks, Node, Point, Selection, TextNode, clamp_to_char_boundary,
};
use crate::embed::EmbedPlugin;
use crate::ops::{Op, Path, Transaction};

#[derive(Debug, Clone)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone)]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<serde_json::Value>,
    pub handler: std::sync::Arc<
        dyn Fn(&mut crate::core::Editor, Option<serde_json::Value>) -> Result<(), CommandError>
            + Send
            + Sync,
    >,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(
            &mut crate::core::Editor,
            Option<serde_json::Value>,
        ) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            handler: std::sync::Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: serde_json::Value) -> Self {
        self.args_example = Some(args_example);
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: std::sync::Arc<
        dyn Fn(
                &crate::core::Editor,
                Option<serde_json::Value>,
            ) -> Result<serde_json::Value, QueryError>
            + Send
            + Sync,
    >,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    InlineOnly,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub role: NodeRole,
    pub is_void: bool,
    pub children: ChildConstraint,
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op>;
}

pub trait EditorPlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    node_specs: HashMap<String, NodeSpec>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl PluginRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn EditorPlugin>>) -> Result<Self, String> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    pub fn core() -> Self {
        let plugins: Vec<Box<dyn EditorPlugin>> = vec![
            Box::new(CoreParagraphPlugin),
            Box::new(CoreNormalizePlugin),
            Box::new(CoreCommandsPlugin),
        ];
        Self::new(plugins).expect("core registry must be valid")
    }

    pub fn richtext() -> Self {
        let plugins: Vec<Box<dyn EditorPlugin>> = vec![
            Box::new(CoreParagraphPlugin),
            Box::new(CoreNormalizePlugin),
            Box::new(CoreCommandsPlugin),
            Box::new(MarksCommandsPlugin),
            Box::new(BlockCommandsPlugin),
            Box::new(HeadingPlugin),
            Box::new(BlockquotePlugin),
            Box::new(AlignPlugin),
            Box::new(ListPlugin),
            Box::new(TablePlugin),
            Box::new(LinkPlugin),
            Box::new(EmbedPlugin),
        ];
        Self::new(plugins).expect("richtext registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn EditorPlugin>) -> Result<(), String> {
        for spec in plugin.node_specs() {
            if self.node_specs.contains_key(&spec.kind) {
                return Err(format!("Duplicate node spec kind: {}", spec.kind));
            }
            self.node_specs.insert(spec.kind.clone(), spec);
        }

        self.normalize_passes.extend(plugin.normalize_passes());

        for cmd in plugin.commands() {
            if self.commands.contains_key(&cmd.id) {
                return Err(format!("Duplicate command id: {}", cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        for query in plugin.queries() {
            if self.queries.contains_key(&query.id) {
                return Err(format!("Duplicate query id: {}", query.id));
            }
            self.queries.insert(query.id.clone(), query);
        }

        Ok(())
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn node_spec(&self, kind: &str) -> Option<&NodeSpec> {
        self.node_specs.get(kind)
    }

    pub fn is_void_kind(&self, kind: &str) -> bool {
        self.node_specs.get(kind).is_some_and(|s| s.is_void)
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.node_specs.contains_key(kind)
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        let mut ops: Vec<Op> = Vec::new();
        for pass in &self.normalize_passes {
            ops.extend(pass.run(doc, self));
        }
        ops
    }

    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Selection {
        let fallback = first_text_point(doc).unwrap_or(Point {
            path: vec![0],
            offset: 0,
        });

        let anchor =
            normalize_point_to_existing_text(doc, &selection.anchor).unwrap_or_else(|| {
                normalize_point_to_existing_text(doc, &selection.focus)
                    .unwrap_or_else(|| fallback.clone())
            });
        let focus = normalize_point_to_existing_text(doc, &selection.focus)
            .unwrap_or_else(|| anchor.clone());

        Selection { anchor, focus }
    }
}

fn first_text_point(doc: &Document) -> Option<Point> {
    fn walk(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
        for (ix, node) in children.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Text(_) => {
                    let point = Point {
                        path: path.clone(),
                        offset: 0,
                    };
                    path.pop();
                    return Some(point);
                }
                Node::Element(el) => {
                    if let Some(point) = walk(&el.children, path) {
                        path.pop();
                        return Some(point);
                    }
                }
                // Void text children are structural, never a caret target.
                Node::Void(_) => {}
            }
            path.pop();
        }
        None
    }

    walk(&doc.children, &mut Vec::new())
}

fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    fn first_text_descendant(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
        for (ix, node) in children.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Text(_) => {
                    let point = Point {
                        path: path.clone(),
                        offset: 0,
                    };
                    path.pop();
                    return Some(point);
                }
                Node::Element(el) => {
                    if let Some(point) = first_text_descendant(&el.children, path) {
                        path.pop();
                        return Some(point);
                    }
                }
                Node::Void(_) => {}
            }
            path.pop();
        }
        None
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        let node = &children[ix];
        match node {
            Node::Text(t) => {
                return Some(Point {
                    path: resolved_path,
                    offset: point.offset.min(t.text.len()),
                });
            }
            Node::Element(el) => {
                children = &el.children;
            }
            Node::Void(_) => {
                break;
            }
        }
    }

    let node = node_at_path(doc, &resolved_path)?;
    match node {
        Node::Text(t) => Some(Point {
            path: resolved_path,
            offset: point.offset.min(t.text.len()),
        }),
        Node::Element(el) => first_text_descendant(&el.children, &mut resolved_path),
        Node::Void(_) => None,
    }
}

pub(crate) fn node_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
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

struct CoreParagraphPlugin;

impl EditorPlugin for CoreParagraphPlugin {
    fn id(&self) -> &'static str {
        "core.paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: "paragraph".to_string(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::InlineOnly,
        }]
    }
}

struct HeadingPlugin;

impl EditorPlugin for HeadingPlugin {
    fn id(&self) -> &'static str {
        "heading"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        ["headingOne", "headingTwo", "headingThree"]
            .into_iter()
            .map(|kind| NodeSpec {
                kind: kind.to_string(),
                role: NodeRole::Block,
                is_void: false,
                children: ChildConstraint::InlineOnly,
            })
            .collect()
    }
}

struct BlockquotePlugin;

impl EditorPlugin for BlockquotePlugin {
    fn id(&self) -> &'static str {
        "blockquote"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: "blockquote".to_string(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::InlineOnly,
        }]
    }
}

struct AlignPlugin;

impl EditorPlugin for AlignPlugin {
    fn id(&self) -> &'static str {
        "align"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        ["alignLeft", "alignCenter", "alignRight"]
            .into_iter()
            .map(|kind| NodeSpec {
                kind: kind.to_string(),
                role: NodeRole::Block,
                is_void: false,
                children: ChildConstraint::Any,
            })
            .collect()
    }
}

struct LinkPlugin;

impl EditorPlugin for LinkPlugin {
    fn id(&self) -> &'static str {
        "link"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: "link".to_string(),
            role: NodeRole::Inline,
            is_void: false,
            children: ChildConstraint::InlineOnly,
        }]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("link.insert", "Insert link", |editor, args| {
                let href = args
                    .as_ref()
                    .and_then(|v| v.get("href"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| CommandError::new("Missing args.href"))?
                    .to_string();
                let text = args
                    .as_ref()
                    .and_then(|v| v.get("text"))
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| href.clone());

                insert_link(editor, href, text)
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("Failed to insert link: {e:?}")))
                    })
            })
            .description("Insert an inline link element at the caret.")
            .keywords(["link", "url", "hyperlink"])
            .args_example(serde_json::json!({ "href": "https://example.com", "text": "example" })),
        ]
    }
}

struct CoreNormalizePlugin;

impl EditorPlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureInlineBlocksHaveTextLeaf),
            Box::new(MergeAdjacentTextLeaves),
            Box::new(EnsureVoidSingleEmptyText),
            Box::new(EnsureVoidFollowedByEditable),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

struct EnsureInlineBlocksHaveTextLeaf;

impl NormalizePass for EnsureInlineBlocksHaveTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_inline_only_blocks_have_text_leaf"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(
            children: &[Node],
            path: &mut Vec<usize>,
            registry: &PluginRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                path.push(ix);

                let spec_children = registry
                    .node_specs
                    .get(&el.kind)
                    .map(|s| s.children.clone())
                    .unwrap_or(ChildConstraint::Any);

                if spec_children == ChildConstraint::InlineOnly {
                    let has_text = el.children.iter().any(|n| matches!(n, Node::Text(_)));
                    if !has_text {
                        let mut insert_path = path.clone();
                        insert_path.push(0);
                        ops.push(Op::InsertNode {
                            path: insert_path,
                            node: Node::empty_text(),
                        });
                    } else {
                        walk(&el.children, path, registry, ops);
                    }
                } else {
                    walk(&el.children, path, registry, ops);
                }

                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), registry, &mut ops);
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(
            children: &[Node],
            path: &mut Vec<usize>,
            registry: &PluginRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                path.push(ix);

                let spec_children = registry
                    .node_specs
                    .get(&el.kind)
                    .map(|s| s.children.clone())
                    .unwrap_or_else(|| {
                        if el.children.iter().any(|n| matches!(n, Node::Text(_))) {
                            ChildConstraint::InlineOnly
                        } else {
                            ChildConstraint::Any
                        }
                    });

                if spec_children == ChildConstraint::InlineOnly {
                    if el.children.len() >= 2 {
                        let mut ix = el.children.len();
                        while ix > 0 {
                            ix -= 1;
                            let Node::Text(right) = &el.children[ix] else {
                                continue;
                            };

                            let mut start = ix;
                            while start > 0 {
                                let Some(Node::Text(left)) = el.children.get(start - 1) else {
                                    break;
                                };
                                if left.marks != right.marks {
                                    break;
                                }
                                start -= 1;
                            }

                            if start == ix {
                                continue;
                            }

                            let Some(Node::Text(first)) = el.children.get(start) else {
                                continue;
                            };
                            let mut appended = String::new();
                            for node in el.children.iter().take(ix + 1).skip(start + 1) {
                                if let Node::Text(t) = node {
                                    appended.push_str(&t.text);
                                }
                            }

                            if !appended.is_empty() {
                                let mut insert_text_path = path.clone();
                                insert_text_path.push(start);
                                ops.push(Op::InsertText {
                                    path: insert_text_path,
                                    offset: first.text.len(),
                                    text: appended,
                                });
                            }

                            for remove_ix in (start + 1..=ix).rev() {
                                let mut remove_path = path.clone();
                                remove_path.push(remove_ix);
                                ops.push(Op::RemoveNode { path: remove_path });
                            }

                            ix = start;
                        }
                    }
                } else {
                    walk(&el.children, path, registry, ops);
                }

                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), registry, &mut ops);

        ops
    }
}

/// Keeps every void's child list at exactly one empty text node. Emits at
/// most one fix per run; the normalize loop re-runs until converged.
struct EnsureVoidSingleEmptyText;

impl NormalizePass for EnsureVoidSingleEmptyText {
    fn id(&self) -> &'static str {
        "core.ensure_void_single_empty_text"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        fn walk(children: &[Node], path: &mut Vec<usize>) -> Option<Op> {
            for (ix, node) in children.iter().enumerate() {
                path.push(ix);
                let fix = match node {
                    Node::Void(v) => void_fix(&v.children, path),
                    Node::Element(el) => walk(&el.children, path),
                    Node::Text(_) => None,
                };
                if fix.is_some() {
                    path.pop();
                    return fix;
                }
                path.pop();
            }
            None
        }

        fn void_fix(children: &[Node], void_path: &[usize]) -> Option<Op> {
            if children.is_empty() {
                let mut path = void_path.to_vec();
                path.push(0);
                return Some(Op::InsertNode {
                    path,
                    node: Node::empty_text(),
                });
            }
            if children.len() > 1 {
                let mut path = void_path.to_vec();
                path.push(children.len() - 1);
                return Some(Op::RemoveNode { path });
            }
            match &children[0] {
                Node::Text(t) if t.text.is_empty() => None,
                Node::Text(t) => {
                    let mut path = void_path.to_vec();
                    path.push(0);
                    Some(Op::RemoveText {
                        path,
                        range: 0..t.text.len(),
                    })
                }
                _ => {
                    let mut path = void_path.to_vec();
                    path.push(0);
                    Some(Op::RemoveNode { path })
                }
            }
        }

        walk(&doc.children, &mut Vec::new())
            .into_iter()
            .collect()
    }
}

/// A top-level void must be followed, at the top level, by an editable
/// block so the caret always has somewhere to go after an embed.
struct EnsureVoidFollowedByEditable;

impl NormalizePass for EnsureVoidFollowedByEditable {
    fn id(&self) -> &'static str {
        "core.ensure_void_followed_by_editable"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        for (ix, node) in doc.children.iter().enumerate() {
            if !node.is_void() {
                continue;
            }
            let next_is_editable = doc
                .children
                .get(ix + 1)
                .is_some_and(|next| !next.is_void());
            if !next_is_editable {
                return vec![Op::InsertNode {
                    path: vec![ix + 1],
                    node: Node::paragraph(""),
                }];
            }
        }
        Vec::new()
    }
}

struct CoreCommandsPlugin;

impl EditorPlugin for CoreCommandsPlugin {
    fn id(&self) -> &'static str {
        "core.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("core.insert_text", "Insert text", |editor, args| {
                let text = args
                    .as_ref()
                    .and_then(|v| v.get("text"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CommandError::new("Missing args.text"))?
                    .to_string();

                insert_text_at_caret(editor, text)
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("Failed to insert text: {e:?}")))
                    })
            })
            .description("Insert text at the caret.")
            .keywords(["text", "type", "insert"])
            .args_example(serde_json::json!({ "text": "hello" })),
            CommandSpec::new("core.delete_backward", "Delete backward", |editor, _args| {
                match delete_backward(editor).map_err(CommandError::new)? {
                    Some(tx) => editor
                        .apply(tx)
                        .map_err(|e| CommandError::new(format!("Failed to delete: {e:?}"))),
                    None => Ok(()),
                }
            })
            .description("Delete one character before the caret, merging blocks at a boundary.")
            .keywords(["delete", "backspace"]),
        ]
    }
}

struct BlockCommandsPlugin;

impl EditorPlugin for BlockCommandsPlugin {
    fn id(&self) -> &'static str {
        "block.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.set_type", "Set block type", |editor, args| {
                let kind = args
                    .as_ref()
                    .and_then(|v| v.get("type"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CommandError::new("Missing args.type"))?
                    .to_string();

                if !editor.registry().is_known_kind(&kind) {
                    return Err(CommandError::new(format!("Unknown block type: {kind}")));
                }

                match set_block_type(editor, kind).map_err(CommandError::new)? {
                    Some(tx) => editor
                        .apply(tx)
                        .map_err(|e| CommandError::new(format!("Failed to set block type: {e:?}"))),
                    None => Ok(()),
                }
            })
            .description("Toggle the block at the caret between the given type and paragraph.")
            .keywords(["block", "heading", "blockquote", "align"])
            .args_example(serde_json::json!({ "type": "headingOne" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec {
                id: "block.get_active_type".to_string(),
                handler: std::sync::Arc::new(|editor, _args| {
                    Ok(Value::String(active_block_kind(editor)))
                }),
            },
            QuerySpec {
                id: "block.is_active".to_string(),
                handler: std::sync::Arc::new(|editor, args| {
                    let kind = args
                        .as_ref()
                        .and_then(|v| v.get("type"))
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| QueryError::new("Missing args.type"))?;
                    Ok(Value::Bool(active_block_kind(editor) == kind))
                }),
            },
        ]
    }
}

struct ListPlugin;

impl EditorPlugin for ListPlugin {
    fn id(&self) -> &'static str {
        "list"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec {
                kind: "orderedList".to_string(),
                role: NodeRole::Block,
                is_void: false,
                children: ChildConstraint::BlockOnly,
            },
            NodeSpec {
                kind: "unorderedList".to_string(),
                role: NodeRole::Block,
                is_void: false,
                children: ChildConstraint::BlockOnly,
            },
            NodeSpec {
                kind: "list-item".to_string(),
                role: NodeRole::Block,
                is_void: false,
                children: ChildConstraint::InlineOnly,
            },
        ]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.toggle_list", "Toggle list", |editor, args| {
                let list_kind = args
                    .as_ref()
                    .and_then(|v| v.get("type"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CommandError::new("Missing args.type"))?
                    .to_string();
                if list_kind != "orderedList" && list_kind != "unorderedList" {
                    return Err(CommandError::new(format!(
                        "Not a list type: {list_kind}"
                    )));
                }

                match toggle_list(editor, &list_kind).map_err(CommandError::new)? {
                    Some(tx) => editor
                        .apply(tx)
                        .map_err(|e| CommandError::new(format!("Failed to toggle list: {e:?}"))),
                    None => Ok(()),
                }
            })
            .description("Wrap the caret block into a list, or unwrap it back to paragraphs.")
            .keywords(["list", "ordered", "unordered", "bullet", "numbered"])
            .args_example(serde_json::json!({ "type": "unorderedList" })),
        ]
    }
}

struct TablePlugin;

impl EditorPlugin for TablePlugin {
    fn id(&self) -> &'static str {
        "table"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec {
                kind: "table".to_string(),
                role: NodeRole::Block,
                is_void: false,
                children: ChildConstraint::BlockOnly,
            },
            NodeSpec {
                kind: "table-row".to_string(),
                role: NodeRole::Block,
                is_void: false,
                children: ChildConstraint::BlockOnly,
            },
            NodeSpec {
                kind: "table-cell".to_string(),
                role: NodeRole::Block,
                is_void: false,
                children: ChildConstraint::InlineOnly,
            },
        ]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("table.insert", "Insert table", |editor, args| {
                let rows = args
                    .as_ref()
                    .and_then(|v| v.get("rows"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(2)
                    .max(1) as usize;
                let cols = args
                    .as_ref()
                    .and_then(|v| v.get("cols"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(2)
                    .max(1) as usize;

                let tx = insert_table(editor, rows, cols).map_err(CommandError::new)?;
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to insert table: {e:?}")))
            })
            .description("Insert a table after the caret block, with a trailing paragraph.")
            .keywords(["table", "grid", "rows", "columns"])
            .args_example(serde_json::json!({ "rows": 2, "cols": 3 })),
        ]
    }
}

struct MarksCommandsPlugin;

impl EditorPlugin for MarksCommandsPlugin {
    fn id(&self) -> &'static str {
        "marks.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        fn toggle_command(
            id: &'static str,
            label: &'static str,
            get: fn(&Marks) -> bool,
            set: fn(&mut Marks, bool),
        ) -> CommandSpec {
            CommandSpec::new(id, label, move |editor, _args| {
                toggle_bool_mark(editor, get, set, id)
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("{label} failed: {e:?}")))
                    })
            })
            .description("Toggle the mark on the current selection or caret.")
            .keywords(["mark"])
        }

        fn value_command(
            id: &'static str,
            label: &'static str,
            arg: &'static str,
            set: fn(&mut Marks, Option<String>),
        ) -> CommandSpec {
            CommandSpec::new(id, label, move |editor, args| {
                let value = args
                    .as_ref()
                    .and_then(|v| v.get(arg))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CommandError::new(format!("Missing args.{arg}")))?
                    .to_string();
                set_optional_string_mark(editor, set, Some(value), id)
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("{label} failed: {e:?}")))
                    })
            })
            .description("Set the value mark on the current selection or caret.")
            .keywords(["mark"])
        }

        fn unset_command(
            id: &'static str,
            label: &'static str,
            set: fn(&mut Marks, Option<String>),
        ) -> CommandSpec {
            CommandSpec::new(id, label, move |editor, _args| {
                set_optional_string_mark(editor, set, None, id)
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("{label} failed: {e:?}")))
                    })
            })
            .description("Remove the value mark from the current selection or caret.")
            .keywords(["mark", "reset"])
        }

        vec![
            toggle_command("marks.toggle_bold", "Toggle bold", |m| m.bold, |m, v| {
                m.bold = v
            }),
            toggle_command(
                "marks.toggle_italic",
                "Toggle italic",
                |m| m.italic,
                |m, v| m.italic = v,
            ),
            toggle_command("marks.toggle_code", "Toggle code", |m| m.code, |m, v| {
                m.code = v
            }),
            toggle_command(
                "marks.toggle_strikethrough",
                "Toggle strikethrough",
                |m| m.strikethrough,
                |m, v| m.strikethrough = v,
            ),
            toggle_command(
                "marks.toggle_underline",
                "Toggle underline",
                |m| m.underline,
                |m, v| m.underline = v,
            ),
            toggle_command(
                "marks.toggle_superscript",
                "Toggle superscript",
                |m| m.superscript,
                |m, v| m.superscript = v,
            ),
            toggle_command(
                "marks.toggle_subscript",
                "Toggle subscript",
                |m| m.subscript,
                |m, v| m.subscript = v,
            ),
            value_command("marks.set_color", "Set text color", "color", |m, v| {
                m.color = v
            }),
            unset_command("marks.unset_color", "Unset text color", |m, v| m.color = v),
            value_command(
                "marks.set_background_color",
                "Set background color",
                "color",
                |m, v| m.background_color = v,
            ),
            unset_command(
                "marks.unset_background_color",
                "Unset background color",
                |m, v| m.background_color = v,
            ),
            value_command("marks.set_font_size", "Set font size", "size", |m, v| {
                m.font_size = v
            }),
            unset_command("marks.unset_font_size", "Unset font size", |m, v| {
                m.font_size = v
            }),
            value_command(
                "marks.set_font_family",
                "Set font family",
                "family",
                |m, v| m.font_family = v,
            ),
            unset_command("marks.unset_font_family", "Unset font family", |m, v| {
                m.font_family = v
            }),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec {
            id: "marks.get_active".to_string(),
            handler: std::sync::Arc::new(|editor, _args| {
                serde_json::to_value(active_marks(editor))
                    .map_err(|err| QueryError::new(format!("Failed to encode marks: {err}")))
            }),
        }]
    }
}

fn active_marks(editor: &crate::core::Editor) -> Marks {
    let focus = &editor.selection().focus;
    match node_at_path(editor.doc(), &focus.path) {
        Some(Node::Text(text)) => text.marks.clone(),
        _ => Marks::default(),
    }
}

fn active_block_kind(editor: &crate::core::Editor) -> String {
    let top = editor.selection().focus.path.first().copied().unwrap_or(0);
    match editor.doc().children.get(top) {
        Some(Node::Element(el)) => el.kind.clone(),
        Some(Node::Void(v)) => v.kind.clone(),
        _ => "paragraph".to_string(),
    }
}

fn insert_text_at_caret(
    editor: &crate::core::Editor,
    text: String,
) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    if !sel.is_collapsed() {
        return Err("Selection must be collapsed".into());
    }

    let focus = sel.focus;
    let Some(Node::Text(node)) = node_at_path(editor.doc(), &focus.path) else {
        return Err("Selection is not in a text node".into());
    };

    let offset = clamp_to_char_boundary(&node.text, focus.offset);
    let caret = Point::new(focus.path.clone(), offset + text.len());

    Ok(Transaction::new(vec![Op::InsertText {
        path: focus.path,
        offset,
        text,
    }])
    .selection_after(Selection::collapsed(caret))
    .source("command:core.insert_text"))
}

fn delete_backward(editor: &crate::core::Editor) -> Result<Option<Transaction>, String> {
    let sel = editor.selection().clone();
    if !sel.is_collapsed() {
        return Err("Selection must be collapsed".into());
    }

    let focus = sel.focus;
    let Some(Node::Text(node)) = node_at_path(editor.doc(), &focus.path) else {
        return Err("Selection is not in a text node".into());
    };

    let offset = clamp_to_char_boundary(&node.text, focus.offset);
    if offset > 0 {
        let mut start = offset - 1;
        while start > 0 && !node.text.is_char_boundary(start) {
            start -= 1;
        }
        return Ok(Some(
            Transaction::new(vec![Op::RemoveText {
                path: focus.path.clone(),
                range: start..offset,
            }])
            .selection_after(Selection::collapsed(Point::new(focus.path, start)))
            .source("command:core.delete_backward"),
        ));
    }

    // Caret at the start of a text leaf. Delete into the previous leaf,
    // or merge with / remove the previous top-level block.
    let (child_ix, block_path) = focus
        .path
        .split_last()
        .ok_or_else(|| "Selection is not in a text node".to_string())?;

    if *child_ix > 0 {
        let mut prev_path = block_path.to_vec();
        prev_path.push(child_ix - 1);
        if let Some(Node::Text(prev)) = node_at_path(editor.doc(), &prev_path) {
            if prev.text.is_empty() {
                return Ok(None);
            }
            let end = prev.text.len();
            let mut start = end - 1;
            while start > 0 && !prev.text.is_char_boundary(start) {
                start -= 1;
            }
            return Ok(Some(
                Transaction::new(vec![Op::RemoveText {
                    path: prev_path.clone(),
                    range: start..end,
                }])
                .selection_after(Selection::collapsed(Point::new(prev_path, start)))
                .source("command:core.delete_backward"),
            ));
        }
        return Ok(None);
    }

    let Some((&block_ix, parent_path)) = block_path.split_last() else {
        return Ok(None);
    };
    if !parent_path.is_empty() || block_ix == 0 {
        // Merging nested blocks is left to the structural commands.
        return Ok(None);
    }

    match editor.doc().children.get(block_ix - 1) {
        Some(Node::Void(_)) => Ok(Some(
            Transaction::new(vec![Op::RemoveNode {
                path: vec![block_ix - 1],
            }])
            .source("command:core.delete_backward"),
        )),
        Some(Node::Element(prev)) => {
            let spec_children = editor
                .registry()
                .node_spec(&prev.kind)
                .map(|s| s.children.clone())
                .unwrap_or(ChildConstraint::Any);
            if spec_children != ChildConstraint::InlineOnly {
                return Ok(None);
            }

            let Some(Node::Element(current)) = editor.doc().children.get(block_ix) else {
                return Ok(None);
            };

            let prev_len = prev.children.len();
            let mut ops: Vec<Op> = Vec::new();
            for (i, child) in current.children.iter().enumerate() {
                ops.push(Op::InsertNode {
                    path: vec![block_ix - 1, prev_len + i],
                    node: child.clone(),
                });
            }
            ops.push(Op::RemoveNode {
                path: vec![block_ix],
            });

            let caret = Point::new(vec![block_ix - 1, prev_len], 0);
            Ok(Some(
                Transaction::new(ops)
                    .selection_after(Selection::collapsed(caret))
                    .source("command:core.delete_backward"),
            ))
        }
        _ => Ok(None),
    }
}

fn set_block_type(
    editor: &crate::core::Editor,
    kind: String,
) -> Result<Option<Transaction>, String> {
    let top = editor.selection().focus.path.first().copied().unwrap_or(0);
    let Some(Node::Element(el)) = editor.doc().children.get(top) else {
        // Voids keep their kind; the toolbar has nothing to toggle here.
        return Ok(None);
    };

    let next_kind = if el.kind == kind {
        "paragraph".to_string()
    } else {
        kind
    };
    if el.kind == next_kind {
        return Ok(None);
    }

    let replacement = Node::Element(ElementNode {
        kind: next_kind,
        attrs: el.attrs.clone(),
        children: el.children.clone(),
    });

    let selection_after = editor.selection().clone();
    Ok(Some(
        Transaction::new(vec![
            Op::RemoveNode { path: vec![top] },
            Op::InsertNode {
                path: vec![top],
                node: replacement,
            },
        ])
        .selection_after(selection_after)
        .source("command:block.set_type"),
    ))
}

fn toggle_list(
    editor: &crate::core::Editor,
    list_kind: &str,
) -> Result<Option<Transaction>, String> {
    let top = editor.selection().focus.path.first().copied().unwrap_or(0);
    let Some(Node::Element(el)) = editor.doc().children.get(top) else {
        return Ok(None);
    };

    if el.kind == list_kind {
        // Unwrap: each list item becomes a paragraph.
        let mut ops = vec![Op::RemoveNode { path: vec![top] }];
        let mut inserted = 0usize;
        for item in &el.children {
            let children = match item {
                Node::Element(item_el) => item_el.children.clone(),
                other => vec![other.clone()],
            };
            ops.push(Op::InsertNode {
                path: vec![top + inserted],
                node: Node::Element(ElementNode {
                    kind: "paragraph".to_string(),
                    attrs: Attrs::default(),
                    children,
                }),
            });
            inserted += 1;
        }
        if inserted == 0 {
            ops.push(Op::InsertNode {
                path: vec![top],
                node: Node::paragraph(""),
            });
        }
        let caret = Point::new(vec![top, 0], 0);
        return Ok(Some(
            Transaction::new(ops)
                .selection_after(Selection::collapsed(caret))
                .source("command:block.toggle_list"),
        ));
    }

    if el.kind == "orderedList" || el.kind == "unorderedList" {
        // Switch list kind, keeping the items.
        let replacement = Node::Element(ElementNode {
            kind: list_kind.to_string(),
            attrs: el.attrs.clone(),
            children: el.children.clone(),
        });
        let selection_after = editor.selection().clone();
        return Ok(Some(
            Transaction::new(vec![
                Op::RemoveNode { path: vec![top] },
                Op::InsertNode {
                    path: vec![top],
                    node: replacement,
                },
            ])
            .selection_after(selection_after)
            .source("command:block.toggle_list"),
        ));
    }

    // Wrap the block into a single-item list.
    let item = Node::Element(ElementNode {
        kind: "list-item".to_string(),
        attrs: Attrs::default(),
        children: el.children.clone(),
    });
    let list = Node::Element(ElementNode {
        kind: list_kind.to_string(),
        attrs: Attrs::default(),
        children: vec![item],
    });

    let caret_offset = editor.selection().focus.offset;
    let caret_child = editor
        .selection()
        .focus
        .path
        .get(1)
        .copied()
        .unwrap_or(0);
    let caret = Point::new(vec![top, 0, caret_child], caret_offset);
    Ok(Some(
        Transaction::new(vec![
            Op::RemoveNode { path: vec![top] },
            Op::InsertNode {
                path: vec![top],
                node: list,
            },
        ])
        .selection_after(Selection::collapsed(caret))
        .source("command:block.toggle_list"),
    ))
}

fn table_cell_node() -> Node {
    Node::Element(ElementNode {
        kind: "table-cell".to_string(),
        attrs: Attrs::default(),
        children: vec![Node::empty_text()],
    })
}

fn table_row_node(cols: usize) -> Node {
    Node::Element(ElementNode {
        kind: "table-row".to_string(),
        attrs: Attrs::default(),
        children: (0..cols).map(|_| table_cell_node()).collect(),
    })
}

fn table_node(rows: usize, cols: usize) -> Node {
    Node::Element(ElementNode {
        kind: "table".to_string(),
        attrs: Attrs::default(),
        children: (0..rows).map(|_| table_row_node(cols)).collect(),
    })
}

fn insert_table(
    editor: &crate::core::Editor,
    rows: usize,
    cols: usize,
) -> Result<Transaction, String> {
    let top = editor.selection().focus.path.first().copied();
    let insert_at = match top {
        Some(ix) => ix + 1,
        None => editor.doc().children.len(),
    };

    let caret = Point::new(vec![insert_at, 0, 0, 0], 0);
    Ok(Transaction::new(vec![
        Op::InsertNode {
            path: vec![insert_at],
            node: table_node(rows, cols),
        },
        Op::InsertNode {
            path: vec![insert_at + 1],
            node: Node::paragraph(""),
        },
    ])
    .selection_after(Selection::collapsed(caret))
    .source("command:table.insert"))
}

fn insert_link(
    editor: &crate::core::Editor,
    href: String,
    text: String,
) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    if !sel.is_collapsed() {
        return Err("Selection must be collapsed".into());
    }

    let focus = sel.focus;
    if focus.path.is_empty() {
        return Err("Selection is not in a text node".into());
    }
    let (child_ix, block_path) = focus
        .path
        .split_last()
        .ok_or_else(|| "Selection is not in a text node".to_string())?;

    let Some(Node::Element(el)) = node_at_path(editor.doc(), block_path) else {
        return Err("Selection is not in a text block".into());
    };
    let Some(Node::Text(text_node)) = el.children.get(*child_ix) else {
        return Err("Selection is not in a text node".into());
    };

    let cursor = clamp_to_char_boundary(&text_node.text, focus.offset);
    let left = text_node.text.get(..cursor).unwrap_or("").to_string();
    let right = text_node.text.get(cursor..).unwrap_or("").to_string();
    let marks = text_node.marks.clone();

    let mut replacement: Vec<Node> = Vec::new();
    let base_child_ix = *child_ix;
    let mut link_ix = base_child_ix;

    if !left.is_empty() {
        replacement.push(Node::Text(TextNode {
            text: left,
            marks: marks.clone(),
        }));
        link_ix += 1;
    }

    let mut attrs = Attrs::default();
    attrs.insert("href".to_string(), Value::String(href));
    replacement.push(Node::Element(ElementNode {
        kind: "link".to_string(),
        attrs,
        children: vec![Node::Text(TextNode {
            text,
            marks: marks.clone(),
        })],
    }));

    if right.is_empty() {
        replacement.push(Node::Text(TextNode {
            text: String::new(),
            marks: marks.clone(),
        }));
    } else {
        replacement.push(Node::Text(TextNode { text: right, marks }));
    }

    let mut ops: Vec<Op> = Vec::new();
    ops.push(Op::RemoveNode {
        path: focus.path.clone(),
    });
    for (i, node) in replacement.into_iter().enumerate() {
        let mut path = block_path.to_vec();
        path.push(base_child_ix + i);
        ops.push(Op::InsertNode { path, node });
    }

    let mut selection_path = block_path.to_vec();
    selection_path.push(link_ix + 1);
    let selection_after = Selection::collapsed(Point::new(selection_path, 0));
    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source("command:link.insert"))
}

struct TextBlock<'a> {
    path: Path,
    el: &'a ElementNode,
}

fn element_is_text_block(el: &ElementNode, registry: &PluginRegistry) -> bool {
    match registry
        .node_specs
        .get(&el.kind)
        .map(|s| s.children.clone())
    {
        Some(ChildConstraint::InlineOnly) => true,
        Some(_) => false,
        None => el.children.iter().any(|n| matches!(n, Node::Text(_))),
    }
}

fn text_blocks_in_order<'a>(doc: &'a Document, registry: &PluginRegistry) -> Vec<TextBlock<'a>> {
    fn walk<'a>(
        nodes: &'a [Node],
        path: &mut Vec<usize>,
        registry: &PluginRegistry,
        out: &mut Vec<TextBlock<'a>>,
    ) {
        for (ix, node) in nodes.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };

            path.push(ix);

            if element_is_text_block(el, registry) {
                out.push(TextBlock {
                    path: path.clone(),
                    el,
                });
            } else {
                walk(&el.children, path, registry, out);
            }

            path.pop();
        }
    }

    let mut out = Vec::new();
    walk(&doc.children, &mut Vec::new(), registry, &mut out);
    out
}

fn total_inline_text_len(children: &[Node]) -> usize {
    children
        .iter()
        .map(|n| match n {
            Node::Text(t) => t.text.len(),
            Node::Element(_) | Node::Void(_) => 0,
        })
        .sum()
}

fn apply_marks_in_block(
    children: &[Node],
    start_global: usize,
    end_global: usize,
    apply: &dyn Fn(Marks) -> Marks,
) -> Vec<Node> {
    if start_global >= end_global {
        return children.to_vec();
    }

    let mut out: Vec<Node> = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let Node::Text(t) = node else {
            out.push(node.clone());
            continue;
        };

        let node_start = cursor;
        let node_end = cursor + t.text.len();
        cursor = node_end;

        if end_global <= node_start || start_global >= node_end {
            out.push(node.clone());
            continue;
        }

        let sel_start = (start_global.saturating_sub(node_start)).min(t.text.len());
        let sel_end = (end_global.saturating_sub(node_start)).min(t.text.len());

        let sel_start = clamp_to_char_boundary(&t.text, sel_start);
        let sel_end = clamp_to_char_boundary(&t.text, sel_end);

        if sel_start == 0 && sel_end == t.text.len() {
            let mut next = t.clone();
            next.marks = apply(next.marks);
            out.push(Node::Text(next));
            continue;
        }

        let prefix = t.text.get(..sel_start).unwrap_or("").to_string();
        let middle = t.text.get(sel_start..sel_end).unwrap_or("").to_string();
        let suffix = t.text.get(sel_end..).unwrap_or("").to_string();

        if !prefix.is_empty() {
            out.push(Node::Text(TextNode {
                text: prefix,
                marks: t.marks.clone(),
            }));
        }
        if !middle.is_empty() {
            out.push(Node::Text(TextNode {
                text: middle,
                marks: apply(t.marks.clone()),
            }));
        }
        if !suffix.is_empty() {
            out.push(Node::Text(TextNode {
                text: suffix,
                marks: t.marks.clone(),
            }));
        }
    }

    if out.is_empty() {
        out.push(Node::empty_text());
    }

    out
}

fn ordered_selection_points(sel: &Selection) -> (Point, Point) {
    let mut start = sel.anchor.clone();
    let mut end = sel.focus.clone();

    if start.path == end.path {
        if end.offset < start.offset {
            std::mem::swap(&mut start, &mut end);
        }
        return (start, end);
    }
    if end.path < start.path {
        std::mem::swap(&mut start, &mut end);
    }
    (start, end)
}

fn point_global_offset(children: &[Node], child_ix: usize, offset: usize) -> usize {
    let mut global = 0usize;
    for (ix, node) in children.iter().enumerate() {
        let Node::Text(t) = node else {
            continue;
        };
        if ix < child_ix {
            global += t.text.len();
            continue;
        }
        if ix == child_ix {
            global += clamp_to_char_boundary(&t.text, offset);
        }
        break;
    }
    global
}

fn point_for_global_offset(block_path: &[usize], children: &[Node], global_offset: usize) -> Point {
    let mut remaining = global_offset;
    for (child_ix, node) in children.iter().enumerate() {
        let Node::Text(t) = node else {
            continue;
        };
        if remaining < t.text.len() {
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, clamp_to_char_boundary(&t.text, remaining));
        }
        if remaining == t.text.len() {
            if matches!(children.get(child_ix + 1), Some(Node::Text(_))) {
                let mut path = block_path.to_vec();
                path.push(child_ix + 1);
                return Point::new(path, 0);
            }
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, t.text.len());
        }
        remaining = remaining.saturating_sub(t.text.len());
    }

    // Fallback to end of last text node.
    for (child_ix, node) in children.iter().enumerate().rev() {
        if let Node::Text(t) = node {
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, t.text.len());
        }
    }

    let mut path = block_path.to_vec();
    path.push(0);
    Point::new(path, 0)
}

fn is_point_in_block(point: &Point, block_path: &[usize]) -> bool {
    point.path.len() == block_path.len() + 1 && point.path.starts_with(block_path)
}

fn all_selected_text_nodes_have_mark(
    editor: &crate::core::Editor,
    sel: &Selection,
    get: fn(&Marks) -> bool,
) -> Result<bool, String> {
    let (start, end) = ordered_selection_points(sel);
    let Some(start_block_path) = start.path.split_last().map(|(_, p)| p.to_vec()) else {
        return Err("Selection start is not in a text block".into());
    };
    let Some(end_block_path) = end.path.split_last().map(|(_, p)| p.to_vec()) else {
        return Err("Selection end is not in a text block".into());
    };

    let blocks = text_blocks_in_order(editor.doc(), editor.registry());
    let start_index = blocks
        .iter()
        .position(|b| b.path == start_block_path)
        .ok_or_else(|| "Selection start is not in a text block".to_string())?;
    let end_index = blocks
        .iter()
        .position(|b| b.path == end_block_path)
        .ok_or_else(|| "Selection end is not in a text block".to_string())?;

    let (start_index, end_index) = if start_index <= end_index {
        (start_index, end_index)
    } else {
        (end_index, start_index)
    };

    let start_inline_ix = start.path.last().copied().unwrap_or(0);
    let end_inline_ix = end.path.last().copied().unwrap_or(0);

    for (block_index, block) in blocks
        .iter()
        .enumerate()
        .take(end_index + 1)
        .skip(start_index)
    {
        let children = block.el.children.as_slice();
        let total_len = total_inline_text_len(children);
        if total_len == 0 {
            continue;
        }

        let start_global = if block_index == start_index {
            point_global_offset(children, start_inline_ix, start.offset)
        } else {
            0
        };
        let end_global = if block_index == end_index {
            point_global_offset(children, end_inline_ix, end.offset)
        } else {
            total_len
        };
        if start_global >= end_global {
            continue;
        }

        let mut cursor = 0usize;
        for node in children {
            let Node::Text(t) = node else {
                continue;
            };
            let node_start = cursor;
            let node_end = cursor + t.text.len();
            cursor = node_end;

            if end_global <= node_start || start_global >= node_end {
                continue;
            }
            if !get(&t.marks) {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

fn toggle_bool_mark(
    editor: &mut crate::core::Editor,
    get: fn(&Marks) -> bool,
    set: fn(&mut Marks, bool),
    source: &'static str,
) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    if sel.is_collapsed() {
        return toggle_mark_at_caret(editor, |mut marks| {
            let target = !get(&marks);
            set(&mut marks, target);
            marks
        })
        .map(|(ops, selection_after)| {
            Transaction::new(ops)
                .selection_after(selection_after)
                .source(source)
        });
    }

    let all_set = all_selected_text_nodes_have_mark(editor, &sel, get)?;
    let target = !all_set;
    apply_mark_range(editor, &sel, &|mut marks: Marks| {
        set(&mut marks, target);
        marks
    })
    .map(|(ops, selection_after)| {
        Transaction::new(ops)
            .selection_after(selection_after)
            .source(source)
    })
}

fn set_optional_string_mark(
    editor: &mut crate::core::Editor,
    set: fn(&mut Marks, Option<String>),
    value: Option<String>,
    source: &'static str,
) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    if sel.is_collapsed() {
        return toggle_mark_at_caret(editor, |mut marks| {
            set(&mut marks, value.clone());
            marks
        })
        .map(|(ops, selection_after)| {
            Transaction::new(ops)
                .selection_after(selection_after)
                .source(source)
        });
    }

    apply_mark_range(editor, &sel, &|mut marks: Marks| {
        set(&mut marks, value.clone());
        marks
    })
    .map(|(ops, selection_after)| {
        Transaction::new(ops)
            .selection_after(selection_after)
            .source(source)
    })
}

fn toggle_mark_at_caret(
    editor: &crate::core::Editor,
    apply: impl Fn(Marks) -> Marks,
) -> Result<(Vec<Op>, Selection), String> {
    let focus = editor.selection().focus.clone();
    if focus.path.is_empty() {
        return Err("Selection is not in a text node".into());
    }
    let (child_ix, block_path) = focus
        .path
        .split_last()
        .ok_or_else(|| "Selection is not in a text node".to_string())?;

    let Some(Node::Element(el)) = node_at_path(editor.doc(), block_path) else {
        return Err("Selection is not in a text block".into());
    };
    let Some(Node::Text(text)) = el.children.get(*child_ix) else {
        return Err("Selection is not in a text node".into());
    };

    let cursor = clamp_to_char_boundary(&text.text, focus.offset);
    let marks_before = text.marks.clone();
    let marks_after = apply(marks_before.clone());

    if text.text.is_empty() {
        let selection_after = Selection::collapsed(Point::new(focus.path.clone(), 0));
        return Ok((
            vec![Op::SetTextMarks {
                path: focus.path.clone(),
                marks: marks_after,
            }],
            selection_after,
        ));
    }

    let mut replacement: Vec<Node> = Vec::new();
    let base_child_ix = *child_ix;
    let mut caret_child_ix = base_child_ix;

    let left = text.text.get(..cursor).unwrap_or("").to_string();
    let right = text.text.get(cursor..).unwrap_or("").to_string();

    if !left.is_empty() {
        replacement.push(Node::Text(TextNode {
            text: left,
            marks: marks_before.clone(),
        }));
        caret_child_ix += 1;
    }

    replacement.push(Node::Text(TextNode {
        text: String::new(),
        marks: marks_after,
    }));

    if !right.is_empty() {
        replacement.push(Node::Text(TextNode {
            text: right,
            marks: marks_before,
        }));
    }

    let mut ops: Vec<Op> = Vec::new();
    ops.push(Op::RemoveNode {
        path: focus.path.clone(),
    });
    for (i, node) in replacement.into_iter().enumerate() {
        let mut path = block_path.to_vec();
        path.push(base_child_ix + i);
        ops.push(Op::InsertNode { path, node });
    }

    let mut caret_path = block_path.to_vec();
    caret_path.push(caret_child_ix);
    let selection_after = Selection::collapsed(Point::new(caret_path, 0));
    Ok((ops, selection_after))
}

fn apply_mark_range(
    editor: &crate::core::Editor,
    sel: &Selection,
    apply: &dyn Fn(Marks) -> Marks,
) -> Result<(Vec<Op>, Selection), String> {
    let (start, end) = ordered_selection_points(sel);

    let Some(start_block_path) = start.path.split_last().map(|(_, p)| p.to_vec()) else {
        return Err("Selection start is not in a text block".into());
    };
    let Some(end_block_path) = end.path.split_last().map(|(_, p)| p.to_vec()) else {
        return Err("Selection end is not in a text block".into());
    };

    let blocks = text_blocks_in_order(editor.doc(), editor.registry());
    let start_index = blocks
        .iter()
        .position(|b| b.path == start_block_path)
        .ok_or_else(|| "Selection start is not in a text block".to_string())?;
    let end_index = blocks
        .iter()
        .position(|b| b.path == end_block_path)
        .ok_or_else(|| "Selection end is not in a text block".to_string())?;

    let (start_index, end_index) = if start_index <= end_index {
        (start_index, end_index)
    } else {
        (end_index, start_index)
    };

    let start_inline_ix = start.path.last().copied().unwrap_or(0);
    let end_inline_ix = end.path.last().copied().unwrap_or(0);

    let mut ops: Vec<Op> = Vec::new();
    let mut new_anchor = sel.anchor.clone();
    let mut new_focus = sel.focus.clone();

    for (block_index, block) in blocks
        .iter()
        .enumerate()
        .take(end_index + 1)
        .skip(start_index)
    {
        let children = block.el.children.as_slice();
        let total_len = total_inline_text_len(children);
        if total_len == 0 {
            continue;
        }

        let start_global = if block_index == start_index {
            point_global_offset(children, start_inline_ix, start.offset)
        } else {
            0
        };
        let end_global = if block_index == end_index {
            point_global_offset(children, end_inline_ix, end.offset)
        } else {
            total_len
        };

        if start_global >= end_global {
            continue;
        }

        let new_children = apply_marks_in_block(children, start_global, end_global, apply);

        for child_ix in (0..children.len()).rev() {
            let mut remove_path = block.path.clone();
            remove_path.push(child_ix);
            ops.push(Op::RemoveNode { path: remove_path });
        }
        for (child_ix, node) in new_children.iter().cloned().enumerate() {
            let mut insert_path = block.path.clone();
            insert_path.push(child_ix);
            ops.push(Op::InsertNode {
                path: insert_path,
                node,
            });
        }

        if is_point_in_block(&new_anchor, &block.path) {
            let global = point_global_offset(
                children,
                new_anchor.path.last().copied().unwrap_or(0),
                new_anchor.offset,
            );
            new_anchor = point_for_global_offset(&block.path, &new_children, global);
        }
        if is_point_in_block(&new_focus, &block.path) {
            let global = point_global_offset(
                children,
                new_focus.path.last().copied().unwrap_or(0),
                new_focus.offset,
            );
            new_focus = point_for_global_offset(&block.path, &new_children, global);
        }
    }

    Ok((
        ops,
        Selection {
            anchor: new_anchor,
            focus: new_focus,
        },
    ))
}
