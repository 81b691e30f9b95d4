use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Editor, Node, Point, Selection, VoidNode};
use crate::ops::{Op, Transaction};
use crate::plugin::{ChildConstraint, CommandError, CommandSpec, EditorPlugin, NodeRole, NodeSpec};

/// Payload collected by the embed dialog before an image or video is
/// committed to the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
}

impl EmbedData {
    pub fn has_source(&self) -> bool {
        non_empty(&self.url).is_some() || non_empty(&self.src).is_some()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// A bare numeric dimension gets a `px` suffix; anything already carrying
/// a unit (`50%`, `10em`) passes through. Missing width defaults to
/// `100%`, missing height to `auto`.
fn canonical_width(value: &Option<String>) -> String {
    canonical_dimension(value, "100%")
}

fn canonical_height(value: &Option<String>) -> String {
    canonical_dimension(value, "auto")
}

fn canonical_dimension(value: &Option<String>, fallback: &str) -> String {
    let Some(raw) = non_empty(value) else {
        return fallback.to_string();
    };
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return format!("{raw}px");
    }
    raw.to_string()
}

pub fn image_node(data: &EmbedData) -> Node {
    let mut attrs = crate::core::Attrs::default();
    if let Some(url) = non_empty(&data.url) {
        attrs.insert("url".to_string(), Value::String(url.to_string()));
    }
    if let Some(src) = non_empty(&data.src) {
        attrs.insert("src".to_string(), Value::String(src.to_string()));
    }
    attrs.insert(
        "width".to_string(),
        Value::String(canonical_width(&data.width)),
    );
    attrs.insert(
        "height".to_string(),
        Value::String(canonical_height(&data.height)),
    );
    attrs.insert("alt".to_string(), Value::String("EditorImage".to_string()));
    Node::Void(VoidNode::new("image", attrs))
}

pub fn video_node(data: &EmbedData) -> Node {
    let mut attrs = crate::core::Attrs::default();
    if let Some(url) = non_empty(&data.url) {
        attrs.insert("url".to_string(), Value::String(url.to_string()));
    }
    attrs.insert(
        "width".to_string(),
        Value::String(canonical_width(&data.width)),
    );
    attrs.insert(
        "height".to_string(),
        Value::String(canonical_height(&data.height)),
    );
    Node::Void(VoidNode::new("video", attrs))
}

/// Builds the two-op insert: the void goes in right after the caret's
/// top-level block, a fresh paragraph goes in after it, and the caret
/// lands in that paragraph.
pub fn insert_embed(editor: &Editor, node: Node) -> Transaction {
    let insert_at = match editor.selection().focus.path.first() {
        Some(&top) => top + 1,
        None => editor.doc().children.len(),
    };

    let caret = Point::new(vec![insert_at + 1, 0], 0);
    Transaction::new(vec![
        Op::InsertNode {
            path: vec![insert_at],
            node,
        },
        Op::InsertNode {
            path: vec![insert_at + 1],
            node: Node::paragraph(""),
        },
    ])
    .selection_after(Selection::collapsed(caret))
    .source("command:embed.insert")
}

/// Dialog state for collecting an embed. `submit` hands back the pending
/// data only when a source was provided; an empty form submits to nothing,
/// mirroring the silent no-op of `embed.insert`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EmbedForm {
    #[default]
    Closed,
    Open(EmbedData),
}

impl EmbedForm {
    pub fn open(&mut self) {
        *self = EmbedForm::Open(EmbedData::default());
    }

    pub fn is_open(&self) -> bool {
        matches!(self, EmbedForm::Open(_))
    }

    pub fn pending(&self) -> Option<&EmbedData> {
        match self {
            EmbedForm::Open(data) => Some(data),
            EmbedForm::Closed => None,
        }
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        if let EmbedForm::Open(data) = self {
            data.url = Some(url.into());
        }
    }

    pub fn set_width(&mut self, width: impl Into<String>) {
        if let EmbedForm::Open(data) = self {
            data.width = Some(width.into());
        }
    }

    pub fn set_height(&mut self, height: impl Into<String>) {
        if let EmbedForm::Open(data) = self {
            data.height = Some(height.into());
        }
    }

    /// Records an uploaded file as a data URI. An upload wins over a
    /// previously typed URL at render time.
    pub fn attach_upload(&mut self, data_uri: impl Into<String>) {
        if let EmbedForm::Open(data) = self {
            data.src = Some(data_uri.into());
        }
    }

    pub fn cancel(&mut self) {
        *self = EmbedForm::Closed;
    }

    pub fn submit(&mut self) -> Option<EmbedData> {
        let EmbedForm::Open(data) = std::mem::take(self) else {
            return None;
        };
        data.has_source().then_some(data)
    }
}

pub(crate) struct EmbedPlugin;

impl EditorPlugin for EmbedPlugin {
    fn id(&self) -> &'static str {
        "embed"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec {
                kind: "image".to_string(),
                role: NodeRole::Block,
                is_void: true,
                children: ChildConstraint::None,
            },
            NodeSpec {
                kind: "video".to_string(),
                role: NodeRole::Block,
                is_void: true,
                children: ChildConstraint::None,
            },
        ]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("embed.insert", "Insert embed", |editor, args| {
                let format = args
                    .as_ref()
                    .and_then(|v| v.get("format"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CommandError::new("Missing args.format"))?
                    .to_string();

                let data: EmbedData = match &args {
                    Some(v) => serde_json::from_value(v.clone())
                        .map_err(|err| CommandError::new(format!("Invalid embed args: {err}")))?,
                    None => EmbedData::default(),
                };

                // Nothing to embed; the dialog was submitted empty.
                if !data.has_source() {
                    return Ok(());
                }

                let node = match format.as_str() {
                    "image" => image_node(&data),
                    "video" => video_node(&data),
                    other => {
                        return Err(CommandError::new(format!("Unknown embed format: {other}")));
                    }
                };

                let tx = insert_embed(editor, node);
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to insert embed: {e:?}")))
            })
            .description("Insert an image or video void block after the caret block.")
            .keywords(["image", "video", "embed", "media", "upload"])
            .args_example(serde_json::json!({
                "format": "image",
                "url": "https://example.com/cat.png",
                "width": "300",
                "height": ""
            })),
        ]
    }
}
