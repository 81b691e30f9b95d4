use serde::{Deserialize, Serialize};

use vellum_doc_core::{Attrs, Document, ElementNode, Marks, Node, TextNode};

use crate::style::apply_declarations;

/// A parsed foreign markup element, one step removed from whichever
/// parser produced it. Only the attributes the importer understands are
/// carried over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupElement {
    pub tag: String,
    pub class: Option<String>,
    pub id: Option<String>,
    pub style: Option<String>,
    pub text: Option<String>,
    pub children: Vec<MarkupElement>,
}

impl MarkupElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Concatenates this element's text and all descendant text, in
    /// document order.
    pub fn flattened_text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(el: &MarkupElement, out: &mut String) {
    if let Some(text) = &el.text {
        out.push_str(text);
    }
    for child in &el.children {
        collect_text(child, out);
    }
}

/// Imports foreign markup as a flat document: one paragraph per top-level
/// child, each with a single text leaf carrying the child's class, id and
/// style as marks. Nested structure flattens to its text.
pub fn import_document(root: &MarkupElement) -> Document {
    let mut children: Vec<Node> = Vec::new();

    for child in &root.children {
        let mut marks = Marks::default();
        marks.class_name = child.class.clone();
        marks.id = child.id.clone();
        if let Some(style) = &child.style {
            marks.style = Some(style.clone());
            apply_declarations(&mut marks, style);
        }

        children.push(Node::Element(ElementNode {
            kind: "paragraph".to_string(),
            attrs: Attrs::default(),
            children: vec![Node::Text(TextNode {
                text: child.flattened_text(),
                marks,
            })],
        }));
    }

    if children.is_empty() {
        children.push(Node::paragraph(""));
    }

    Document { children }
}
