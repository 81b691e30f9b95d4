use serde::{Deserialize, Serialize};

use vellum_doc_core::{Document, ElementNode, Marks, Node, VoidNode};

use crate::style::parse_declarations;

/// One HTML element to wrap content in: a tag plus the inline css,
/// class, id and plain attributes that go on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wrapper {
    pub tag: String,
    pub css: Vec<(String, String)>,
    pub class: Option<String>,
    pub id: Option<String>,
    pub attrs: Vec<(String, String)>,
}

impl Wrapper {
    fn tag(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    fn css(mut self, property: &str, value: impl Into<String>) -> Self {
        self.css.push((property.to_string(), value.into()));
        self
    }

    fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.push((name.to_string(), value.into()));
        self
    }
}

/// Named font sizes the toolbar offers, as css lengths.
pub fn font_size_css(size: &str) -> &str {
    match size {
        "small" => "0.75em",
        "normal" => "1em",
        "medium" => "1.75em",
        "huge" => "2.5em",
        other => other,
    }
}

/// Named font families the toolbar offers, as css font stacks.
pub fn font_family_css(family: &str) -> &str {
    match family {
        "sans" => "Helvetica, Arial, sans-serif",
        "serif" => "Georgia, 'Times New Roman', serif",
        "monospace" => "Monaco, 'Courier New', monospace",
        other => other,
    }
}

/// Maps a block element to its wrapper. Total over kinds: anything
/// unrecognized renders as a paragraph.
pub fn block_wrapper(el: &ElementNode) -> Wrapper {
    match el.kind.as_str() {
        "headingOne" => Wrapper::tag("h1"),
        "headingTwo" => Wrapper::tag("h2"),
        "headingThree" => Wrapper::tag("h3"),
        "blockquote" => Wrapper::tag("blockquote"),
        "alignLeft" => Wrapper::tag("div")
            .css("text-align", "left")
            .css("list-style-position", "inside"),
        "alignCenter" => Wrapper::tag("div")
            .css("text-align", "center")
            .css("list-style-position", "inside"),
        "alignRight" => Wrapper::tag("div")
            .css("text-align", "right")
            .css("list-style-position", "inside"),
        "orderedList" => Wrapper::tag("ol"),
        "unorderedList" => Wrapper::tag("ul"),
        "list-item" => Wrapper::tag("li"),
        "table" => Wrapper::tag("table"),
        "table-row" => Wrapper::tag("tr"),
        "table-cell" => Wrapper::tag("td"),
        "link" => {
            let mut wrapper = Wrapper::tag("a");
            if let Some(href) = el.attrs.get("href").and_then(|v| v.as_str()) {
                wrapper = wrapper.attr("href", href);
            }
            wrapper
        }
        _ => Wrapper::tag("p"),
    }
}

/// Maps a void node to its wrapper. An uploaded `src` wins over a typed
/// `url` for images; videos only ever carry a url.
pub fn void_wrapper(v: &VoidNode) -> Wrapper {
    match v.kind.as_str() {
        "video" => {
            let mut wrapper = Wrapper::tag("iframe");
            if let Some(url) = v.attr_str("url") {
                wrapper = wrapper.attr("src", url);
            }
            if let Some(width) = v.attr_str("width") {
                wrapper = wrapper.css("width", width);
            }
            if let Some(height) = v.attr_str("height") {
                wrapper = wrapper.css("height", height);
            }
            wrapper
        }
        _ => {
            let mut wrapper = Wrapper::tag("img");
            let source = v.attr_str("src").or_else(|| v.attr_str("url"));
            if let Some(source) = source {
                wrapper = wrapper.attr("src", source);
            }
            wrapper = wrapper.attr("alt", v.attr_str("alt").unwrap_or("EditorImage"));
            if let Some(width) = v.attr_str("width") {
                wrapper = wrapper.css("width", width);
            }
            if let Some(height) = v.attr_str("height") {
                wrapper = wrapper.css("height", height);
            }
            wrapper
        }
    }
}

/// Computes the nested wrappers for a text leaf, outermost first. The
/// order is fixed so the same mark set always renders the same markup.
pub fn mark_wrappers(marks: &Marks) -> Vec<Wrapper> {
    let mut wrappers = Vec::new();

    if marks.bold {
        wrappers.push(Wrapper::tag("strong"));
    }
    if marks.code {
        wrappers.push(Wrapper::tag("code"));
    }
    if marks.italic {
        wrappers.push(Wrapper::tag("em"));
    }
    if marks.strikethrough {
        wrappers.push(Wrapper::tag("span").css("text-decoration", "line-through"));
    }
    if marks.underline {
        wrappers.push(Wrapper::tag("u"));
    }
    if marks.superscript {
        wrappers.push(Wrapper::tag("sup"));
    }
    if marks.subscript {
        wrappers.push(Wrapper::tag("sub"));
    }
    if let Some(color) = &marks.color {
        wrappers.push(Wrapper::tag("span").css("color", color.clone()));
    }
    if let Some(background) = &marks.background_color {
        wrappers.push(Wrapper::tag("span").css("background-color", background.clone()));
    }
    if let Some(size) = &marks.font_size {
        wrappers.push(Wrapper::tag("span").css("font-size", font_size_css(size)));
    }
    if let Some(family) = &marks.font_family {
        wrappers.push(Wrapper::tag("span").css("font-family", font_family_css(family)));
    }
    if let Some(class) = &marks.class_name {
        let mut wrapper = Wrapper::tag("span");
        wrapper.class = Some(class.clone());
        wrappers.push(wrapper);
    }
    if let Some(id) = &marks.id {
        let mut wrapper = Wrapper::tag("span");
        wrapper.id = Some(id.clone());
        wrappers.push(wrapper);
    }
    if let Some(style) = &marks.style {
        let mut wrapper = Wrapper::tag("span");
        wrapper.css = parse_declarations(style);
        wrappers.push(wrapper);
    }

    wrappers
}

/// Serializes a document to HTML.
pub fn render_document(doc: &Document) -> String {
    let mut out = String::new();
    for node in &doc.children {
        render_node(node, &mut out);
    }
    out
}

fn render_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => {
            let wrappers = mark_wrappers(&text.marks);
            for wrapper in &wrappers {
                open_tag(wrapper, false, out);
            }
            push_escaped(&text.text, out);
            for wrapper in wrappers.iter().rev() {
                out.push_str("</");
                out.push_str(&wrapper.tag);
                out.push('>');
            }
        }
        Node::Element(el) => {
            let wrapper = block_wrapper(el);
            open_tag(&wrapper, false, out);
            for child in &el.children {
                render_node(child, out);
            }
            out.push_str("</");
            out.push_str(&wrapper.tag);
            out.push('>');
        }
        Node::Void(v) => {
            let wrapper = void_wrapper(v);
            open_tag(&wrapper, wrapper.tag == "img", out);
            if wrapper.tag != "img" {
                out.push_str("</");
                out.push_str(&wrapper.tag);
                out.push('>');
            }
        }
    }
}

fn open_tag(wrapper: &Wrapper, self_closing: bool, out: &mut String) {
    out.push('<');
    out.push_str(&wrapper.tag);

    if let Some(class) = &wrapper.class {
        out.push_str(" class=\"");
        push_escaped(class, out);
        out.push('"');
    }
    if let Some(id) = &wrapper.id {
        out.push_str(" id=\"");
        push_escaped(id, out);
        out.push('"');
    }
    for (name, value) in &wrapper.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        push_escaped(value, out);
        out.push('"');
    }
    if !wrapper.css.is_empty() {
        out.push_str(" style=\"");
        for (ix, (property, value)) in wrapper.css.iter().enumerate() {
            if ix > 0 {
                out.push_str("; ");
            }
            push_escaped(property, out);
            out.push_str(": ");
            push_escaped(value, out);
        }
        out.push('"');
    }

    if self_closing {
        out.push_str(" />");
    } else {
        out.push('>');
    }
}

fn push_escaped(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_doc_core::{Attrs, TextNode};

    #[test]
    fn mark_wrapper_order_is_stable() {
        let marks = Marks {
            bold: true,
            italic: true,
            code: true,
            ..Marks::default()
        };
        let wrappers = mark_wrappers(&marks);
        let tags: Vec<&str> = wrappers.iter().map(|w| w.tag.as_str()).collect();
        assert_eq!(tags, vec!["strong", "code", "em"]);
    }

    #[test]
    fn font_tables_resolve_named_values() {
        assert_eq!(font_size_css("huge"), "2.5em");
        assert_eq!(font_size_css("12pt"), "12pt");
        assert_eq!(font_family_css("monospace"), "Monaco, 'Courier New', monospace");
    }

    #[test]
    fn unknown_block_kind_renders_as_paragraph() {
        let el = ElementNode {
            kind: "mystery".to_string(),
            attrs: Attrs::default(),
            children: vec![],
        };
        assert_eq!(block_wrapper(&el).tag, "p");
    }

    #[test]
    fn text_escapes_markup_characters() {
        let doc = Document {
            children: vec![Node::paragraph("a < b & c")],
        };
        assert_eq!(render_document(&doc), "<p>a &lt; b &amp; c</p>");
    }

    #[test]
    fn marked_leaf_nests_wrappers() {
        let doc = Document {
            children: vec![Node::Element(ElementNode {
                kind: "paragraph".to_string(),
                attrs: Attrs::default(),
                children: vec![Node::Text(TextNode {
                    text: "hi".to_string(),
                    marks: Marks {
                        bold: true,
                        underline: true,
                        ..Marks::default()
                    },
                })],
            })],
        };
        assert_eq!(render_document(&doc), "<p><strong><u>hi</u></strong></p>");
    }
}
