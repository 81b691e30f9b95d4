use serde_json::Value;
use vellum_doc_core::{Attrs, Document, Node, VoidNode};
use vellum_html::{MarkupElement, import_document, render_document, void_wrapper};

fn image(attrs: &[(&str, &str)]) -> VoidNode {
    let mut map = Attrs::default();
    for (k, v) in attrs {
        map.insert(k.to_string(), Value::String(v.to_string()));
    }
    VoidNode::new("image", map)
}

#[test]
fn uploaded_src_wins_over_url() {
    let v = image(&[
        ("url", "https://example.com/a.png"),
        ("src", "data:image/png;base64,AAAA"),
    ]);
    let wrapper = void_wrapper(&v);
    assert_eq!(wrapper.tag, "img");
    assert!(
        wrapper
            .attrs
            .iter()
            .any(|(k, v)| k == "src" && v == "data:image/png;base64,AAAA")
    );
}

#[test]
fn url_is_used_when_no_upload_exists() {
    let v = image(&[("url", "https://example.com/a.png")]);
    let wrapper = void_wrapper(&v);
    assert!(
        wrapper
            .attrs
            .iter()
            .any(|(k, v)| k == "src" && v == "https://example.com/a.png")
    );
}

#[test]
fn image_renders_with_dimensions_and_alt() {
    let v = image(&[
        ("url", "https://example.com/a.png"),
        ("width", "300px"),
        ("height", "auto"),
        ("alt", "EditorImage"),
    ]);
    let doc = Document {
        children: vec![Node::Void(v), Node::paragraph("")],
    };
    let html = render_document(&doc);
    assert!(html.starts_with("<img "));
    assert!(html.contains("src=\"https://example.com/a.png\""));
    assert!(html.contains("alt=\"EditorImage\""));
    assert!(html.contains("width: 300px"));
    assert!(html.contains("height: auto"));
}

#[test]
fn video_renders_as_iframe() {
    let mut attrs = Attrs::default();
    attrs.insert(
        "url".to_string(),
        Value::String("https://example.com/clip".to_string()),
    );
    let doc = Document {
        children: vec![Node::Void(VoidNode::new("video", attrs))],
    };
    let html = render_document(&doc);
    assert!(html.contains("<iframe src=\"https://example.com/clip\""));
    assert!(html.ends_with("</iframe>"));
}

#[test]
fn imported_markup_round_trips_through_the_renderer() {
    let mut root = MarkupElement::new("body");
    let mut child = MarkupElement::new("p");
    child.class = Some("intro".to_string());
    child.style = Some("color: red".to_string());
    child.text = Some("hello".to_string());
    root.children.push(child);

    let doc = import_document(&root);
    let html = render_document(&doc);

    assert!(html.contains("class=\"intro\""));
    assert!(html.contains("color: red"));
    assert!(html.contains("hello"));
}

#[test]
fn nested_blocks_render_in_document_order() {
    use vellum_doc_core::ElementNode;

    let doc = Document {
        children: vec![Node::Element(ElementNode {
            kind: "unorderedList".to_string(),
            attrs: Attrs::default(),
            children: vec![
                Node::Element(ElementNode {
                    kind: "list-item".to_string(),
                    attrs: Attrs::default(),
                    children: vec![Node::Text(vellum_doc_core::TextNode {
                        text: "one".to_string(),
                        marks: Default::default(),
                    })],
                }),
                Node::Element(ElementNode {
                    kind: "list-item".to_string(),
                    attrs: Attrs::default(),
                    children: vec![Node::Text(vellum_doc_core::TextNode {
                        text: "two".to_string(),
                        marks: Default::default(),
                    })],
                }),
            ],
        })],
    };

    assert_eq!(
        render_document(&doc),
        "<ul><li>one</li><li>two</li></ul>"
    );
}
