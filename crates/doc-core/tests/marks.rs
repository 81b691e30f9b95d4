use serde_json::json;
use vellum_doc_core::{
    Document, Editor, ElementNode, Marks, Node, PluginRegistry, Point, Selection, TextNode,
};

fn paragraph_with(leaves: Vec<TextNode>) -> Node {
    Node::Element(ElementNode {
        kind: "paragraph".to_string(),
        attrs: Default::default(),
        children: leaves.into_iter().map(Node::Text).collect(),
    })
}

fn plain(text: &str) -> TextNode {
    TextNode {
        text: text.to_string(),
        marks: Marks::default(),
    }
}

fn bold(text: &str) -> TextNode {
    TextNode {
        text: text.to_string(),
        marks: Marks {
            bold: true,
            ..Marks::default()
        },
    }
}

#[test]
fn range_toggle_splits_the_leaf() {
    let doc = Document {
        children: vec![Node::paragraph("hello world")],
    };
    let selection = Selection {
        anchor: Point::new(vec![0, 0], 0),
        focus: Point::new(vec![0, 0], 5),
    };
    let mut editor = Editor::new(doc, selection, PluginRegistry::richtext());

    editor.run_command("marks.toggle_bold", None).unwrap();

    let Node::Element(el) = &editor.doc().children[0] else {
        panic!("expected paragraph");
    };
    assert_eq!(el.children.len(), 2);
    assert!(matches!(&el.children[0], Node::Text(t) if t.text == "hello" && t.marks.bold));
    assert!(matches!(&el.children[1], Node::Text(t) if t.text == " world" && !t.marks.bold));
}

#[test]
fn mixed_range_becomes_uniform_then_merges() {
    let doc = Document {
        children: vec![paragraph_with(vec![bold("ab"), plain("cd")])],
    };
    let selection = Selection {
        anchor: Point::new(vec![0, 0], 0),
        focus: Point::new(vec![0, 1], 2),
    };
    let mut editor = Editor::new(doc, selection, PluginRegistry::richtext());

    editor.run_command("marks.toggle_bold", None).unwrap();

    let Node::Element(el) = &editor.doc().children[0] else {
        panic!("expected paragraph");
    };
    assert_eq!(el.children.len(), 1);
    assert!(matches!(&el.children[0], Node::Text(t) if t.text == "abcd" && t.marks.bold));
}

#[test]
fn fully_marked_range_toggles_off() {
    let doc = Document {
        children: vec![paragraph_with(vec![bold("abcd")])],
    };
    let selection = Selection {
        anchor: Point::new(vec![0, 0], 0),
        focus: Point::new(vec![0, 0], 4),
    };
    let mut editor = Editor::new(doc, selection, PluginRegistry::richtext());

    editor.run_command("marks.toggle_bold", None).unwrap();

    let Node::Element(el) = &editor.doc().children[0] else {
        panic!("expected paragraph");
    };
    assert!(matches!(&el.children[0], Node::Text(t) if t.text == "abcd" && !t.marks.bold));
}

#[test]
fn caret_toggle_inserts_an_empty_marked_leaf() {
    let doc = Document {
        children: vec![Node::paragraph("ab")],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0], 1));
    let mut editor = Editor::new(doc, selection, PluginRegistry::richtext());

    editor.run_command("marks.toggle_bold", None).unwrap();

    let Node::Element(el) = &editor.doc().children[0] else {
        panic!("expected paragraph");
    };
    assert_eq!(el.children.len(), 3);
    assert!(matches!(&el.children[0], Node::Text(t) if t.text == "a" && !t.marks.bold));
    assert!(matches!(&el.children[1], Node::Text(t) if t.text.is_empty() && t.marks.bold));
    assert!(matches!(&el.children[2], Node::Text(t) if t.text == "b" && !t.marks.bold));
    assert_eq!(editor.selection().focus, Point::new(vec![0, 1], 0));
}

#[test]
fn set_and_unset_color_over_a_range() {
    let doc = Document {
        children: vec![Node::paragraph("hi")],
    };
    let selection = Selection {
        anchor: Point::new(vec![0, 0], 0),
        focus: Point::new(vec![0, 0], 2),
    };
    let mut editor = Editor::new(doc, selection, PluginRegistry::richtext());

    editor
        .run_command("marks.set_color", Some(json!({ "color": "red" })))
        .unwrap();
    let Node::Element(el) = &editor.doc().children[0] else {
        panic!("expected paragraph");
    };
    assert!(matches!(&el.children[0], Node::Text(t) if t.marks.color.as_deref() == Some("red")));

    editor.run_command("marks.unset_color", None).unwrap();
    let Node::Element(el) = &editor.doc().children[0] else {
        panic!("expected paragraph");
    };
    assert!(matches!(&el.children[0], Node::Text(t) if t.marks.color.is_none()));
}

#[test]
fn active_marks_follow_the_caret() {
    let doc = Document {
        children: vec![paragraph_with(vec![bold("ab"), plain("cd")])],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0], 1));
    let editor = Editor::new(doc, selection, PluginRegistry::richtext());

    let marks: Marks = editor.run_query("marks.get_active", None).unwrap();
    assert!(marks.bold);

    let mut editor = editor;
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 1], 1)));
    let marks: Marks = editor.run_query("marks.get_active", None).unwrap();
    assert!(!marks.bold);
}

#[test]
fn font_size_applies_across_blocks() {
    let doc = Document {
        children: vec![Node::paragraph("ab"), Node::paragraph("cd")],
    };
    let selection = Selection {
        anchor: Point::new(vec![0, 0], 0),
        focus: Point::new(vec![1, 0], 2),
    };
    let mut editor = Editor::new(doc, selection, PluginRegistry::richtext());

    editor
        .run_command("marks.set_font_size", Some(json!({ "size": "huge" })))
        .unwrap();

    for block in &editor.doc().children {
        let Node::Element(el) = block else {
            panic!("expected paragraph");
        };
        assert!(
            matches!(&el.children[0], Node::Text(t) if t.marks.font_size.as_deref() == Some("huge"))
        );
    }
}
