use serde_json::json;
use vellum_doc_core::{
    Attrs, Document, Editor, Node, PluginRegistry, Point, Selection, VoidNode,
};

fn editor_with(children: Vec<Node>, caret: Point) -> Editor {
    Editor::new(
        Document { children },
        Selection::collapsed(caret),
        PluginRegistry::richtext(),
    )
}

#[test]
fn insert_text_at_the_caret() {
    let mut editor = editor_with(vec![Node::paragraph("ac")], Point::new(vec![0, 0], 1));

    editor
        .run_command("core.insert_text", Some(json!({ "text": "b" })))
        .unwrap();

    assert!(matches!(&editor.doc().children[0], Node::Element(el)
        if matches!(&el.children[0], Node::Text(t) if t.text == "abc")));
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0], 2));
}

#[test]
fn delete_backward_within_a_leaf() {
    let mut editor = editor_with(vec![Node::paragraph("abc")], Point::new(vec![0, 0], 2));

    editor.run_command("core.delete_backward", None).unwrap();

    assert!(matches!(&editor.doc().children[0], Node::Element(el)
        if matches!(&el.children[0], Node::Text(t) if t.text == "ac")));
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0], 1));
}

#[test]
fn delete_backward_handles_multibyte_boundaries() {
    let mut editor = editor_with(vec![Node::paragraph("aé")], Point::new(vec![0, 0], 3));

    editor.run_command("core.delete_backward", None).unwrap();

    assert!(matches!(&editor.doc().children[0], Node::Element(el)
        if matches!(&el.children[0], Node::Text(t) if t.text == "a")));
}

#[test]
fn delete_backward_merges_with_the_previous_block() {
    let mut editor = editor_with(
        vec![Node::paragraph("ab"), Node::paragraph("cd")],
        Point::new(vec![1, 0], 0),
    );

    editor.run_command("core.delete_backward", None).unwrap();

    assert_eq!(editor.doc().children.len(), 1);
    assert!(matches!(&editor.doc().children[0], Node::Element(el)
        if matches!(&el.children[0], Node::Text(t) if t.text == "abcd")));
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0], 2));
}

#[test]
fn delete_backward_removes_a_previous_void() {
    let mut editor = editor_with(
        vec![
            Node::paragraph("a"),
            Node::Void(VoidNode::new("image", Attrs::default())),
            Node::paragraph("b"),
        ],
        Point::new(vec![2, 0], 0),
    );

    editor.run_command("core.delete_backward", None).unwrap();

    assert_eq!(editor.doc().children.len(), 2);
    assert!(editor.doc().children.iter().all(|n| !n.is_void()));
}

#[test]
fn delete_backward_at_document_start_is_a_no_op() {
    let mut editor = editor_with(vec![Node::paragraph("ab")], Point::new(vec![0, 0], 0));
    let before = editor.doc().clone();

    editor.run_command("core.delete_backward", None).unwrap();

    assert_eq!(*editor.doc(), before);
}

#[test]
fn insert_text_requires_a_collapsed_selection() {
    let doc = Document {
        children: vec![Node::paragraph("ab")],
    };
    let selection = Selection {
        anchor: Point::new(vec![0, 0], 0),
        focus: Point::new(vec![0, 0], 2),
    };
    let mut editor = Editor::new(doc, selection, PluginRegistry::richtext());

    let result = editor.run_command("core.insert_text", Some(json!({ "text": "x" })));
    assert!(result.is_err());
}
