use serde_json::json;
use vellum_doc_core::{Document, Editor, Node, PluginRegistry, Point, Selection};

fn editor_with(children: Vec<Node>, caret: Point) -> Editor {
    Editor::new(
        Document { children },
        Selection::collapsed(caret),
        PluginRegistry::richtext(),
    )
}

fn top_kind(editor: &Editor, ix: usize) -> String {
    match &editor.doc().children[ix] {
        Node::Element(el) => el.kind.clone(),
        other => panic!("expected element, got {other:?}"),
    }
}

#[test]
fn set_type_switches_the_block_kind() {
    let mut editor = editor_with(vec![Node::paragraph("title")], Point::new(vec![0, 0], 0));

    editor
        .run_command("block.set_type", Some(json!({ "type": "headingOne" })))
        .unwrap();
    assert_eq!(top_kind(&editor, 0), "headingOne");

    let active: String = editor.run_query("block.get_active_type", None).unwrap();
    assert_eq!(active, "headingOne");

    let is_heading: bool = editor
        .run_query("block.is_active", Some(json!({ "type": "headingOne" })))
        .unwrap();
    assert!(is_heading);
    let is_quote: bool = editor
        .run_query("block.is_active", Some(json!({ "type": "blockquote" })))
        .unwrap();
    assert!(!is_quote);
}

#[test]
fn set_type_toggles_back_to_paragraph() {
    let mut editor = editor_with(vec![Node::paragraph("q")], Point::new(vec![0, 0], 0));

    editor
        .run_command("block.set_type", Some(json!({ "type": "blockquote" })))
        .unwrap();
    assert_eq!(top_kind(&editor, 0), "blockquote");

    editor
        .run_command("block.set_type", Some(json!({ "type": "blockquote" })))
        .unwrap();
    assert_eq!(top_kind(&editor, 0), "paragraph");
}

#[test]
fn set_type_keeps_the_block_content() {
    let mut editor = editor_with(vec![Node::paragraph("keep me")], Point::new(vec![0, 0], 3));

    editor
        .run_command("block.set_type", Some(json!({ "type": "alignCenter" })))
        .unwrap();

    let Node::Element(el) = &editor.doc().children[0] else {
        panic!("expected element");
    };
    assert_eq!(el.kind, "alignCenter");
    assert!(matches!(&el.children[0], Node::Text(t) if t.text == "keep me"));
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0], 3));
}

#[test]
fn set_type_rejects_unknown_kinds() {
    let mut editor = editor_with(vec![Node::paragraph("x")], Point::new(vec![0, 0], 0));
    let result = editor.run_command("block.set_type", Some(json!({ "type": "marquee" })));
    assert!(result.is_err());
}

#[test]
fn toggle_list_wraps_the_block() {
    let mut editor = editor_with(vec![Node::paragraph("item")], Point::new(vec![0, 0], 2));

    editor
        .run_command("block.toggle_list", Some(json!({ "type": "unorderedList" })))
        .unwrap();

    let Node::Element(list) = &editor.doc().children[0] else {
        panic!("expected list");
    };
    assert_eq!(list.kind, "unorderedList");
    let Node::Element(item) = &list.children[0] else {
        panic!("expected list item");
    };
    assert_eq!(item.kind, "list-item");
    assert!(matches!(&item.children[0], Node::Text(t) if t.text == "item"));
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0, 0], 2));
}

#[test]
fn toggle_list_twice_unwraps_back_to_paragraphs() {
    let mut editor = editor_with(vec![Node::paragraph("item")], Point::new(vec![0, 0], 0));

    editor
        .run_command("block.toggle_list", Some(json!({ "type": "orderedList" })))
        .unwrap();
    editor
        .run_command("block.toggle_list", Some(json!({ "type": "orderedList" })))
        .unwrap();

    assert_eq!(top_kind(&editor, 0), "paragraph");
    assert!(matches!(&editor.doc().children[0], Node::Element(el)
        if matches!(&el.children[0], Node::Text(t) if t.text == "item")));
}

#[test]
fn toggle_list_switches_list_kind() {
    let mut editor = editor_with(vec![Node::paragraph("item")], Point::new(vec![0, 0], 0));

    editor
        .run_command("block.toggle_list", Some(json!({ "type": "unorderedList" })))
        .unwrap();
    editor
        .run_command("block.toggle_list", Some(json!({ "type": "orderedList" })))
        .unwrap();

    let Node::Element(list) = &editor.doc().children[0] else {
        panic!("expected list");
    };
    assert_eq!(list.kind, "orderedList");
    assert!(matches!(&list.children[0], Node::Element(item) if item.kind == "list-item"));
}

#[test]
fn table_insert_builds_the_grid_with_a_trailing_paragraph() {
    let mut editor = editor_with(vec![Node::paragraph("before")], Point::new(vec![0, 0], 0));

    editor
        .run_command("table.insert", Some(json!({ "rows": 2, "cols": 3 })))
        .unwrap();

    assert_eq!(editor.doc().children.len(), 3);
    let Node::Element(table) = &editor.doc().children[1] else {
        panic!("expected table");
    };
    assert_eq!(table.kind, "table");
    assert_eq!(table.children.len(), 2);
    for row in &table.children {
        let Node::Element(row) = row else {
            panic!("expected row");
        };
        assert_eq!(row.kind, "table-row");
        assert_eq!(row.children.len(), 3);
        for cell in &row.children {
            assert!(matches!(cell, Node::Element(c) if c.kind == "table-cell"));
        }
    }
    assert_eq!(top_kind(&editor, 2), "paragraph");
    assert_eq!(editor.selection().focus, Point::new(vec![1, 0, 0, 0], 0));
}

#[test]
fn link_insert_splits_the_leaf_at_the_caret() {
    let mut editor = editor_with(vec![Node::paragraph("hello")], Point::new(vec![0, 0], 2));

    editor
        .run_command(
            "link.insert",
            Some(json!({ "href": "https://example.com", "text": "here" })),
        )
        .unwrap();

    let Node::Element(el) = &editor.doc().children[0] else {
        panic!("expected paragraph");
    };
    assert!(matches!(&el.children[0], Node::Text(t) if t.text == "he"));
    let Node::Element(link) = &el.children[1] else {
        panic!("expected link");
    };
    assert_eq!(link.kind, "link");
    assert_eq!(
        link.attrs.get("href").and_then(|v| v.as_str()),
        Some("https://example.com")
    );
    assert!(matches!(&link.children[0], Node::Text(t) if t.text == "here"));
    assert!(matches!(&el.children[2], Node::Text(t) if t.text == "llo"));
}

#[test]
fn link_text_defaults_to_the_href() {
    let mut editor = editor_with(vec![Node::paragraph("")], Point::new(vec![0, 0], 0));

    editor
        .run_command("link.insert", Some(json!({ "href": "https://example.com" })))
        .unwrap();

    let Node::Element(el) = &editor.doc().children[0] else {
        panic!("expected paragraph");
    };
    let link = el
        .children
        .iter()
        .find_map(|n| match n {
            Node::Element(link) if link.kind == "link" => Some(link),
            _ => None,
        })
        .unwrap();
    assert!(matches!(&link.children[0], Node::Text(t) if t.text == "https://example.com"));
}
