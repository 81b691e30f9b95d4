use serde_json::json;
use vellum_doc_core::{
    CONTENT_KEY, ContentStore, Document, DocumentValue, MemoryStore, Node, PluginRegistry, Point,
    Selection, Session, Transaction,
};

#[test]
fn empty_store_opens_a_default_document() {
    let session = Session::open(Box::new(MemoryStore::new()), PluginRegistry::richtext());
    assert_eq!(session.editor().doc().children, vec![Node::paragraph("")]);
    assert!(session.store().get(CONTENT_KEY).is_none());
}

#[test]
fn corrupt_store_falls_back_to_a_default_document() {
    let mut store = MemoryStore::new();
    store.set(CONTENT_KEY, "{not json".to_string());

    let session = Session::open(Box::new(store), PluginRegistry::richtext());
    assert_eq!(session.editor().doc().children, vec![Node::paragraph("")]);
}

#[test]
fn foreign_schema_falls_back_to_a_default_document() {
    let mut store = MemoryStore::new();
    store.set(
        CONTENT_KEY,
        json!({ "schema": "other", "version": 1, "document": { "children": [] } }).to_string(),
    );

    let session = Session::open(Box::new(store), PluginRegistry::richtext());
    assert_eq!(session.editor().doc().children, vec![Node::paragraph("")]);
}

#[test]
fn stored_document_is_loaded_on_open() {
    let doc = Document {
        children: vec![Node::paragraph("saved")],
    };
    let mut store = MemoryStore::new();
    store.set(
        CONTENT_KEY,
        DocumentValue::from_document(doc.clone())
            .to_json_pretty()
            .unwrap(),
    );

    let session = Session::open(Box::new(store), PluginRegistry::richtext());
    assert_eq!(*session.editor().doc(), doc);
}

#[test]
fn content_commands_persist_the_post_change_tree() {
    let mut session = Session::open(Box::new(MemoryStore::new()), PluginRegistry::richtext());

    session
        .run_command("core.insert_text", Some(json!({ "text": "hi" })))
        .unwrap();

    let raw = session.store().get(CONTENT_KEY).unwrap();
    let stored = DocumentValue::from_json_str(&raw)
        .unwrap()
        .into_document()
        .unwrap();
    assert_eq!(stored, *session.editor().doc());
    assert!(matches!(&stored.children[0], Node::Element(el)
        if matches!(&el.children[0], Node::Text(t) if t.text == "hi")));
}

#[test]
fn selection_only_transactions_never_write() {
    let mut session = Session::open(Box::new(MemoryStore::new()), PluginRegistry::richtext());

    let tx = Transaction::new(Vec::new())
        .selection_after(Selection::collapsed(Point::new(vec![0, 0], 0)));
    session.apply(tx).unwrap();
    session.set_selection(Selection::collapsed(Point::new(vec![0, 0], 0)));

    assert!(session.store().get(CONTENT_KEY).is_none());
}

#[test]
fn queries_do_not_write() {
    let mut session = Session::open(Box::new(MemoryStore::new()), PluginRegistry::richtext());
    session.run_query_json("block.get_active_type", None).unwrap();
    assert!(session.store().get(CONTENT_KEY).is_none());

    // A command that ends up changing nothing does not write either.
    session
        .run_command("core.delete_backward", None)
        .unwrap();
    assert!(session.store().get(CONTENT_KEY).is_none());
}
