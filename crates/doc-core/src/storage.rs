use std::collections::HashMap;

use serde_json::Value;

use crate::core::{Document, Editor, Node, Point, Selection};
use crate::ops::Transaction;
use crate::plugin::{CommandError, PluginRegistry, QueryError};
use crate::serde_value::DocumentValue;

/// Key under which the serialized document lives in the store.
pub const CONTENT_KEY: &str = "content";

/// Key/value persistence the session writes through. The host decides
/// what backs it: browser local storage, a file, a database row.
pub trait ContentStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }
}

/// An editor bound to a store. Content changes persist the post-change
/// tree; selection-only updates never touch the store.
pub struct Session {
    editor: Editor,
    store: Box<dyn ContentStore>,
}

impl Session {
    /// Loads the stored document, falling back to a fresh single-paragraph
    /// document when the store is empty or holds something unreadable.
    pub fn open(store: Box<dyn ContentStore>, registry: PluginRegistry) -> Self {
        let doc = store
            .get(CONTENT_KEY)
            .and_then(|raw| DocumentValue::from_json_str(&raw).ok())
            .and_then(|value| value.into_document().ok())
            .unwrap_or_else(|| Document {
                children: vec![Node::paragraph("")],
            });

        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        let editor = Editor::new(doc, selection, registry);
        Self { editor, store }
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.editor.set_selection(selection);
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<(), crate::core::ApplyError> {
        if !tx.is_content_change() {
            if let Some(selection) = tx.selection_after {
                self.editor.set_selection(selection);
            }
            return Ok(());
        }

        self.editor.apply(tx)?;
        self.persist();
        Ok(())
    }

    pub fn run_command(&mut self, id: &str, args: Option<Value>) -> Result<(), CommandError> {
        let before = self.editor.doc().clone();
        self.editor.run_command(id, args)?;
        if *self.editor.doc() != before {
            self.persist();
        }
        Ok(())
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        self.editor.run_query_json(id, args)
    }

    fn persist(&mut self) {
        let value = DocumentValue::from_document(self.editor.doc().clone());
        if let Ok(json) = value.to_json_pretty() {
            self.store.set(CONTENT_KEY, json);
        }
    }
}
