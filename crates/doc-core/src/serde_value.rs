use serde::{Deserialize, Serialize};

use crate::core::Document;

/// Persisted wrapper around a document. The `schema`/`version` pair lets
/// a reader reject payloads written by something else entirely before it
/// tries to interpret the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentValue {
    pub schema: String,
    pub version: u32,
    pub document: Document,
}

pub const DOCUMENT_SCHEMA: &str = "vellum";
pub const DOCUMENT_VERSION: u32 = 1;

impl DocumentValue {
    pub fn from_document(document: Document) -> Self {
        Self {
            schema: DOCUMENT_SCHEMA.to_string(),
            version: DOCUMENT_VERSION,
            document,
        }
    }

    pub fn into_document(self) -> Result<Document, String> {
        if self.schema != DOCUMENT_SCHEMA {
            return Err(format!("Unsupported schema: {}", self.schema));
        }
        if self.version != DOCUMENT_VERSION {
            return Err(format!("Unsupported version: {}", self.version));
        }
        Ok(self.document)
    }

    pub fn to_json_pretty(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|err| format!("Failed to serialize: {err}"))
    }

    pub fn from_json_str(value: &str) -> Result<Self, String> {
        serde_json::from_str(value).map_err(|err| format!("Failed to deserialize: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Node;

    #[test]
    fn document_value_round_trips() {
        let doc = Document {
            children: vec![Node::paragraph("hello")],
        };
        let value = DocumentValue::from_document(doc.clone());
        let json = value.to_json_pretty().unwrap();
        let restored = DocumentValue::from_json_str(&json).unwrap();
        assert_eq!(restored.schema, DOCUMENT_SCHEMA);
        assert_eq!(restored.version, DOCUMENT_VERSION);
        assert_eq!(restored.into_document().unwrap(), doc);
    }

    #[test]
    fn foreign_schema_is_rejected() {
        let value = DocumentValue {
            schema: "other".to_string(),
            version: DOCUMENT_VERSION,
            document: Document::default(),
        };
        assert!(value.into_document().is_err());
    }
}
