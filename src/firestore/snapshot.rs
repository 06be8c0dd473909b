use serde::de::DeserializeOwned;

use super::models::Document;
use super::value::fields_to_json;
use super::FirestoreError;

/// A document read from Firestore, with its id split out of the resource name.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub(crate) id: String,
    pub(crate) document: Option<Document>,
}

impl DocumentSnapshot {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn exists(&self) -> bool {
        self.document.is_some()
    }

    /// All fields of the document as a specific type. `Ok(None)` when the
    /// document does not exist.
    pub fn data<T: DeserializeOwned>(&self) -> Result<Option<T>, FirestoreError> {
        if let Some(doc) = &self.document {
            let serde_value = fields_to_json(doc.fields.clone())?;
            let obj = serde_json::from_value(serde_value)?;
            Ok(Some(obj))
        } else {
            Ok(None)
        }
    }
}

/// Zero or more [`DocumentSnapshot`]s returned by a query.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    pub(crate) documents: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub fn documents(&self) -> &Vec<DocumentSnapshot> {
        &self.documents
    }

    pub fn empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn size(&self) -> usize {
        self.documents.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentSnapshot> {
        self.documents.iter()
    }
}

impl<'a> IntoIterator for &'a QuerySnapshot {
    type Item = &'a DocumentSnapshot;
    type IntoIter = std::slice::Iter<'a, DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}
