//! Source collection writes in their JSON-lines form.
//!
//! ```text
//! {"collection":"files","op":"insert","document":{"_id":"f1","space":"s1","text":"..."}}
//! {"collection":"files","op":"update","id":"f1","set":{"text":"..."}}
//! {"collection":"files","op":"delete","id":"f1"}
//! ```

use crate::core::error::{Result, SkipdexError};
use crate::core::feed::DocumentCollection;
use crate::core::types::{OperationKind, SourceDocument, SourceKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One write against a named source collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// Source collection name (`files`) or kind name (`file`)
    pub collection: String,

    #[serde(flatten)]
    pub op: MutationOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum MutationOp {
    Insert { document: SourceDocument },
    Update { id: String, set: Map<String, Value> },
    Delete { id: String },
}

impl Mutation {
    /// Parse one non-empty line
    pub fn parse(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }

    /// Source kind the target collection belongs to
    pub fn kind(&self) -> Result<SourceKind> {
        self.collection.parse()
    }

    pub fn operation(&self) -> OperationKind {
        match self.op {
            MutationOp::Insert { .. } => OperationKind::Insert,
            MutationOp::Update { .. } => OperationKind::Update,
            MutationOp::Delete { .. } => OperationKind::Delete,
        }
    }

    /// Commit the write, returning its sequence number.
    ///
    /// Waits while a subscriber of the collection is behind.
    pub async fn apply(self, collection: &DocumentCollection) -> Result<u64> {
        match self.op {
            MutationOp::Insert { document } => {
                if document.id.is_empty() {
                    return Err(SkipdexError::InvalidDocument(
                        "document _id cannot be empty".to_string(),
                    ));
                }
                collection.insert(document).await
            }
            MutationOp::Update { id, set } => collection.update(&id, set).await,
            MutationOp::Delete { id } => collection.delete(&id).await,
        }
    }
}
