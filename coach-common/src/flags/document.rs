//! JSON flag documents accepted at the HTTP boundary
//!
//! Producers send flags with their escalation relations nested inline:
//!
//! ```json
//! {
//!   "id": "f-3",
//!   "color": "RED",
//!   "createdAt": "2024-03-04T10:00:00Z",
//!   "requirement": { "title": "Weekly check-in" },
//!   "escalatedFrom": [{ "fromFlag": { "id": "f-1", "color": "YELLOW", "createdAt": "..." } }],
//!   "escalatedTo": null
//! }
//! ```
//!
//! Missing or `null` relation lists are read as empty. Colors and
//! timestamps are validated by serde; ids are checked when the documents
//! are flattened into an [`EscalationGraph`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::graph::{EscalationError, EscalationGraph};
use super::model::{Flag, FlagColor, FlagId, RequirementRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagDocument {
    pub id: FlagId,
    pub color: FlagColor,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement: Option<RequirementRef>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub escalated_from: Vec<EscalatedFrom>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub escalated_to: Vec<EscalatedTo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalatedFrom {
    pub from_flag: FlagDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalatedTo {
    pub to_flag: FlagDocument,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl FlagDocument {
    /// The flag record without its relations
    pub fn to_flag(&self) -> Flag {
        Flag {
            id: self.id.clone(),
            color: self.color,
            created_at: self.created_at,
            comment: self.comment.clone(),
            requirement: self.requirement.clone(),
        }
    }
}

impl EscalationGraph {
    /// Flatten nested documents into an id-keyed graph
    ///
    /// Top-level documents form the counted collection, each superseded
    /// exactly when its own `escalatedTo` list is non-empty. Documents that
    /// only appear nested are kept for traversal. When an id occurs more
    /// than once, the first top-level record wins; a requirement or comment
    /// it lacks is taken from a later copy.
    pub fn from_documents<'a, I>(documents: I) -> Result<Self, EscalationError>
    where
        I: IntoIterator<Item = &'a FlagDocument>,
    {
        let documents: Vec<&FlagDocument> = documents.into_iter().collect();
        let mut graph = EscalationGraph::new();

        for document in &documents {
            graph.insert_declared(document.to_flag(), !document.escalated_to.is_empty())?;
        }
        for document in &documents {
            graph.absorb(document)?;
        }

        Ok(graph)
    }

    fn absorb(&mut self, document: &FlagDocument) -> Result<(), EscalationError> {
        for link in &document.escalated_from {
            let ancestor = &link.from_flag;
            self.insert_reference(ancestor.to_flag())?;
            self.restore_link(&ancestor.id, &document.id);
            self.absorb(ancestor)?;
        }
        for link in &document.escalated_to {
            let successor = &link.to_flag;
            self.insert_reference(successor.to_flag())?;
            self.restore_link(&document.id, &successor.id);
            self.absorb(successor)?;
        }
        Ok(())
    }
}
