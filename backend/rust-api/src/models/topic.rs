use serde::{Deserialize, Serialize};

/// Read-only catalog entries maintained by the content management side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub subject_id: String,
    #[serde(default)]
    pub reference_material: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}
