//! Knowledge-base wire types.
//!
//! Categories form a tree (the server nests `children`); documents hang
//! off a category and carry a lifecycle status of draft, published, or
//! archived.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A knowledge-base category node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeCategory {
    pub id: String,
    #[serde(default, alias = "parent_id")]
    pub parent_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "sort_order")]
    pub sort_order: i32,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Nested child categories when the server returns the full tree.
    #[serde(default)]
    pub children: Vec<KnowledgeCategory>,
}

/// A knowledge-base document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeDocument {
    pub id: String,
    #[serde(alias = "category_id")]
    pub category_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "content_type")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, rename = "sourceURL", alias = "source_url")]
    pub source_url: Option<String>,
    #[serde(default, alias = "author_id")]
    pub author_id: Option<String>,
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "view_count")]
    pub view_count: i64,
    #[serde(default, alias = "like_count")]
    pub like_count: i64,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request body for creating a category (POST /knowledge/categories).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Request body for updating a category
/// (PUT /knowledge/categories/{id}).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Request body for creating a document (POST /knowledge/documents).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    pub category_id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(
        default,
        rename = "sourceURL",
        alias = "source_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_url: Option<String>,
}

/// Request body for updating a document
/// (PUT /knowledge/documents/{id}). Every field is optional; absent
/// fields are left unchanged server-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(
        default,
        rename = "sourceURL",
        alias = "source_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_url: Option<String>,
}

/// Search filter for GET /knowledge/documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentSearch {
    pub keyword: Option<String>,
    pub category_id: Option<String>,
    pub tags: Vec<String>,
    pub status: Option<String>,
    pub author_id: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl DocumentSearch {
    /// Render the filter as a query string (without a leading `?`).
    pub fn to_query(&self) -> String {
        let mut pairs: Vec<String> = Vec::new();
        if let Some(keyword) = &self.keyword {
            pairs.push(format!("keyword={}", urlencoding::encode(keyword)));
        }
        if let Some(category_id) = &self.category_id {
            pairs.push(format!("categoryId={}", urlencoding::encode(category_id)));
        }
        for tag in &self.tags {
            pairs.push(format!("tags={}", urlencoding::encode(tag)));
        }
        if let Some(status) = &self.status {
            pairs.push(format!("status={}", urlencoding::encode(status)));
        }
        if let Some(author_id) = &self.author_id {
            pairs.push(format!("authorId={}", urlencoding::encode(author_id)));
        }
        pairs.push(format!("page={}", self.page.unwrap_or(1)));
        pairs.push(format!("pageSize={}", self.page_size.unwrap_or(20)));
        pairs.join("&")
    }
}

/// Result of a bulk document import
/// (POST /knowledge/documents/import).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportResult {
    #[serde(default)]
    pub success: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub errors: Vec<String>,
}
