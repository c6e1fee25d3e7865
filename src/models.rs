//! Stored records shared by both storage backends.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: i64,
    pub link: String,
    pub title: String,
    pub summary: Option<String>,
    pub saved: bool,
    /// Ids of attached notes, in attach order.
    pub notes: Vec<i64>,
    pub scraped_at: String,
}

/// An article as it comes out of a scrape, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub link: String,
    pub title: String,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Note {
    pub id: i64,
    pub text: String,
    pub created_at: String,
}

/// Outcome of removing a note: the record that was deleted and the article it
/// was detached from, if any article still referenced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedNote {
    pub note: Note,
    pub article_id: Option<i64>,
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
