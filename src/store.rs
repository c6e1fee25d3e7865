//! Storage capabilities consumed by the scraper and the request handlers.
//!
//! Two backends implement them: [`crate::db::Database`] (SQLite) and
//! [`crate::memory::MemoryStore`]. Components receive an `Arc<dyn Storage>`
//! at construction so either can be plugged in.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Article, DeletedNote, NewArticle, Note};

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert a new unsaved article with no notes.
    async fn insert_article(&self, article: NewArticle) -> Result<Article>;

    async fn find_by_title(&self, title: &str) -> Result<Option<Article>>;

    /// Articles with the given `saved` flag, in storage order.
    async fn list_by_state(&self, saved: bool) -> Result<Vec<Article>>;

    async fn list_all(&self) -> Result<Vec<Article>>;

    async fn get_article(&self, id: i64) -> Result<Article>;

    /// Resolve an article's note references, in attach order. References to
    /// notes that no longer exist are skipped.
    async fn notes_for(&self, article: &Article) -> Result<Vec<Note>>;

    /// Set the `saved` flag. Unsaving also clears the note references.
    async fn set_saved(&self, id: i64, saved: bool) -> Result<Article>;

    /// Append `note_id` to the article's note references.
    async fn attach_note(&self, article_id: i64, note_id: i64) -> Result<Article>;

    /// Remove `note_id` from whichever article references it, returning that
    /// article's id.
    async fn detach_note(&self, note_id: i64) -> Result<Option<i64>>;

    /// Drop references to notes whose record is gone. Returns how many
    /// references were removed.
    async fn prune_dangling_note_refs(&self) -> Result<u64>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn create_note(&self, text: &str) -> Result<Note>;

    async fn get_note(&self, id: i64) -> Result<Note>;

    /// Delete the note record and detach it from its article.
    ///
    /// The two steps are applied together; if a backend is interrupted between
    /// them the leftover reference is ignored by `notes_for` and removed by
    /// `prune_dangling_note_refs`.
    async fn delete_note(&self, id: i64) -> Result<DeletedNote>;
}

pub trait Storage: ArticleStore + NoteStore {}

impl<T: ArticleStore + NoteStore> Storage for T {}
