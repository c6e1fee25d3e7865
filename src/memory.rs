//! In-process storage backend, used as the substitute store in tests and for
//! throwaway runs without a database file.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::models::{now_rfc3339, Article, DeletedNote, NewArticle, Note};
use crate::store::{ArticleStore, NoteStore};

#[derive(Default)]
struct Inner {
    articles: Vec<Article>,
    notes: BTreeMap<i64, Note>,
    next_article_id: i64,
    next_note_id: i64,
}

impl Inner {
    fn article_mut(&mut self, id: i64) -> Result<&mut Article> {
        self.articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::article_not_found(id))
    }

    fn detach(&mut self, note_id: i64) -> Option<i64> {
        let mut owner = None;
        for article in self.articles.iter_mut() {
            if article.notes.contains(&note_id) {
                article.notes.retain(|id| *id != note_id);
                owner.get_or_insert(article.id);
            }
        }
        owner
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a note record without touching article references, leaving the
    /// state an interrupted delete would.
    #[cfg(test)]
    pub(crate) async fn drop_note_record(&self, id: i64) {
        self.inner.write().await.notes.remove(&id);
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn insert_article(&self, article: NewArticle) -> Result<Article> {
        let mut inner = self.inner.write().await;
        inner.next_article_id += 1;

        let article = Article {
            id: inner.next_article_id,
            link: article.link,
            title: article.title,
            summary: article.summary,
            saved: false,
            notes: Vec::new(),
            scraped_at: now_rfc3339(),
        };
        inner.articles.push(article.clone());
        Ok(article)
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        Ok(inner.articles.iter().find(|a| a.title == title).cloned())
    }

    async fn list_by_state(&self, saved: bool) -> Result<Vec<Article>> {
        let inner = self.inner.read().await;
        Ok(inner
            .articles
            .iter()
            .filter(|a| a.saved == saved)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Article>> {
        Ok(self.inner.read().await.articles.clone())
    }

    async fn get_article(&self, id: i64) -> Result<Article> {
        let inner = self.inner.read().await;
        inner
            .articles
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| Error::article_not_found(id))
    }

    async fn notes_for(&self, article: &Article) -> Result<Vec<Note>> {
        let inner = self.inner.read().await;
        Ok(article
            .notes
            .iter()
            .filter_map(|id| inner.notes.get(id).cloned())
            .collect())
    }

    async fn set_saved(&self, id: i64, saved: bool) -> Result<Article> {
        let mut inner = self.inner.write().await;
        let article = inner.article_mut(id)?;
        article.saved = saved;
        if !saved {
            article.notes.clear();
        }
        Ok(article.clone())
    }

    async fn attach_note(&self, article_id: i64, note_id: i64) -> Result<Article> {
        let mut inner = self.inner.write().await;
        let article = inner.article_mut(article_id)?;
        article.notes.push(note_id);
        Ok(article.clone())
    }

    async fn detach_note(&self, note_id: i64) -> Result<Option<i64>> {
        Ok(self.inner.write().await.detach(note_id))
    }

    async fn prune_dangling_note_refs(&self) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let Inner {
            articles, notes, ..
        } = &mut *inner;

        let mut removed = 0;
        for article in articles.iter_mut() {
            let before = article.notes.len();
            article.notes.retain(|id| notes.contains_key(id));
            removed += (before - article.notes.len()) as u64;
        }
        Ok(removed)
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn create_note(&self, text: &str) -> Result<Note> {
        let mut inner = self.inner.write().await;
        inner.next_note_id += 1;

        let note = Note {
            id: inner.next_note_id,
            text: text.to_string(),
            created_at: now_rfc3339(),
        };
        inner.notes.insert(note.id, note.clone());
        Ok(note)
    }

    async fn get_note(&self, id: i64) -> Result<Note> {
        let inner = self.inner.read().await;
        inner
            .notes
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::note_not_found(id))
    }

    async fn delete_note(&self, id: i64) -> Result<DeletedNote> {
        let mut inner = self.inner.write().await;
        let note = inner
            .notes
            .remove(&id)
            .ok_or_else(|| Error::note_not_found(id))?;
        let article_id = inner.detach(id);
        Ok(DeletedNote { note, article_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_article(title: &str) -> NewArticle {
        NewArticle {
            link: "https://news.example.com/a".to_string(),
            title: title.to_string(),
            summary: None,
        }
    }

    #[tokio::test]
    async fn test_ids_are_generated_in_sequence() {
        let store = MemoryStore::new();
        let a = store.insert_article(new_article("A")).await.unwrap();
        let b = store.insert_article(new_article("B")).await.unwrap();
        assert!(b.id > a.id);

        let n1 = store.create_note("one").await.unwrap();
        let n2 = store.create_note("two").await.unwrap();
        assert!(n2.id > n1.id);
    }

    #[tokio::test]
    async fn test_prune_after_interrupted_delete() {
        let store = MemoryStore::new();
        let article = store.insert_article(new_article("A")).await.unwrap();
        let note = store.create_note("gone").await.unwrap();
        store.attach_note(article.id, note.id).await.unwrap();

        store.drop_note_record(note.id).await;

        let article = store.get_article(article.id).await.unwrap();
        assert_eq!(article.notes, vec![note.id]);
        assert!(store.notes_for(&article).await.unwrap().is_empty());

        assert_eq!(store.prune_dangling_note_refs().await.unwrap(), 1);
        assert!(store.get_article(article.id).await.unwrap().notes.is_empty());
    }
}
