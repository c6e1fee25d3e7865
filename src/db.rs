use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{now_rfc3339, Article, DeletedNote, NewArticle, Note};
use crate::store::{ArticleStore, NoteStore};

#[derive(Debug, Clone, FromRow)]
struct ArticleRow {
    id: i64,
    link: String,
    title: String,
    summary: Option<String>,
    saved: bool,
    scraped_at: String,
}

impl ArticleRow {
    fn into_article(self, notes: Vec<i64>) -> Article {
        Article {
            id: self.id,
            link: self.link,
            title: self.title,
            summary: self.summary,
            saved: self.saved,
            notes,
            scraped_at: self.scraped_at,
        }
    }
}

const ARTICLE_COLUMNS: &str = "id, link, title, summary, saved, scraped_at";

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Every connection to `sqlite::memory:` is its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                link TEXT NOT NULL,
                title TEXT NOT NULL,
                summary TEXT,
                saved INTEGER NOT NULL DEFAULT 0,
                scraped_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Lookup index only: title uniqueness is checked at scrape time.
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_title ON articles(title)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // note_id is deliberately not a foreign key; see prune_dangling_note_refs.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS article_notes (
                id INTEGER PRIMARY KEY,
                article_id INTEGER NOT NULL REFERENCES articles(id),
                note_id INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_article_notes_article
            ON article_notes(article_id, id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_article_notes_note ON article_notes(note_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn note_ids(&self, article_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT note_id FROM article_notes WHERE article_id = ? ORDER BY id")
                .bind(article_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn attach_note_ids(&self, rows: Vec<ArticleRow>) -> Result<Vec<Article>> {
        let refs: Vec<(i64, i64)> =
            sqlx::query_as("SELECT article_id, note_id FROM article_notes ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        let mut by_article: HashMap<i64, Vec<i64>> = HashMap::new();
        for (article_id, note_id) in refs {
            by_article.entry(article_id).or_default().push(note_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let notes = by_article.remove(&row.id).unwrap_or_default();
                row.into_article(notes)
            })
            .collect())
    }

    async fn article_exists(&self, id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl ArticleStore for Database {
    async fn insert_article(&self, article: NewArticle) -> Result<Article> {
        let scraped_at = now_rfc3339();
        let id = sqlx::query(
            r#"
            INSERT INTO articles (link, title, summary, saved, scraped_at)
            VALUES (?, ?, ?, 0, ?)
            "#,
        )
        .bind(&article.link)
        .bind(&article.title)
        .bind(article.summary.as_deref())
        .bind(&scraped_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!("Inserted article {}: {}", id, article.title);

        Ok(Article {
            id,
            link: article.link,
            title: article.title,
            summary: article.summary,
            saved: false,
            notes: Vec::new(),
            scraped_at,
        })
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {} FROM articles WHERE title = ? ORDER BY id LIMIT 1",
            ARTICLE_COLUMNS
        ))
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let notes = self.note_ids(row.id).await?;
                Ok(Some(row.into_article(notes)))
            }
            None => Ok(None),
        }
    }

    async fn list_by_state(&self, saved: bool) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {} FROM articles WHERE saved = ? ORDER BY id",
            ARTICLE_COLUMNS
        ))
        .bind(saved)
        .fetch_all(&self.pool)
        .await?;
        self.attach_note_ids(rows).await
    }

    async fn list_all(&self) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {} FROM articles ORDER BY id",
            ARTICLE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        self.attach_note_ids(rows).await
    }

    async fn get_article(&self, id: i64) -> Result<Article> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {} FROM articles WHERE id = ?",
            ARTICLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::article_not_found(id))?;

        let notes = self.note_ids(id).await?;
        Ok(row.into_article(notes))
    }

    async fn notes_for(&self, article: &Article) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(
            r#"
            SELECT n.id, n.text, n.created_at
            FROM article_notes an
            JOIN notes n ON n.id = an.note_id
            WHERE an.article_id = ?
            ORDER BY an.id
            "#,
        )
        .bind(article.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notes)
    }

    async fn set_saved(&self, id: i64, saved: bool) -> Result<Article> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE articles SET saved = ? WHERE id = ?")
            .bind(saved)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(Error::article_not_found(id));
        }

        if !saved {
            sqlx::query("DELETE FROM article_notes WHERE article_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.get_article(id).await
    }

    async fn attach_note(&self, article_id: i64, note_id: i64) -> Result<Article> {
        if !self.article_exists(article_id).await? {
            return Err(Error::article_not_found(article_id));
        }

        sqlx::query("INSERT INTO article_notes (article_id, note_id) VALUES (?, ?)")
            .bind(article_id)
            .bind(note_id)
            .execute(&self.pool)
            .await?;

        self.get_article(article_id).await
    }

    async fn detach_note(&self, note_id: i64) -> Result<Option<i64>> {
        let owner: Option<(i64,)> =
            sqlx::query_as("SELECT article_id FROM article_notes WHERE note_id = ? LIMIT 1")
                .bind(note_id)
                .fetch_optional(&self.pool)
                .await?;

        sqlx::query("DELETE FROM article_notes WHERE note_id = ?")
            .bind(note_id)
            .execute(&self.pool)
            .await?;

        Ok(owner.map(|(id,)| id))
    }

    async fn prune_dangling_note_refs(&self) -> Result<u64> {
        let removed = sqlx::query(
            "DELETE FROM article_notes WHERE note_id NOT IN (SELECT id FROM notes)",
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        if removed > 0 {
            info!("Pruned {} dangling note references", removed);
        }
        Ok(removed)
    }
}

#[async_trait]
impl NoteStore for Database {
    async fn create_note(&self, text: &str) -> Result<Note> {
        let created_at = now_rfc3339();
        let id = sqlx::query("INSERT INTO notes (text, created_at) VALUES (?, ?)")
            .bind(text)
            .bind(&created_at)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(Note {
            id,
            text: text.to_string(),
            created_at,
        })
    }

    async fn get_note(&self, id: i64) -> Result<Note> {
        sqlx::query_as::<_, Note>("SELECT id, text, created_at FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::note_not_found(id))
    }

    async fn delete_note(&self, id: i64) -> Result<DeletedNote> {
        let mut tx = self.pool.begin().await?;

        let note = sqlx::query_as::<_, Note>("SELECT id, text, created_at FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::note_not_found(id))?;

        sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let owner: Option<(i64,)> =
            sqlx::query_as("SELECT article_id FROM article_notes WHERE note_id = ? LIMIT 1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM article_notes WHERE note_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(DeletedNote {
            note,
            article_id: owner.map(|(article_id,)| article_id),
        })
    }
}
