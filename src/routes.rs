use std::sync::Arc;

use askama::Template;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{header::CONTENT_TYPE, request::Parts, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::models::{Article, Note};
use crate::scrape::{ScrapeReport, Scraper};
use crate::store::Storage;

pub struct AppState {
    pub store: Arc<dyn Storage>,
    pub scraper: Arc<Scraper>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/saved", get(saved))
        .route("/scrape", get(scrape))
        .route("/articles", get(list_articles))
        .route("/articles/:id", get(get_article))
        .route("/articles/save/:id", post(save_article))
        .route("/articles/delete/:id", post(delete_article))
        .route("/note/:id", get(get_note).post(add_note).delete(remove_note))
        .route("/health", get(health))
        .with_state(state)
}

// Response records
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoteResponse {
    pub id: i64,
    pub text: String,
    pub created_at: String,
}

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            text: note.text,
            created_at: note.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticleResponse {
    pub id: i64,
    pub link: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub saved: bool,
    pub notes: Vec<NoteResponse>,
}

impl ArticleResponse {
    fn new(article: Article, notes: Vec<Note>) -> Self {
        Self {
            id: article.id,
            link: article.link,
            title: article.title,
            summary: article.summary,
            saved: article.saved,
            notes: notes.into_iter().map(NoteResponse::from).collect(),
        }
    }

    pub fn has_summary(&self) -> bool {
        self.summary.is_some()
    }

    pub fn summary_text(&self) -> &str {
        self.summary.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoteRemovedResponse {
    pub note: NoteResponse,
    /// The article the note was detached from
    pub article_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeResponse {
    pub source: String,
    pub found: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub untitled: usize,
}

impl ScrapeResponse {
    fn new(source: &str, report: ScrapeReport) -> Self {
        Self {
            source: source.to_string(),
            found: report.found,
            inserted: report.inserted,
            duplicates: report.duplicates,
            untitled: report.untitled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Network { .. } | Error::Parse(_) => StatusCode::BAD_GATEWAY,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub articles: Vec<ArticleResponse>,
}

#[derive(Template)]
#[template(path = "saved.html")]
pub struct SavedTemplate {
    pub articles: Vec<ArticleResponse>,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

/// Body of `POST /note/:id`, accepted as JSON or as a urlencoded form.
#[derive(Debug, Deserialize)]
pub struct NoteForm {
    pub text: String,
}

#[async_trait]
impl<S> FromRequest<S> for NoteForm
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(form) = Json::<NoteForm>::from_request(req, state)
                .await
                .map_err(|e| Error::Validation(e.body_text()))?;
            Ok(form)
        } else {
            let Form(form) = Form::<NoteForm>::from_request(req, state)
                .await
                .map_err(|e| Error::Validation(e.body_text()))?;
            Ok(form)
        }
    }
}

/// Numeric id from the `:id` path segment.
#[derive(Debug, Clone, Copy)]
pub struct IdPath(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|e| Error::Validation(e.body_text()))?;
        Ok(Self(id))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub saved: Option<bool>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ListQuery
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Query(query) = Query::<ListQuery>::from_request_parts(parts, state)
            .await
            .map_err(|e| Error::Validation(e.body_text()))?;
        Ok(query)
    }
}

async fn expand(store: &dyn Storage, article: Article) -> Result<ArticleResponse> {
    let notes = store.notes_for(&article).await?;
    Ok(ArticleResponse::new(article, notes))
}

async fn expand_all(store: &dyn Storage, articles: Vec<Article>) -> Result<Vec<ArticleResponse>> {
    let mut expanded = Vec::with_capacity(articles.len());
    for article in articles {
        expanded.push(expand(store, article).await?);
    }
    Ok(expanded)
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let articles = state.store.list_by_state(false).await?;
    let articles = expand_all(state.store.as_ref(), articles).await?;
    Ok(HtmlTemplate(IndexTemplate { articles }))
}

pub async fn saved(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let articles = state.store.list_by_state(true).await?;
    let articles = expand_all(state.store.as_ref(), articles).await?;
    Ok(HtmlTemplate(SavedTemplate { articles }))
}

pub async fn scrape(State(state): State<Arc<AppState>>) -> Result<Json<ScrapeResponse>> {
    let report = state.scraper.scrape_and_store().await?;
    Ok(Json(ScrapeResponse::new(state.scraper.source_url(), report)))
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    query: ListQuery,
) -> Result<Json<Vec<ArticleResponse>>> {
    let articles = match query.saved {
        Some(saved) => state.store.list_by_state(saved).await?,
        None => state.store.list_all().await?,
    };
    Ok(Json(expand_all(state.store.as_ref(), articles).await?))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<Json<ArticleResponse>> {
    let article = state.store.get_article(id).await?;
    Ok(Json(expand(state.store.as_ref(), article).await?))
}

pub async fn save_article(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<Json<ArticleResponse>> {
    let article = state.store.set_saved(id, true).await?;
    info!("Saved article {}", id);
    Ok(Json(expand(state.store.as_ref(), article).await?))
}

pub async fn delete_article(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<Json<ArticleResponse>> {
    let article = state.store.set_saved(id, false).await?;
    info!("Unsaved article {} and cleared its notes", id);
    Ok(Json(expand(state.store.as_ref(), article).await?))
}

pub async fn add_note(
    State(state): State<Arc<AppState>>,
    IdPath(article_id): IdPath,
    form: NoteForm,
) -> Result<(StatusCode, Json<ArticleResponse>)> {
    // Resolve the article first so a bad id leaves no orphaned note behind.
    state.store.get_article(article_id).await?;

    let note = state.store.create_note(&form.text).await?;
    let article = state.store.attach_note(article_id, note.id).await?;
    info!("Attached note {} to article {}", note.id, article_id);

    Ok((
        StatusCode::CREATED,
        Json(expand(state.store.as_ref(), article).await?),
    ))
}

pub async fn get_note(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<Json<NoteResponse>> {
    let note = state.store.get_note(id).await?;
    Ok(Json(note.into()))
}

pub async fn remove_note(
    State(state): State<Arc<AppState>>,
    IdPath(id): IdPath,
) -> Result<Json<NoteRemovedResponse>> {
    let deleted = state.store.delete_note(id).await?;
    info!("Removed note {} (article {:?})", id, deleted.article_id);

    Ok(Json(NoteRemovedResponse {
        note: deleted.note.into(),
        article_id: deleted.article_id,
    }))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
