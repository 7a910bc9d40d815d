use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::application::documents::DocumentPageContext;
use crate::application::error::{ErrorReport, HttpError};
use crate::domain::entities::DeletionLogRecord;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response() -> Response {
    let mut response = render_template_response(NotFoundTemplate {}, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Template)]
#[template(path = "document.html")]
pub struct DocumentTemplate {
    pub view: DocumentPageContext,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {}

#[derive(Template)]
#[template(path = "deletion_log.html")]
pub struct DeletionLogTemplate {
    pub entry: DeletionLogRecord,
}

#[derive(Clone)]
pub struct MoveFormView {
    pub title: String,
    pub locale: String,
    pub slug: String,
    pub specific_slug: String,
    pub descendants_count: usize,
    pub conflicts: Vec<String>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "move.html")]
pub struct MoveFormTemplate {
    pub view: MoveFormView,
}

#[derive(Clone)]
pub struct MoveRequestedView {
    pub title: String,
    pub locale: String,
    pub slug: String,
    pub new_slug: String,
}

#[derive(Template)]
#[template(path = "move_requested.html")]
pub struct MoveRequestedTemplate {
    pub view: MoveRequestedView,
}
