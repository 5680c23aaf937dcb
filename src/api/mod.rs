//! HTTP surface of the note store.
//!
//! Handlers are thin: they translate requests into [`NoteService`] calls run on the
//! blocking pool, and [`NoteError`] into status codes.

pub mod notes;

use crate::{ErrorKind, NoteError, app::NoteService};
use actix_web::{
    HttpResponse, ResponseError,
    http::{StatusCode, header::ContentType},
    web,
};
use log::error;

/// Registers the shared service, body limits and all routes
pub fn configure(service: web::Data<NoteService>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        let limit = body_limit(&service);
        cfg.app_data(service)
            .app_data(web::FormConfig::default().limit(limit))
            .app_data(web::JsonConfig::default().limit(limit))
            .app_data(web::PayloadConfig::new(limit));
        notes::config(cfg);
    }
}

/// Largest request body accepted, leaving room for form encoding of name and text
#[must_use]
pub fn body_limit(service: &NoteService) -> usize {
    service
        .max_text_size
        .saturating_add(service.max_name_size)
        .saturating_mul(3)
        .saturating_add(1024)
}

impl ResponseError for NoteError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidArgument | ErrorKind::AlreadyExists => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Storage details stay in the log
        let body = if self.kind() == ErrorKind::StorageFailure {
            error!("Storage failure: {self:?}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(self.status_code())
            .content_type(ContentType::plaintext())
            .body(body)
    }
}
