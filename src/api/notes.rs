use super::body_limit;
use crate::app::NoteService;
use actix_multipart::Multipart;
use actix_web::{
    Either, HttpRequest, HttpResponse, Responder, error, guard,
    http::header::{self, ContentType},
    web,
};
use futures_util::StreamExt;
use log::debug;
use serde::Deserialize;
use serde_json::json;
use std::fmt;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)));
    cfg.service(web::resource("/notes").route(web::get().to(list_notes)));
    cfg.service(
        web::resource("/notes/write")
            .route(
                web::post()
                    .guard(guard::fn_guard(|ctx| is_multipart(ctx.head().headers())))
                    .to(create_note_multipart),
            )
            .route(web::post().to(create_note)),
    );
    cfg.service(
        web::resource("/notes/{name}")
            .route(web::get().to(get_note))
            .route(web::put().to(update_note))
            .route(web::delete().to(delete_note)),
    );
}

/// Fields of the upload form
#[derive(Default, Deserialize)]
pub struct CreateNoteForm {
    pub note_name: Option<String>,
    pub note: Option<String>,
}

// Note text never reaches the log, only its length
impl fmt::Debug for CreateNoteForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateNoteForm")
            .field("note_name", &self.note_name)
            .field("note_len", &self.note.as_ref().map(String::len))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteBody {
    pub text: Option<String>,
}

fn is_multipart(headers: &header::HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

fn wants_json(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}

async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body("Notes server is running")
}

async fn list_notes(service: web::Data<NoteService>) -> actix_web::Result<HttpResponse> {
    let notes = web::block(move || service.list_notes()).await??;
    Ok(HttpResponse::Ok().json(notes))
}

async fn get_note(
    service: web::Data<NoteService>,
    req: HttpRequest,
    name: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let name = name.into_inner();
    let note = web::block(move || service.read_note(&name)).await??;

    if wants_json(&req) {
        return Ok(HttpResponse::Ok().json(json!({ "text": note.text })));
    }
    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(note.text))
}

async fn create_note(
    service: web::Data<NoteService>,
    req: HttpRequest,
    body: Either<web::Form<CreateNoteForm>, web::Json<CreateNoteForm>>,
) -> actix_web::Result<HttpResponse> {
    let form = match body {
        Either::Left(form) => form.into_inner(),
        Either::Right(json) => json.into_inner(),
    };
    create(service, &req, form).await
}

async fn create_note_multipart(
    service: web::Data<NoteService>,
    req: HttpRequest,
    mut payload: Multipart,
) -> actix_web::Result<HttpResponse> {
    let limit = body_limit(&service);
    let mut form = CreateNoteForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let target = match field.name() {
            "note_name" => &mut form.note_name,
            "note" => &mut form.note,
            _ => continue,
        };

        let mut value = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if value.len() + chunk.len() > limit {
                return Err(error::ErrorPayloadTooLarge("Form field is too large"));
            }
            value.extend_from_slice(&chunk);
        }
        let value = String::from_utf8(value)
            .map_err(|_| error::ErrorBadRequest("Form fields must be UTF-8"))?;
        *target = Some(value);
    }

    create(service, &req, form).await
}

async fn create(
    service: web::Data<NoteService>,
    req: &HttpRequest,
    form: CreateNoteForm,
) -> actix_web::Result<HttpResponse> {
    debug!("Create request: {form:?}");
    let note = web::block(move || {
        service.create_note(form.note_name.as_deref(), form.note.as_deref())
    })
    .await??;

    if wants_json(req) {
        return Ok(HttpResponse::Created().json(note));
    }
    Ok(HttpResponse::Created()
        .content_type(ContentType::plaintext())
        .body(format!("Note {} created successfully!", note.name)))
}

async fn update_note(
    service: web::Data<NoteService>,
    name: web::Path<String>,
    body: Either<Either<web::Json<UpdateNoteBody>, web::Form<UpdateNoteBody>>, web::Bytes>,
) -> actix_web::Result<HttpResponse> {
    let text = match body {
        Either::Left(Either::Left(json)) => json.into_inner().text,
        Either::Left(Either::Right(form)) => form.into_inner().text,
        // An empty body carries no text; anything else must be JSON or a form
        Either::Right(raw) if raw.is_empty() => None,
        Either::Right(_) => {
            return Err(error::ErrorBadRequest(
                "Body must be JSON or application/x-www-form-urlencoded",
            ));
        }
    };
    let name = name.into_inner();
    let note = web::block(move || service.update_note(&name, text.as_deref())).await??;

    Ok(HttpResponse::Created()
        .content_type(ContentType::plaintext())
        .body(format!("Note {} updated successfully!", note.name)))
}

async fn delete_note(
    service: web::Data<NoteService>,
    name: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let name = name.into_inner();
    let note = web::block(move || service.delete_note(&name)).await??;

    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(format!("Note {} deleted successfully!", note.name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_debug_omits_note_text() {
        let form = CreateNoteForm {
            note_name: Some("diary".to_string()),
            note: Some("my secret thoughts".to_string()),
        };
        let shown = format!("{form:?}");
        assert!(shown.contains("diary"));
        assert!(shown.contains("18"));
        assert!(!shown.contains("secret"));
    }
}
