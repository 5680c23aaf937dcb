use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Context;
use log::info;
use noters_http::api;
use noters_http::setup::{arguments, logging};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    logging::setup_log();

    let ((host, port), service) =
        arguments::handle_args().context("Failed setting up the note store")?;
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(api::configure(service.clone()))
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("Failed binding to {host}:{port}"))?;

    info!("Server started at http://{host}:{port}");
    server.run().await.context("Server error")?;
    Ok(())
}
