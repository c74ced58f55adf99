use actix_web::error::InternalError;
use actix_web::web;
use actix_web::HttpResponse;

use crate::api::ErrorResponse;
use crate::handlers;

pub fn config_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _request| {
        let detail = err.to_string();
        tracing::error!("Validation error: {}", detail);
        InternalError::from_response(err, HttpResponse::BadRequest().json(ErrorResponse { detail }))
            .into()
    }))
    .service(web::resource("/health").route(web::get().to(handlers::health)))
    .service(web::resource("/upsert").route(web::post().to(handlers::upsert_book)))
    .service(web::resource("/batch-upsert").route(web::post().to(handlers::batch_upsert_books)))
    .service(
        web::resource("/query")
            .route(web::get().to(handlers::query_books_get))
            .route(web::post().to(handlers::query_books_post)),
    )
    .service(web::resource("/books/{upc}").route(web::get().to(handlers::get_book)));
}
