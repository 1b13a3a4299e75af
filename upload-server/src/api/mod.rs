use actix_web::{http::header, web, HttpResponse};

use self::dtos::ErrorResponse;

pub mod dtos;
pub mod error;
pub mod file_storage;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/v1/file")
            .route(web::post().to(file_storage::upload_file))
            .default_service(web::route().to(method_not_allowed)),
    );
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .insert_header((header::ALLOW, "POST"))
        .json(ErrorResponse::new("Method not allowed."))
}
