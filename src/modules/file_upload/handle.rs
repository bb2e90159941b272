use actix_web::{get, http::header, web, HttpResponse};
use serde::Deserialize;

use crate::api::error;
use crate::modules::file_upload::storage::LocalBlobStorage;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub token: String,
}

/// Serve a stored object to anyone holding a valid signed URL.
#[get("/{path:.*}")]
pub async fn get_object(
    storage: web::Data<LocalBlobStorage>,
    path: web::Path<String>,
    query: web::Query<SignedQuery>,
) -> Result<HttpResponse, error::Error> {
    let path = path.into_inner();
    let bytes = storage.read_signed(&path, &query.token).await?;

    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, content_type.as_ref()))
        .insert_header((header::CACHE_CONTROL, "private, max-age=3600"))
        .body(bytes))
}
