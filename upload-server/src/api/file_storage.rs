use std::{convert::Infallible, sync::Arc, time::Duration};

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use domain_storage::{
    exception::{FileException, FileResult},
    model::{entity::CompletedUpload, vo::UploadRequest},
    service::MultipartUploadService,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{dtos::UploadFileResponse, error::ApiError};
use crate::infrastructure::{BodyForwarder, ServiceProvider};

/// `POST /api/v1/file`: store the raw request body as a new object.
pub async fn upload_file(
    sp: web::Data<ServiceProvider>,
    request: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    let headers = request.headers();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let declared_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());

    let service = sp.upload_service();
    service.admit(&content_type, declared_length)?;

    let config = &sp.config().upload;
    let cancel = CancellationToken::new();
    let (forwarder, body) = BodyForwarder::channel(config.body_channel_capacity, cancel.clone());
    let request = UploadRequest::new(content_type, declared_length, body);
    // The upload outlives this handler if the client goes away, so the abort still runs.
    let task = tokio::spawn(upload_with_deadline(
        service,
        request,
        cancel,
        Duration::from_secs(config.request_timeout_secs),
    ));
    forwarder.forward(payload).await;

    let completed = task
        .await
        .map_err(|e| FileException::InternalError { source: e.into() })??;
    Ok(HttpResponse::Created().json(UploadFileResponse::from(completed)))
}

async fn upload_with_deadline(
    service: Arc<dyn MultipartUploadService>,
    request: UploadRequest,
    cancel: CancellationToken,
    timeout: Duration,
) -> FileResult<CompletedUpload> {
    let deadline = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(timeout).await;
            warn!(timeout_secs = timeout.as_secs(), "Upload deadline reached, cancelling.");
            cancel.cancel();
            std::future::pending::<Infallible>().await
        }
    };
    tokio::select! {
        result = service.upload(request, cancel) => result,
        never = deadline => match never {},
    }
}
