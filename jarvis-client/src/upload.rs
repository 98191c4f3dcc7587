use std::time::Duration;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use shared::messages::{ControlReply, ControlRequest};
use shared::protocol::FACE_UPLOAD_PATH;
use crate::context::websocket_url;
use crate::error::UploadError;

pub const UPLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const REQUEST_PREFIX: &str = "save_face_model_";
const REPLY_TYPE: &str = "face_recognition_save_response";

/// A face image to register under `name`
pub struct FaceModel {
    pub name: String,
    /// File extension of the image, e.g. "jpg"
    pub extension: String,
    pub image: Vec<u8>,
}

/// Upload a face image over a dedicated connection and wait for the server
/// to confirm it was saved.
pub async fn save_face_model(
    base_url: &str,
    model: FaceModel,
    reply_timeout: Duration,
) -> Result<ControlReply, UploadError> {
    let url = websocket_url(base_url, FACE_UPLOAD_PATH)
        .map_err(|_| UploadError::InvalidUrl(base_url.to_string()))?;

    let (mut ws, _response) = tokio::time::timeout(UPLOAD_CONNECT_TIMEOUT, connect_async(url.as_str()))
        .await
        .map_err(|_| UploadError::ConnectTimeout(url.clone()))??;

    let request_id = format!("{}{}", REQUEST_PREFIX, chrono::Utc::now().timestamp_millis());
    let metadata = ControlRequest::new("face_recognition")
        .with_action("save_model")
        .with_request_id(request_id.clone())
        .with_payload(json!({ "name": model.name, "extension": model.extension }));

    tracing::info!("Uploading face model {} ({} bytes)", model.name, model.image.len());
    ws.send(Message::Text(serde_json::to_string(&metadata)?)).await?;
    ws.send(Message::Binary(model.image)).await?;

    let outcome = tokio::time::timeout(reply_timeout, async {
        while let Some(message) = ws.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => return Err(UploadError::WebSocket(e)),
            };
            match message {
                Message::Text(text) => {
                    let Ok(reply) = serde_json::from_str::<ControlReply>(&text) else {
                        tracing::debug!("Ignoring upload message: {}", text);
                        continue;
                    };
                    if is_save_reply(&reply) {
                        return Ok(reply);
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err(UploadError::ClosedEarly)
    })
    .await
    .unwrap_or(Err(UploadError::Timeout));

    if let Err(e) = ws.close(None).await {
        tracing::debug!("Error closing upload connection: {}", e);
    }

    let reply = outcome?;
    if reply.success == Some(true) {
        tracing::info!("Face model saved ({})", reply.request_id);
        Ok(reply)
    } else {
        let reason = reply.error.clone().unwrap_or_else(|| "unknown error".to_string());
        tracing::warn!("Face model upload rejected: {}", reason);
        Err(UploadError::Rejected(reason))
    }
}

fn is_save_reply(reply: &ControlReply) -> bool {
    reply.request_id.starts_with(REQUEST_PREFIX) && reply.kind.as_deref() == Some(REPLY_TYPE)
}
