use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use shared::protocol::TRANSCRIPTION_PATH;
use crate::audio::resample::TARGET_SAMPLE_RATE;
use crate::audio::wav::encode_wav;
use crate::error::TranscriptionError;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Upload a WAV clip for speech-to-text and return the recognised text
pub async fn transcribe(client: &Client, base_url: &str, token: &str, wav: Vec<u8>) -> Result<String, TranscriptionError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), TRANSCRIPTION_PATH);
    let part = Part::bytes(wav).file_name("audio.wav").mime_str("audio/wav")?;
    let form = Form::new().part("file", part);

    let response = client
        .post(&url)
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await?
        .error_for_status()?;
    let body: TranscriptionResponse = response
        .json()
        .await
        .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

    tracing::debug!("Transcribed {} characters", body.text.len());
    Ok(body.text)
}

/// Encode a captured utterance and transcribe it
pub async fn transcribe_samples(
    client: &Client,
    base_url: &str,
    token: &str,
    samples: &[f32],
) -> Result<String, TranscriptionError> {
    let wav = encode_wav(samples, TARGET_SAMPLE_RATE)?;
    transcribe(client, base_url, token, wav).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_transcribe_posts_multipart_with_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/audio/transcriptions")
            .match_header("authorization", "Bearer secret-token")
            .match_header("content-type", Matcher::Regex("^multipart/form-data".to_string()))
            .match_body(Matcher::Regex(r#"name="file""#.to_string()))
            .with_header("content-type", "application/json")
            .with_body(r#"{"text": "turn on the lights"}"#)
            .create_async()
            .await;

        let text = transcribe_samples(&Client::new(), &server.url(), "secret-token", &[0.0, 0.1, -0.1])
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(text, "turn on the lights");
    }

    #[tokio::test]
    async fn test_transcribe_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/audio/transcriptions")
            .with_status(401)
            .create_async()
            .await;

        let result = transcribe(&Client::new(), &server.url(), "expired", vec![0; 44]).await;
        assert!(matches!(result, Err(TranscriptionError::Request(_))));
    }

    #[tokio::test]
    async fn test_transcribe_rejects_bad_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/audio/transcriptions")
            .with_body(r#"{"unexpected": true}"#)
            .create_async()
            .await;

        let result = transcribe(&Client::new(), &server.url(), "t", vec![0; 44]).await;
        assert!(matches!(result, Err(TranscriptionError::InvalidResponse(_))));
    }
}
