use crate::domain::ports::EmailService;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::error;
use base64::{Engine as _, engine::general_purpose};

/// Client for the external mail relay. Delivery is a single authenticated
/// POST; attachments travel base64-encoded.
pub struct HttpEmailService {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpEmailService {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
        }
    }
}

#[derive(Serialize)]
struct AttachmentPayload {
    filename: String,
    content_base64: String,
}

#[derive(Serialize)]
struct EmailPayload<'a> {
    from_alias: &'a str,
    to_addr: &'a str,
    subject: &'a str,
    html_body: &'a str,
    attachments: Vec<AttachmentPayload>,
}

#[async_trait]
impl EmailService for HttpEmailService {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
        attachment_name: Option<&str>,
        attachment_data: Option<&[u8]>
    ) -> Result<(), AppError> {
        let attachments = match (attachment_name, attachment_data) {
            (Some(name), Some(data)) => vec![AttachmentPayload {
                filename: name.to_string(),
                content_base64: general_purpose::STANDARD.encode(data),
            }],
            _ => Vec::new(),
        };

        let payload = EmailPayload {
            from_alias: "tickets",
            to_addr: recipient,
            subject,
            html_body,
            attachments,
        };

        let res = self.client.post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("mail relay unreachable: {}", e);
                error!("{}", msg);
                AppError::Notification(msg)
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            let msg = format!("mail relay rejected message. Status: {}, Body: {}", status, text);
            error!("{}", msg);
            return Err(AppError::Notification(msg));
        }

        Ok(())
    }
}
