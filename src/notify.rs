//! Operator notification on the fatal top-level path. Posts to a webhook URL
//! when one is configured, otherwise does nothing.

const WEBHOOK_ENV: &str = "ASTROFLOW_WEBHOOK_URL";

pub async fn notify_operator(text: &str) {
    let url = match std::env::var(WEBHOOK_ENV) {
        Ok(u) if !u.is_empty() => u,
        _ => {
            log::debug!("{} not set, skipping operator notification", WEBHOOK_ENV);
            return;
        }
    };

    let client = reqwest::Client::new();
    match client
        .post(&url)
        .json(&serde_json::json!({ "text": text }))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            log::info!("operator notified");
        }
        Ok(resp) => {
            log::warn!("operator webhook returned {}", resp.status());
        }
        Err(e) => {
            log::warn!("operator webhook failed: {}", e);
        }
    }
}
