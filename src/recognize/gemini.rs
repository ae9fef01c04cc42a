use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{NaiveDate, Utc};
use log::debug;
use serde::Deserialize;
use serde_json::json;

use super::{RecognitionError, Recognizer};
use crate::models::{RecognitionRecord, ScanMode};
use crate::settings::RecognizerSettings;

/// Date-extraction client for Google's `generateContent` API.
///
/// Radar and Fast requests go to the flash tier; Deep requests use the pro
/// tier with a thinking budget and search grounding so ambiguous
/// international date formats get verified against labeling conventions.
pub struct GeminiRecognizer {
    client: reqwest::Client,
    settings: RecognizerSettings,
    api_key: String,
}

impl GeminiRecognizer {
    pub fn new(settings: RecognizerSettings, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
            api_key,
        }
    }

    fn model_for(&self, mode: ScanMode) -> &str {
        match mode {
            ScanMode::Deep => &self.settings.model_pro,
            ScanMode::Fast | ScanMode::Radar => &self.settings.model_flash,
        }
    }

    fn request_body(&self, image: &[u8], mode: ScanMode) -> serde_json::Value {
        let prompt = build_prompt(mode, Utc::now().date_naive());
        let mut body = json!({
            "contents": [{
                "parts": [
                    { "inline_data": { "mime_type": "image/jpeg", "data": BASE64.encode(image) } },
                    { "text": prompt }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json"
            }
        });

        if mode == ScanMode::Deep {
            body["generationConfig"]["thinkingConfig"] = json!({ "thinkingBudget": 32768 });
            body["tools"] = json!([{ "google_search": {} }]);
        }

        body
    }
}

#[async_trait]
impl Recognizer for GeminiRecognizer {
    async fn recognize(
        &self,
        image: &[u8],
        mode: ScanMode,
    ) -> Result<Vec<RecognitionRecord>, RecognitionError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.model_for(mode)
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(image, mode))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecognitionError::Status(status.as_u16()));
        }

        let envelope: GenerateResponse = response.json().await?;
        let payload = extract_text(&envelope)?;
        debug!("recognizer returned {} bytes of JSON payload", payload.len());
        parse_payload(&payload)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn extract_text(envelope: &GenerateResponse) -> Result<String, RecognitionError> {
    let text: String = envelope
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(RecognitionError::Malformed(
            "response carried no text part".to_string(),
        ));
    }
    Ok(text)
}

/// Parse the model's JSON payload into records.
///
/// The service is asked for an array, but a single bare object is accepted
/// too. Records flagged as non-food are dropped here: a frame of a receipt or
/// a countertop is an empty result, not an error.
fn parse_payload(payload: &str) -> Result<Vec<RecognitionRecord>, RecognitionError> {
    let trimmed = payload.trim();

    let records: Vec<RecognitionRecord> = match serde_json::from_str::<Vec<RecognitionRecord>>(trimmed)
    {
        Ok(list) => list,
        Err(_) => serde_json::from_str::<RecognitionRecord>(trimmed)
            .map(|one| vec![one])
            .map_err(|err| RecognitionError::Malformed(err.to_string()))?,
    };

    Ok(records.into_iter().filter(|r| r.is_food_product).collect())
}

fn build_prompt(mode: ScanMode, today: NaiveDate) -> String {
    let mut prompt = String::from(
        "You are an expert on food label date marking conventions worldwide \
         (Taiwan, Japan, the US, Europe, Southeast Asia).\n\
         Analyze the product packaging in this image.\n\
         - If the image is not food packaging or a dated product (a receipt, a \
         document, scenery), set isFoodProduct to false for that entry and do \
         not analyze it further.\n\
         - Identify the likely origin and use it to disambiguate the date \
         format: ROC calendar years in Taiwan (ROC yyy + 1911 = YYYY), \
         Japanese era years (e.g. R06.10.20), MM/DD/YYYY in the US, \
         DD/MM/YYYY in Europe and Australia. For bare 6- or 8-digit codes \
         (e.g. 250506), reason about which reading gives a plausible date.\n\
         - Look for both the manufacture date (MFG/PROD) and the expiry date \
         (EXP/Best Before/Use By). If only a shelf life is printed, report it \
         as storageDuration.\n\
         - Normalize every date to YYYY-MM-DD.\n",
    );

    prompt.push_str(&format!(
        "- Judge expiry against today's date, {}.\n",
        today.format("%Y-%m-%d")
    ));

    match mode {
        ScanMode::Radar => prompt.push_str(
            "Respond as fast as possible. Return a JSON array with one entry \
             per distinct product visible, each with only: productName, \
             expiryDate, storageDuration, isExpired, isFoodProduct.\n",
        ),
        ScanMode::Fast | ScanMode::Deep => prompt.push_str(
            "Return a JSON array with one entry per distinct product visible, \
             each with: productName, origin, manufactureDate, expiryDate, \
             storageDuration, isExpired, daysRemaining, rawTextFound, \
             confidence (high|medium|low), summary (explain the format \
             reasoning), dateAmbiguityWarning when more than one reading is \
             plausible, isFoodProduct.\n",
        ),
    }

    if mode == ScanMode::Deep {
        prompt.push_str(
            "When the format is still ambiguous, search for the brand's or \
             origin country's date labeling conventions before deciding.\n",
        );
    }

    prompt
}
