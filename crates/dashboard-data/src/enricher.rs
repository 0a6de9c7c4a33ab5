//! Per-row title, caption and feedback summary generation.
//!
//! The pipeline treats enrichment as an opaque capability behind
//! [`RowEnricher`]; each row is enriched on its own and may fail on its own.

use async_trait::async_trait;
use dashboard_core::error::{DashboardError, RowError};
use dashboard_core::models::{keys, Record};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Types ─────────────────────────────────────────────────────────────────────

/// The fixed input handed to an enricher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentInput {
    pub date: String,
    pub scheduled_time: String,
    pub product_type: String,
    pub course: String,
    pub subject: String,
    pub topic: String,
    /// Primary teacher; serialised as `teacher1` on the wire.
    #[serde(rename = "teacher1")]
    pub teacher: String,
    /// QAC feedback and remarks, one per line. Sent only to the summary
    /// flow, never with the title/caption request.
    #[serde(skip)]
    pub feedback: String,
}

impl EnrichmentInput {
    pub fn from_record(record: &Record) -> Self {
        let feedback = [keys::CLASS_QAC_FEEDBACK, keys::REMARKS]
            .iter()
            .map(|k| record.text(k))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            date: record.text(keys::DATE),
            scheduled_time: record.text(keys::SCHEDULED_TIME),
            product_type: record.text(keys::PRODUCT_TYPE),
            course: record.text(keys::COURSE),
            subject: record.text(keys::SUBJECT),
            topic: record.text(keys::TOPIC),
            teacher: record.text(keys::TEACHER),
            feedback,
        }
    }
}

/// Wire payload of the feedback summary flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackInput {
    pub feedback: String,
}

/// Generated text attached to a record. `None` leaves the record's own
/// value in place, so the default enrichment changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Enrichment {
    pub title: Option<String>,
    pub caption: Option<String>,
    pub summary: Option<String>,
}

fn string_field(value: &serde_json::Value, name: &str) -> Result<String, RowError> {
    match value.get(name) {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(RowError::EnrichmentSchema(format!(
            "`{}` must be a string, got {}",
            name, other
        ))),
        None => Err(RowError::EnrichmentSchema(format!(
            "missing field `{}`",
            name
        ))),
    }
}

impl Enrichment {
    pub fn title_caption(title: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            caption: Some(caption.into()),
            summary: None,
        }
    }

    pub fn with_summary(self, summary: Option<String>) -> Self {
        Self { summary, ..self }
    }

    /// Validate a title/caption response: both must be strings.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, RowError> {
        Ok(Self::title_caption(
            string_field(value, "title")?,
            string_field(value, "caption")?,
        ))
    }

    /// Validate a summary response: `summary` must be a string.
    pub fn summary_from_json(value: &serde_json::Value) -> Result<String, RowError> {
        string_field(value, "summary")
    }

    /// Copy of `record` with every generated field replaced.
    pub fn apply_to(&self, record: &Record) -> Record {
        [
            (keys::TITLE, &self.title),
            (keys::CAPTION, &self.caption),
            (keys::SUMMARY, &self.summary),
        ]
        .into_iter()
        .fold(record.clone(), |acc, (key, value)| match value {
            Some(text) => acc.with_field(key, text),
            None => acc,
        })
    }
}

// ── Trait ─────────────────────────────────────────────────────────────────────

/// Produces an [`Enrichment`] for one row.
#[async_trait]
pub trait RowEnricher: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn enrich(&self, input: &EnrichmentInput) -> Result<Enrichment, RowError>;
}

// ── NoopEnricher ──────────────────────────────────────────────────────────────

/// Enrichment disabled: always succeeds and leaves rows as imported.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEnricher;

#[async_trait]
impl RowEnricher for NoopEnricher {
    fn name(&self) -> &str {
        "none"
    }

    async fn enrich(&self, _input: &EnrichmentInput) -> Result<Enrichment, RowError> {
        Ok(Enrichment::default())
    }
}

// ── TemplateEnricher ──────────────────────────────────────────────────────────

/// Builds title, caption and summary locally from the row's own fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateEnricher;

impl TemplateEnricher {
    fn join_non_empty(parts: &[&str], sep: &str) -> String {
        parts
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(sep)
    }

    /// First feedback point, with a count of the rest. Points are split on
    /// line breaks, `;` and sentence ends.
    pub fn summarize(feedback: &str) -> Option<String> {
        let points: Vec<&str> = feedback
            .split(['\n', ';'])
            .flat_map(|line| line.split(". "))
            .map(|p| p.trim().trim_end_matches('.').trim())
            .filter(|p| !p.is_empty())
            .collect();
        let first = points.first()?;
        Some(match points.len() - 1 {
            0 => format!("{}.", first),
            more => format!("{}. (+{} more)", first, more),
        })
    }
}

#[async_trait]
impl RowEnricher for TemplateEnricher {
    fn name(&self) -> &str {
        "template"
    }

    async fn enrich(&self, input: &EnrichmentInput) -> Result<Enrichment, RowError> {
        let subject_line = if input.topic.is_empty() {
            input.subject.as_str()
        } else {
            input.topic.as_str()
        };
        let title = Self::join_non_empty(&[input.course.as_str(), subject_line], ": ");
        if title.is_empty() {
            return Err(RowError::Enrichment(
                "row has no course, subject or topic".to_string(),
            ));
        }

        let when = Self::join_non_empty(&[input.date.as_str(), input.scheduled_time.as_str()], " ");
        let mut caption = String::new();
        if !input.product_type.is_empty() {
            caption.push_str(&format!("[{}] ", input.product_type));
        }
        caption.push_str(&format!("Live class on {}", subject_line));
        if !input.teacher.is_empty() {
            caption.push_str(&format!(" with {}", input.teacher));
        }
        if !when.is_empty() {
            caption.push_str(&format!(", {}", when));
        }
        caption.push('.');

        Ok(Enrichment::title_caption(title, caption).with_summary(Self::summarize(&input.feedback)))
    }
}

// ── HttpEnricher ──────────────────────────────────────────────────────────────

/// POSTs the input as JSON to a text-generation endpoint, and the row's
/// feedback to an optional summary endpoint.
#[derive(Debug, Clone)]
pub struct HttpEnricher {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    summary_endpoint: Option<reqwest::Url>,
}

fn parse_http_url(what: &str, raw: &str) -> dashboard_core::error::Result<reqwest::Url> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| DashboardError::Config(format!("{what} URL {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DashboardError::Config(format!(
            "{what} URL must be http or https, got {}",
            url.scheme()
        )));
    }
    Ok(url)
}

impl HttpEnricher {
    pub fn new(endpoint: reqwest::Url) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: reqwest::Url) -> Self {
        Self {
            client,
            endpoint,
            summary_endpoint: None,
        }
    }

    /// Parse `endpoint` as an absolute http(s) URL.
    pub fn from_url(endpoint: &str) -> dashboard_core::error::Result<Self> {
        Ok(Self::new(parse_http_url("enrichment", endpoint)?))
    }

    /// Also summarise each row's feedback through `endpoint`.
    pub fn with_summary_url(self, endpoint: &str) -> dashboard_core::error::Result<Self> {
        Ok(Self {
            summary_endpoint: Some(parse_http_url("summary", endpoint)?),
            ..self
        })
    }

    async fn post_json<T: Serialize + Sync>(
        &self,
        url: &reqwest::Url,
        payload: &T,
    ) -> Result<serde_json::Value, RowError> {
        let response = self
            .client
            .post(url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| RowError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RowError::Enrichment(format!(
                "endpoint answered {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RowError::EnrichmentSchema(e.to_string()))
    }
}

#[async_trait]
impl RowEnricher for HttpEnricher {
    fn name(&self) -> &str {
        "http"
    }

    async fn enrich(&self, input: &EnrichmentInput) -> Result<Enrichment, RowError> {
        let body = self.post_json(&self.endpoint, input).await?;
        debug!("Enrichment response for topic {:?}: {}", input.topic, body);
        let enrichment = Enrichment::from_json(&body)?;

        let summary = match &self.summary_endpoint {
            Some(url) if !input.feedback.is_empty() => {
                let payload = FeedbackInput {
                    feedback: input.feedback.clone(),
                };
                let body = self.post_json(url, &payload).await?;
                Some(Enrichment::summary_from_json(&body)?)
            }
            _ => None,
        };
        Ok(enrichment.with_summary(summary))
    }
}
