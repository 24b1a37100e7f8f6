use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ArgumentId, CommentId, Side, SuggestionType, TopicId, VoteDirection};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatePropositionRequest {
    pub proposition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub proposition: String,
    #[serde(rename = "type")]
    pub kind: SuggestionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub original_input: String,
    pub is_valid: bool,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub interpretation: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTopicRequest {
    pub proposition: String,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTopicResponse {
    pub topic_id: TopicId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, with = "backend_timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArgumentRequest {
    pub side: Side,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<String>,
    pub author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArgumentResponse {
    pub argument_id: ArgumentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicListItem {
    pub id: TopicId,
    pub proposition: String,
    pub pro_count: u32,
    pub con_count: u32,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default, with = "backend_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pro_avg_validity: Option<f64>,
    #[serde(default)]
    pub con_avg_validity: Option<f64>,
    #[serde(default)]
    pub controversy_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentView {
    pub id: ArgumentId,
    pub topic_id: TopicId,
    pub side: Side,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub sources: Option<String>,
    pub author: String,
    #[serde(default, with = "backend_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub validity_score: Option<u8>,
    #[serde(default)]
    pub validity_reasoning: Option<String>,
    #[serde(default, with = "backend_timestamp")]
    pub validity_checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub key_urls: Option<Vec<String>>,
    #[serde(default)]
    pub votes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub period: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicDetail {
    pub id: TopicId,
    pub proposition: String,
    #[serde(default)]
    pub pro_arguments: Vec<ArgumentView>,
    #[serde(default)]
    pub con_arguments: Vec<ArgumentView>,
    #[serde(default)]
    pub overall_summary: Option<String>,
    #[serde(default)]
    pub consensus_view: Option<String>,
    #[serde(default)]
    pub timeline_view: Option<Vec<TimelineEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub overall_summary: String,
    pub consensus_view: String,
    pub timeline_view: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidityVerdict {
    pub validity_score: u8,
    pub reasoning: String,
    #[serde(default)]
    pub key_urls: Vec<String>,
    #[serde(default)]
    pub source_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyAllEntry {
    pub argument_id: ArgumentId,
    pub title: String,
    #[serde(default)]
    pub validity_score: Option<u8>,
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyAllReport {
    pub total_arguments: u32,
    pub verified: u32,
    pub failed: u32,
    #[serde(default)]
    pub results: Vec<VerifyAllEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub argument_id: ArgumentId,
    pub votes: i64,
    /// Absent on deployments that do not track per-user votes.
    #[serde(default)]
    pub user_vote: Option<VoteDirection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentResponse {
    pub comment_id: CommentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub argument_id: ArgumentId,
    pub comment: String,
    #[serde(default, with = "backend_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Parses a backend timestamp. RFC 3339 is accepted as is; the backend's
/// offset-less `isoformat()` output is read as UTC.
pub fn parse_backend_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let raw = raw.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| naive.and_utc()),
    }
}

mod backend_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_some(&ts.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| {
                super::parse_backend_timestamp(&raw)
                    .map_err(|err| de::Error::custom(format!("invalid timestamp '{raw}': {err}")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;

    const NAIVE: &str = "2025-01-05T12:34:56.789012";

    fn expected() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 5, 12, 34, 56)
            .single()
            .expect("valid date")
            .with_nanosecond(789_012_000)
            .expect("valid nanos")
    }

    #[test]
    fn timestamps_accept_offsetless_and_rfc3339_forms() {
        assert_eq!(parse_backend_timestamp(NAIVE).expect("naive"), expected());
        assert_eq!(
            parse_backend_timestamp("2025-01-05T14:34:56.789012+02:00").expect("offset"),
            expected()
        );
        assert_eq!(
            parse_backend_timestamp("2025-01-05 12:34:56").expect("space separated"),
            expected().with_nanosecond(0).expect("nanos")
        );
        assert!(parse_backend_timestamp("yesterday").is_err());
    }

    #[test]
    fn created_topic_decodes_backend_timestamp() {
        let body = format!(
            r#"{{"topic_id":"6f1c1f0e-8a52-4d4b-9a57-1f2b1c0d9e11","proposition":"Remote work should be the default.","created_by":"alice","created_at":"{NAIVE}"}}"#
        );
        let created: CreateTopicResponse = serde_json::from_str(&body).expect("topic");
        assert_eq!(created.created_at, Some(expected()));

        let without: CreateTopicResponse =
            serde_json::from_str(r#"{"topic_id":3}"#).expect("bare topic");
        assert_eq!(without.created_at, None);
    }

    #[test]
    fn listings_decode_backend_timestamps() {
        let topics: Vec<TopicListItem> = serde_json::from_str(&format!(
            r#"[{{"id":1,"proposition":"p","pro_count":2,"con_count":1,"created_by":"bob","created_at":"{NAIVE}"}}]"#
        ))
        .expect("topics");
        assert_eq!(topics[0].created_at, Some(expected()));

        let argument: ArgumentView = serde_json::from_str(&format!(
            r#"{{"id":4,"topic_id":1,"side":"pro","title":"t","content":"c","author":"bob","created_at":"{NAIVE}","validity_score":4,"validity_checked_at":"{NAIVE}","votes":3}}"#
        ))
        .expect("argument");
        assert_eq!(argument.created_at, Some(expected()));
        assert_eq!(argument.validity_checked_at, Some(expected()));

        let comments: Vec<Comment> = serde_json::from_str(&format!(
            r#"[{{"id":9,"argument_id":4,"comment":"Good point","created_at":"{NAIVE}"}},{{"id":10,"argument_id":4,"comment":"Source?","created_at":null}}]"#
        ))
        .expect("comments");
        assert_eq!(comments[0].created_at, Some(expected()));
        assert_eq!(comments[1].created_at, None);
    }
}
