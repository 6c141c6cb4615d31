//! Back-office documents: procedures, menus, invoices and uploaded files

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Recipe,
    Procedure,
    Menu,
    Invoice,
    Manual,
    #[default]
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Recipe => "recipe",
            DocumentType::Procedure => "procedure",
            DocumentType::Menu => "menu",
            DocumentType::Invoice => "invoice",
            DocumentType::Manual => "manual",
            DocumentType::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recipe" => Ok(DocumentType::Recipe),
            "procedure" => Ok(DocumentType::Procedure),
            "menu" => Ok(DocumentType::Menu),
            "invoice" => Ok(DocumentType::Invoice),
            "manual" => Ok(DocumentType::Manual),
            "other" => Ok(DocumentType::Other),
            other => Err(format!("unknown document type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type", default)]
    pub doc_type: DocumentType,
    /// Inline text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Base64 file payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub uploaded_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Document {
    pub fn new(name: impl Into<String>, doc_type: DocumentType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            doc_type,
            content: None,
            file_data: None,
            file_name: None,
            mime_type: None,
            size: 0,
            tags: Vec::new(),
            uploaded_at: now,
            modified_at: now,
        }
    }

    /// Decoded file payload, if the document carries one
    pub fn decoded_file(&self) -> Result<Option<Vec<u8>>> {
        self.file_data.as_deref().map(decode_payload).transpose()
    }

    /// Size of the decoded payload, falling back to the inline content
    pub fn compute_size(&self) -> Result<u64> {
        if let Some(bytes) = self.decoded_file()? {
            return Ok(bytes.len() as u64);
        }
        Ok(self.content.as_ref().map(|c| c.len() as u64).unwrap_or(0))
    }
}

/// Decode a standard base64 payload. A `data:<mime>;base64,` prefix is
/// tolerated since browsers produce it from `FileReader.readAsDataURL`.
pub fn decode_payload(data: &str) -> Result<Vec<u8>> {
    let raw = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    STANDARD.decode(raw.trim()).map_err(|e| AppError::InvalidFormat {
        message: format!("fileData is not valid base64: {}", e),
    })
}

/// Encode bytes the way documents store them
pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_round_trip() {
        let mut doc = Document::new("Closing checklist", DocumentType::Procedure);
        doc.content = Some("Wipe counters".into());
        doc.tags = vec!["kitchen".into()];
        doc.size = doc.compute_size().unwrap();

        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"type\":\"procedure\""));
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn test_decode_payload_accepts_data_url() {
        let encoded = encode_payload(b"%PDF-1.4");
        assert_eq!(decode_payload(&encoded).unwrap(), b"%PDF-1.4");
        let data_url = format!("data:application/pdf;base64,{}", encoded);
        assert_eq!(decode_payload(&data_url).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_decode_payload_rejects_garbage() {
        let err = decode_payload("not base64!!").unwrap_err();
        assert!(matches!(err, AppError::InvalidFormat { .. }));
    }

    #[test]
    fn test_compute_size_prefers_file() {
        let mut doc = Document::new("Menu", DocumentType::Menu);
        doc.content = Some("ignored".into());
        doc.file_data = Some(encode_payload(&[0u8; 42]));
        assert_eq!(doc.compute_size().unwrap(), 42);
    }
}
