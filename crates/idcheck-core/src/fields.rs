//! Regex extraction of identity document fields from OCR text.
//!
//! Patterns target Brazilian identity cards (RG/CPF layouts). Every field is
//! optional; a miss is never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NATIONAL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{3}\.?\d{3}\.?\d{3}-?\d{2}").unwrap());

static REGISTRY_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:RG|REGISTRO GERAL|IDENTIDADE)[:\s]*([0-9]{1,3}\.?[0-9]{3}\.?[0-9]{3}-?[0-9X])")
        .unwrap()
});

static BIRTH_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:NASCIMENTO|DATA NASC|NASC)[:\s]*(\d{2}[/-]\d{2}[/-]\d{4})").unwrap()
});

static ISSUE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:EMISSÃO|EMISSAO|DATA EMISSÃO)[:\s]*(\d{2}[/-]\d{2}[/-]\d{4})").unwrap()
});

static ISSUING_AUTHORITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:SSP|DETRAN|PC|IFP|PM|CGPI)[/-]?[A-Z]{2}").unwrap());

static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:NOME|NAME)[:\s]*([A-ZÁÀÂÃÉÈÊÍÏÓÔÕÖÚÇÑ\s]+)").unwrap());

/// Keywords whose presence suggests a Brazilian identity document.
pub const NATIONALITY_KEYWORDS: [&str; 5] = [
    "REPUBLICA FEDERATIVA",
    "BRASIL",
    "IDENTIDADE",
    "REGISTRO",
    "CPF",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFields {
    /// CPF taxpayer number.
    pub national_id: Option<String>,
    /// RG registry number.
    pub registry_number: Option<String>,
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub issue_date: Option<String>,
    pub issuing_authority: Option<String>,
}

impl DocumentFields {
    /// Extract every field from raw OCR text.
    ///
    /// The national ID is searched in the raw text; keyword-anchored fields
    /// are searched in the uppercased text.
    pub fn extract(text: &str) -> Self {
        let upper = text.to_uppercase();

        let capture = |re: &Regex| {
            re.captures(&upper)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        let name = capture(&NAME)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Self {
            national_id: NATIONAL_ID.find(text).map(|m| m.as_str().to_string()),
            registry_number: capture(&REGISTRY_NUMBER),
            name,
            birth_date: capture(&BIRTH_DATE),
            issue_date: capture(&ISSUE_DATE),
            issuing_authority: ISSUING_AUTHORITY.find(&upper).map(|m| m.as_str().to_string()),
        }
    }
}

/// Number of distinct nationality keywords present in `text` (case-insensitive).
pub fn count_nationality_keywords(text: &str) -> usize {
    let upper = text.to_uppercase();
    NATIONALITY_KEYWORDS
        .iter()
        .filter(|k| upper.contains(*k))
        .count()
}
