// src/models/contact.rs

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ContactStatus {
    #[default]
    Active,
    Inactive,
    DoNotCall,
}

impl ContactStatus {
    /// Valores desconhecidos viram `active`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "inactive" => ContactStatus::Inactive,
            "do-not-call" => ContactStatus::DoNotCall,
            _ => ContactStatus::Active,
        }
    }
}

// Linha de contato extraída de um CSV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ParsedContact {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub status: ContactStatus,
    pub do_not_call: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CsvPreview {
    pub total: usize,
    pub contacts: Vec<ParsedContact>,
}
