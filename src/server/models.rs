//! Request/response shapes for the HTTP surface.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::sap_query_generator::{DocumentFilter, SortDir, SortField};

/// Raw `/documents` query string, before validation. Everything arrives
/// as optional text so defaults and exact error wording stay here.
#[derive(Debug, Default, Deserialize)]
pub struct DocumentQuery {
    #[serde(rename = "dateFrom")]
    pub date_from: Option<String>,
    #[serde(rename = "dateTo")]
    pub date_to: Option<String>,
    #[serde(rename = "cardCode")]
    pub card_code: Option<String>,
    #[serde(rename = "warehouseCode")]
    pub warehouse_code: Option<String>,
    #[serde(rename = "DocStatus")]
    pub doc_status: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortDir")]
    pub sort_dir: Option<String>,
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

/// A rejected `/documents` request: `message` is the client-facing
/// error, `details` the longer explanation.
#[derive(Debug, PartialEq, Eq)]
pub struct QueryParseError {
    pub message: String,
    pub details: String,
}

impl QueryParseError {
    fn new(message: &str, details: &str) -> Self {
        Self {
            message: message.to_string(),
            details: details.to_string(),
        }
    }
}

fn trimmed(value: Option<&String>) -> &str {
    value.map(|s| s.trim()).unwrap_or("")
}

impl DocumentQuery {
    pub fn parse(&self) -> Result<DocumentFilter, QueryParseError> {
        let date_from_raw = trimmed(self.date_from.as_ref());
        let date_to_raw = trimmed(self.date_to.as_ref());
        if date_from_raw.is_empty() || date_to_raw.is_empty() {
            return Err(QueryParseError::new(
                "dateFrom and dateTo are required",
                "dateFrom and dateTo are required",
            ));
        }

        let date_from = NaiveDate::parse_from_str(date_from_raw, "%Y-%m-%d")
            .map_err(|e| QueryParseError::new("invalid dateFrom", &e.to_string()))?;
        let date_to = NaiveDate::parse_from_str(date_to_raw, "%Y-%m-%d")
            .map_err(|e| QueryParseError::new("invalid dateTo", &e.to_string()))?;

        if date_from > date_to {
            return Err(QueryParseError::new(
                "dateFrom must be before or equal to dateTo",
                "dateFrom must be before or equal to dateTo",
            ));
        }

        let card_code = non_empty(trimmed(self.card_code.as_ref()));
        let warehouse_code = non_empty(trimmed(self.warehouse_code.as_ref()));

        let doc_status = match trimmed(self.doc_status.as_ref()) {
            "" => None,
            s @ ("O" | "C") => Some(s.to_string()),
            _ => {
                return Err(QueryParseError::new(
                    "DocStatus must be O or C",
                    "DocStatus must be O or C",
                ))
            }
        };

        let sort_by = match trimmed(self.sort_by.as_ref()).to_lowercase().as_str() {
            "" | "docdate" => SortField::DocDate,
            "docentry" => SortField::DocEntry,
            _ => {
                return Err(QueryParseError::new(
                    "invalid sortBy",
                    "sortBy must be DocDate or DocEntry",
                ))
            }
        };

        let sort_dir = match trimmed(self.sort_dir.as_ref()).to_lowercase().as_str() {
            "asc" => SortDir::Asc,
            "" | "desc" => SortDir::Desc,
            _ => {
                return Err(QueryParseError::new(
                    "invalid sortDir",
                    "sortDir must be asc or desc",
                ))
            }
        };

        let page = match trimmed(self.page.as_ref()) {
            "" => 1,
            raw => match raw.parse::<u32>() {
                Ok(p) if p >= 1 => p,
                _ => {
                    return Err(QueryParseError::new(
                        "invalid page",
                        "page must be an integer >= 1",
                    ))
                }
            },
        };

        let page_size = match trimmed(self.page_size.as_ref()) {
            "" => 50,
            raw => match raw.parse::<u32>() {
                Ok(p) if (1..=200).contains(&p) => p,
                _ => {
                    return Err(QueryParseError::new(
                        "invalid pageSize",
                        "pageSize must be an integer between 1 and 200",
                    ))
                }
            },
        };

        Ok(DocumentFilter {
            card_code,
            date_from,
            date_to,
            warehouse_code,
            doc_status,
            sort_by,
            sort_dir,
            page,
            page_size,
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
