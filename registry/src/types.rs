use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

fn default_true() -> bool {
    true
}

/// A single client-contact record, either ingested from a spreadsheet row or
/// submitted through the API. Wire field names match the original upload
/// format: clave (business key), nombre, correo, telefono.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Client {
    #[serde(default)]
    pub id: u64,
    pub clave: String,
    pub nombre: String,
    pub correo: String,
    pub telefono: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, String>,
    #[serde(default = "default_true")]
    pub is_valid: bool,
    /// 1-based row in the source spreadsheet, 0 for records created directly.
    #[serde(default)]
    pub row_number: u64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn new<C, N, E, T>(clave: C, nombre: N, correo: E, telefono: T) -> Self
    where
        C: Into<String>,
        N: Into<String>,
        E: Into<String>,
        T: Into<String>,
    {
        let now = Utc::now();
        Client {
            id: 0,
            clave: clave.into(),
            nombre: nombre.into(),
            correo: correo.into(),
            telefono: telefono.into(),
            errors: HashMap::new(),
            is_valid: true,
            row_number: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records a field-level error and flips the validity flag. Inserting the
    /// same field twice keeps only the latest message.
    pub fn add_error<M: Into<String>>(&mut self, field: &str, message: M) {
        self.errors.insert(field.to_string(), message.into());
        self.is_valid = false;
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
        self.is_valid = true;
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Client{{id: {}, clave: {}, nombre: {}, valid: {}}}",
            self.id, self.clave, self.nombre, self.is_valid
        )
    }
}

/// Conjunction of optional predicates over the stored records. Doubles as the
/// query-string shape of `GET /clients`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClientFilter {
    #[serde(default)]
    pub clave: String,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub correo: String,
    #[serde(default)]
    pub telefono: String,
    pub has_errors: Option<bool>,
    /// 1-based page; 0 means unpaginated.
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub limit: usize,
}

impl ClientFilter {
    /// Every non-empty text predicate is a case-insensitive substring match;
    /// `has_errors` is an exact match when set. No predicate matches all.
    pub fn matches(&self, client: &Client) -> bool {
        if !contains_ignore_case(&client.clave, &self.clave) {
            return false;
        }
        if !contains_ignore_case(&client.nombre, &self.nombre) {
            return false;
        }
        if !contains_ignore_case(&client.correo, &self.correo) {
            return false;
        }
        if !contains_ignore_case(&client.telefono, &self.telefono) {
            return false;
        }
        if let Some(has_errors) = self.has_errors
            && has_errors == client.is_valid
        {
            return false;
        }
        true
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Aggregate counts over the store, recomputed from scratch on every request.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ClientStats {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub errors_by_field: HashMap<String, usize>,
}

impl ClientStats {
    pub fn collect<'a, I>(clients: I) -> Self
    where
        I: IntoIterator<Item = &'a Client>,
    {
        let mut stats = ClientStats::default();
        for client in clients {
            stats.total += 1;
            if client.is_valid {
                stats.valid += 1;
            } else {
                stats.invalid += 1;
                for field in client.errors.keys() {
                    *stats.errors_by_field.entry(field.clone()).or_default() += 1;
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_drive_the_validity_flag() {
        let mut client = Client::new("1", "Ana", "ana@gmail.com", "9611234567");
        assert!(client.is_valid);
        assert!(client.errors.is_empty());

        client.add_error("correo", "bad domain");
        assert!(!client.is_valid);
        assert!(client.has_error("correo"));
        assert_eq!(client.error("correo"), Some("bad domain"));

        // Same field again only replaces the message.
        client.add_error("correo", "still bad");
        assert_eq!(client.errors.len(), 1);

        client.clear_errors();
        assert!(client.is_valid);
        assert!(client.errors.is_empty());
    }

    #[test]
    fn filter_defaults_match_everything() {
        let client = Client::new("42", "Ana", "ana@gmail.com", "9611234567");
        assert!(ClientFilter::default().matches(&client));
    }

    #[test]
    fn filter_substring_is_case_insensitive() {
        let client = Client::new("42", "Ana María", "ana@gmail.com", "961-123-4567");

        let filter = ClientFilter {
            nombre: "maría".into(),
            ..Default::default()
        };
        assert!(filter.matches(&client));

        let filter = ClientFilter {
            correo: "GMAIL".into(),
            ..Default::default()
        };
        assert!(filter.matches(&client));

        let filter = ClientFilter {
            telefono: "555".into(),
            ..Default::default()
        };
        assert!(!filter.matches(&client));
    }

    #[test]
    fn filter_on_has_errors() {
        let mut invalid = Client::new("42", "Ana", "ana@gmail.com", "9611234567");
        invalid.add_error("clave", "bad");
        let valid = Client::new("43", "Eva", "eva@gmail.com", "9611234567");

        let with_errors = ClientFilter {
            has_errors: Some(true),
            ..Default::default()
        };
        assert!(with_errors.matches(&invalid));
        assert!(!with_errors.matches(&valid));

        let without_errors = ClientFilter {
            has_errors: Some(false),
            ..Default::default()
        };
        assert!(!without_errors.matches(&invalid));
        assert!(without_errors.matches(&valid));
    }

    #[test]
    fn stats_count_errors_per_field() {
        let mut a = Client::new("1", "Ana", "ana@gmail.com", "9611234567");
        a.add_error("correo", "bad domain");
        a.add_error("telefono", "bad area code");
        let mut b = Client::new("2", "Eva", "eva@gmail.com", "9611234567");
        b.add_error("correo", "bad domain");
        let c = Client::new("3", "Luz", "luz@gmail.com", "9611234567");

        let stats = ClientStats::collect([&a, &b, &c]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.invalid, 2);
        assert_eq!(stats.errors_by_field.get("correo"), Some(&2));
        assert_eq!(stats.errors_by_field.get("telefono"), Some(&1));
    }
}
