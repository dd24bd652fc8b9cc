//! Field validation rules for client records. Every rule is a pure predicate
//! over one field; `validate` applies all of them and accumulates the
//! failures per field, it never stops at the first one.

use crate::types::Client;
use regex::Regex;
use std::sync::LazyLock;

/// Email domains accepted for client contacts. The leading `@` keeps the
/// suffix check anchored to the domain boundary.
pub const ALLOWED_EMAIL_DOMAINS: &[&str] = &[
    "@gmail.com",
    "@hotmail.com",
    "@outlook.com",
    "@yahoo.com",
    "@live.com",
    "@icloud.com",
    "@msn.com",
];

/// Area codes of the supported region (Chiapas).
pub const ALLOWED_AREA_CODES: &[&str] = &[
    "916", "917", "918", "919", "932", "934", "961", "962", "963", "964", "965", "966", "967",
    "968", "992", "994",
];

static NOMBRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-ZáéíóúÁÉÍÓÚñÑ\s.'-]+$").expect("valid nombre regex"));
static DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").expect("valid digit regex"));
static CORREO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid correo regex")
});
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Trims the value and collapses internal whitespace runs to single spaces.
pub fn clean_string(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

/// The clave must be a base-10 integer.
pub fn check_clave(clave: &str) -> Result<(), String> {
    let clave = clave.trim();
    if clave.is_empty() {
        return Err("clave must not be empty".to_string());
    }
    if clave.parse::<i64>().is_err() {
        return Err("clave must be a valid number".to_string());
    }
    Ok(())
}

/// Names may only contain letters (including accented ones), spaces, periods,
/// apostrophes and hyphens.
pub fn check_nombre(nombre: &str) -> Result<(), String> {
    let nombre = nombre.trim();
    if nombre.is_empty() {
        return Err("nombre must not be empty".to_string());
    }
    if !NOMBRE_RE.is_match(nombre) {
        return Err(
            "nombre may only contain letters, spaces and basic punctuation".to_string(),
        );
    }
    if DIGIT_RE.is_match(nombre) {
        return Err("nombre must not contain digits".to_string());
    }
    Ok(())
}

/// The address must have a standard local@domain.tld shape and one of the
/// whitelisted consumer domains. The check runs on a lower-cased copy; the
/// stored value keeps its casing.
pub fn check_correo(correo: &str) -> Result<(), String> {
    let correo = correo.trim().to_lowercase();
    if correo.is_empty() {
        return Err("correo must not be empty".to_string());
    }
    if !CORREO_RE.is_match(&correo) {
        return Err("correo is not a valid email address".to_string());
    }
    if !ALLOWED_EMAIL_DOMAINS
        .iter()
        .any(|domain| correo.ends_with(domain))
    {
        let allowed = ALLOWED_EMAIL_DOMAINS
            .iter()
            .map(|d| d.trim_start_matches('@'))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(format!("correo domain is not allowed, use one of: {allowed}"));
    }
    Ok(())
}

/// Phone numbers must contain at least 10 digits after stripping separators
/// and start with a whitelisted regional area code.
pub fn check_telefono(telefono: &str) -> Result<(), String> {
    let telefono = telefono.trim();
    if telefono.is_empty() {
        return Err("telefono must not be empty".to_string());
    }

    let digits: String = telefono.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err("telefono must contain digits".to_string());
    }
    if digits.len() < 10 {
        return Err("telefono must have at least 10 digits".to_string());
    }

    let area_code = &digits[..3];
    if !ALLOWED_AREA_CODES.contains(&area_code) {
        return Err(format!(
            "telefono area code is not valid for the region, allowed: {}",
            ALLOWED_AREA_CODES.join(", ")
        ));
    }
    Ok(())
}

/// Runs every field rule over the record, overwriting its previous error
/// state. Whitespace cleanup of nombre/correo/telefono is persisted whether
/// or not the field passes; the clave is checked on its trimmed value but
/// stored as received.
pub fn validate(client: &mut Client) {
    client.clear_errors();

    if let Err(message) = check_clave(&client.clave) {
        client.add_error("clave", message);
    }

    client.nombre = clean_string(&client.nombre);
    if let Err(message) = check_nombre(&client.nombre) {
        client.add_error("nombre", message);
    }

    client.correo = clean_string(&client.correo);
    if let Err(message) = check_correo(&client.correo) {
        client.add_error("correo", message);
    }

    client.telefono = clean_string(&client.telefono);
    if let Err(message) = check_telefono(&client.telefono) {
        client.add_error("telefono", message);
    }

    client.is_valid = client.errors.is_empty();
}
