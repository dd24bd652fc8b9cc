use crate::errors::{Result, SheetError};
use registry::types::Client;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Expected header labels, in column order, after normalization.
const EXPECTED_HEADERS: [&str; 4] = ["clave", "nombre", "correo", "telefono"];

/// Reads a roster sheet into client records. The header row is validated
/// first; a structural problem aborts before any record is built. Records
/// get 1-based sequential ids within the batch and keep their source row
/// number for traceability.
pub fn read_file(path: &Path) -> Result<Vec<Client>> {
    check_extension(path)?;
    let rows = read_rows(path)?;

    if rows.is_empty() {
        return Err(SheetError::Empty);
    }
    validate_headers(&rows[0])?;
    if rows.len() < 2 {
        return Err(SheetError::Processing(
            "the file only contains headers, no data rows".to_string(),
        ));
    }

    let mut clients = Vec::with_capacity(rows.len() - 1);
    for (index, row) in rows[1..].iter().enumerate() {
        let mut client = Client::new(
            column(row, 0),
            column(row, 1),
            column(row, 2),
            column(row, 3),
        );
        client.id = index as u64 + 1;
        // +2: rows are 1-based and the header occupies the first one.
        client.row_number = index as u64 + 2;
        clients.push(client);
    }

    tracing::debug!(path = %path.display(), count = clients.len(), "read roster sheet");
    Ok(clients)
}

/// Checks the sheet shape (extension, non-empty, header labels) without
/// materializing any record.
pub fn validate_structure(path: &Path) -> Result<()> {
    check_extension(path)?;
    let rows = read_rows(path)?;
    match rows.first() {
        Some(header) => validate_headers(header),
        None => Err(SheetError::Empty),
    }
}

fn check_extension(path: &Path) -> Result<()> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(SheetError::InvalidFormat);
    }
    Ok(())
}

fn read_rows(path: &Path) -> Result<Vec<csv::StringRecord>> {
    let file = File::open(path)
        .map_err(|err| SheetError::Processing(format!("could not open {}: {err}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?);
    }
    Ok(rows)
}

fn validate_headers(header: &csv::StringRecord) -> Result<()> {
    if header.len() < EXPECTED_HEADERS.len() {
        return Err(SheetError::InvalidStructure(format!(
            "the sheet needs at least {} columns: clave, nombre, correo, telefono",
            EXPECTED_HEADERS.len()
        )));
    }

    for (index, expected) in EXPECTED_HEADERS.iter().enumerate() {
        let found = header.get(index).unwrap_or_default();
        if normalize_header(found) != *expected {
            return Err(SheetError::InvalidStructure(format!(
                "wrong header in column {}: expected \"{expected}\", found \"{found}\"",
                index + 1
            )));
        }
    }
    Ok(())
}

/// Lowercases, strips spaces and folds the accented e so labels like
/// "Teléfono" or "  Correo " are accepted.
fn normalize_header(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .replace(' ', "")
        .replace('é', "e")
}

/// Missing trailing columns read as empty fields; all values are trimmed.
fn column(row: &csv::StringRecord, index: usize) -> &str {
    row.get(index).unwrap_or_default().trim()
}
