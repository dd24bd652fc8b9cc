use crate::errors::{Result, SheetError};
use registry::types::Client;
use std::path::{Path, PathBuf};

/// Paths produced by an export: the roster sheet and, when any record is
/// invalid, the companion error sheet next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenSheets {
    pub roster: PathBuf,
    pub errors: Option<PathBuf>,
}

/// Writes the roster sheet and, if any record carries errors, a companion
/// `<stem>_errores.csv` with one row per field-level error.
pub fn write_file(clients: &[Client], path: &Path) -> Result<WrittenSheets> {
    write_roster(clients, path)?;

    let errors = if clients.iter().any(|client| !client.is_valid) {
        let errors_path = companion_path(path)?;
        write_error_sheet(clients, &errors_path)?;
        Some(errors_path)
    } else {
        None
    };

    tracing::debug!(
        path = %path.display(),
        count = clients.len(),
        with_errors = errors.is_some(),
        "wrote roster sheet"
    );
    Ok(WrittenSheets {
        roster: path.to_path_buf(),
        errors,
    })
}

fn write_roster(clients: &[Client], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Clave", "Nombre", "Correo", "Telefono"])?;
    for client in clients {
        writer.write_record([
            client.clave.as_str(),
            client.nombre.as_str(),
            client.correo.as_str(),
            client.telefono.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_error_sheet(clients: &[Client], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Fila", "Clave", "Nombre", "Campo", "Error"])?;

    for client in clients {
        if client.is_valid {
            continue;
        }
        // Sorted for a stable sheet; the in-memory error map has no order.
        let mut fields: Vec<(&String, &String)> = client.errors.iter().collect();
        fields.sort();
        for (field, message) in fields {
            writer.write_record([
                client.row_number.to_string().as_str(),
                client.clave.as_str(),
                client.nombre.as_str(),
                field.as_str(),
                message.as_str(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn companion_path(path: &Path) -> Result<PathBuf> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| SheetError::Processing(format!("bad export path: {}", path.display())))?;
    Ok(path.with_file_name(format!("{stem}_errores.csv")))
}
