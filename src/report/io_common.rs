use log::debug;

use std::path::Path;

use crate::report::*;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// Resolves a path of the configuration file against the directory of that file.
pub fn resolve_path(root: &Path, path: &str) -> String {
    let p = Path::new(path);
    if p.is_absolute() {
        path.to_string()
    } else {
        root.join(p).display().to_string()
    }
}

/// Decodes ISO-8859-1 text. Each byte is the code point of its character.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Reads a whole file published in ISO-8859-1 (the electoral authority tables).
pub fn read_latin1_file(path: &str) -> ReportResult<String> {
    let bytes = fs::read(path).context(OpeningInputSnafu { path })?;
    debug!("Read {} bytes from {:?}", bytes.len(), path);
    Ok(decode_latin1(&bytes))
}
