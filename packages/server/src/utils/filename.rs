/// Maximum sanitised filename length, in bytes.
const MAX_FILENAME_BYTES: usize = 120;

/// Reasons a filename cannot be repaired into an acceptable one.
#[derive(Debug, PartialEq, Eq)]
pub enum FilenameError {
    /// Nothing is left of the name after sanitisation.
    Empty,
}

impl FilenameError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Filename cannot be empty",
        }
    }
}

/// Repair a client-supplied filename into a safe flat name.
///
/// Unlike a validator this never rejects repairable input: path components are
/// stripped, disallowed characters become `_`, whitespace runs collapse, a
/// leading dot becomes `_`, and the result is capped at 120 bytes. The
/// function is idempotent, so a stored filename passes through unchanged.
pub fn sanitize_filename(input: &str) -> Result<String, FilenameError> {
    let trimmed = input.trim();

    // Keep only the basename; uploads address a flat namespace.
    let base = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .trim();

    let mapped: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '=' | '+' | ',' | '.' | '(' | ')' | '[' | ']' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Collapse space runs left behind by the original name.
    let mut collapsed = String::with_capacity(mapped.len());
    let mut last_was_space = false;
    for c in mapped.chars() {
        if c == ' ' {
            if !last_was_space {
                collapsed.push(' ');
            }
            last_was_space = true;
        } else {
            collapsed.push(c);
            last_was_space = false;
        }
    }

    let mut name = collapsed;
    if name.starts_with('.') {
        name.replace_range(..1, "_");
    }

    if name.len() > MAX_FILENAME_BYTES {
        let mut cut = MAX_FILENAME_BYTES;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }

    let name = name.trim_end().to_string();
    if name.is_empty() {
        return Err(FilenameError::Empty);
    }

    Ok(name)
}

/// Final extension of a filename, lowercased, if it has one.
pub fn final_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether the filename's final extension is in the configured rejection set.
pub fn extension_rejected(filename: &str, rejected: &[String]) -> Option<String> {
    let ext = final_extension(filename)?;
    rejected
        .iter()
        .any(|r| r.eq_ignore_ascii_case(&ext))
        .then_some(ext)
}
