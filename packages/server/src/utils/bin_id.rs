use rand::Rng;

/// Bin id length bounds.
const MIN_LEN: usize = 8;
const MAX_LEN: usize = 60;

/// Length of server-synthesised bin ids.
const GENERATED_LEN: usize = 16;

const GENERATED_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Path roots that can never be bin ids.
const RESERVED: &[&str] = &[
    "admin",
    "api",
    "api-docs",
    "archive",
    "filebin-status",
    "scalar",
    "static",
    "storage-status",
    "swagger-ui",
];

#[derive(Debug, PartialEq, Eq)]
pub enum BinIdError {
    TooShort,
    TooLong,
    InvalidCharacter,
    LeadingDot,
    Reserved,
}

impl BinIdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::TooShort => "Bin id must be at least 8 characters",
            Self::TooLong => "Bin id must be at most 60 characters",
            Self::InvalidCharacter => {
                "Bin id may only contain letters, digits, '.', '_' and '-'"
            }
            Self::LeadingDot => "Bin id must not start with '.'",
            Self::Reserved => "This bin id is reserved",
        }
    }
}

/// Validate a client-chosen bin id against the naming rules.
pub fn validate_bin_id(id: &str) -> Result<(), BinIdError> {
    if id.len() < MIN_LEN {
        return Err(BinIdError::TooShort);
    }
    if id.len() > MAX_LEN {
        return Err(BinIdError::TooLong);
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(BinIdError::InvalidCharacter);
    }
    if id.starts_with('.') {
        return Err(BinIdError::LeadingDot);
    }
    if RESERVED.contains(&id.to_ascii_lowercase().as_str()) {
        return Err(BinIdError::Reserved);
    }
    Ok(())
}

/// Synthesise a bin id: 16 lowercase alphanumerics from the crypto RNG.
///
/// Uniqueness against existing bins is the caller's retry loop; the id space
/// makes collisions vanishingly rare.
pub fn generate_bin_id() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_LEN)
        .map(|_| GENERATED_ALPHABET[rng.random_range(0..GENERATED_ALPHABET.len())] as char)
        .collect()
}
