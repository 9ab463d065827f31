//! One-shot generation of the appservice registration file.

use mxd_domain::registration::Registration;
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::info;

pub const DEFAULT_REGISTRATION_PATH: &str = "discord-registration.yaml";
/// 256-bit tokens.
const TOKEN_BYTES: usize = 32;

#[mxd_derive::mxd_error]
pub enum RegistrationError {
    #[error("A URL is required to generate a registration (--url){}", format_context(.context))]
    MissingUrl { context: Option<Cow<'static, str>> },

    #[error("Registration file already exists: {message}{}", format_context(.context))]
    AlreadyExists { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Registration I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Registration YAML error{}: {source}", format_context(.context))]
    Serialize { source: serde_yaml::Error, context: Option<Cow<'static, str>> },

    #[error("OS entropy source failed{}: {message}", format_context(.context))]
    Entropy { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Generates a registration for `url` and writes it to `destination`.
///
/// The destination is checked before any token is minted, and the file is
/// opened with create-new semantics, so an existing file is never replaced.
///
/// # Errors
/// [`RegistrationError::MissingUrl`] for a blank URL,
/// [`RegistrationError::AlreadyExists`] when the destination exists,
/// and I/O, YAML or entropy failures otherwise.
pub fn generate_registration(
    url: &str,
    destination: impl AsRef<Path>,
) -> Result<Registration, RegistrationError> {
    let destination = destination.as_ref();
    let url = url.trim();
    if url.is_empty() {
        return Err(RegistrationError::MissingUrl { context: None });
    }
    if destination.exists() {
        return Err(already_exists(destination));
    }

    let registration = Registration::discord(url, generate_token()?, generate_token()?);
    let yaml = serde_yaml::to_string(&registration)?;

    let mut file = match OpenOptions::new().write(true).create_new(true).open(destination) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(already_exists(destination)),
        Err(e) => return Err(e).context(destination.display().to_string()),
    };
    file.write_all(yaml.as_bytes()).context(destination.display().to_string())?;
    file.sync_all().context(destination.display().to_string())?;

    info!(path = %destination.display(), id = %registration.id, "Registration file written");
    Ok(registration)
}

/// Reads a previously generated registration.
///
/// # Errors
/// I/O or YAML failures, with the path as context.
pub fn load_registration(path: impl AsRef<Path>) -> Result<Registration, RegistrationError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).context(path.display().to_string())?;
    serde_yaml::from_str(&text).context(path.display().to_string())
}

/// Hex-encoded token from the OS CSPRNG.
///
/// # Errors
/// [`RegistrationError::Entropy`] if the OS source is unavailable.
pub fn generate_token() -> Result<String, RegistrationError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::fill(&mut bytes)
        .map_err(|e| RegistrationError::Entropy { message: e.to_string().into(), context: None })?;
    Ok(hex::encode(bytes))
}

fn already_exists(path: &Path) -> RegistrationError {
    RegistrationError::AlreadyExists { message: path.display().to_string().into(), context: None }
}
