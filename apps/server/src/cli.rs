//! # CLI Argument Definitions

use clap::Parser;
use mxd_kernel::config::DEFAULT_CONFIG_PATH;
use mxd_kernel::registration::DEFAULT_REGISTRATION_PATH;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "discord-bridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Matrix application service bridging Discord")]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// URL the homeserver reaches this appservice at; required with -r
    #[arg(short, long)]
    pub url: Option<String>,

    /// Listen port, overrides bridge.port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Registration file
    #[arg(short, long, default_value = DEFAULT_REGISTRATION_PATH)]
    pub file: PathBuf,

    /// Write a new registration file and exit
    #[arg(short = 'r', long)]
    pub generate_registration: bool,
}

/// What the process was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GenerateRegistration { url: String, file: PathBuf },
    Serve { config: PathBuf, port: Option<u16>, registration: PathBuf },
}

/// Parse outcome: a command, or usage already printed.
#[derive(Debug)]
pub enum Invocation {
    Run(Command),
    Exit,
}

impl Cli {
    /// Parses `args`. Help, version and malformed usage are printed and
    /// reported as [`Invocation::Exit`].
    pub fn invocation<I, T>(args: I) -> Invocation
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match Self::try_parse_from(args) {
            Ok(cli) => Invocation::Run(cli.command()),
            Err(err) => {
                // Nothing useful to do if the terminal is gone.
                let _ = err.print();
                Invocation::Exit
            },
        }
    }

    #[must_use]
    pub fn command(self) -> Command {
        if self.generate_registration {
            Command::GenerateRegistration { url: self.url.unwrap_or_default(), file: self.file }
        } else {
            Command::Serve { config: self.config, port: self.port, registration: self.file }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Command {
        let argv = std::iter::once("discord-bridge").chain(args.iter().copied());
        Cli::try_parse_from(argv).expect("valid arguments").command()
    }

    #[test]
    fn defaults_serve_with_default_paths() {
        assert_eq!(
            parse(&[]),
            Command::Serve {
                config: PathBuf::from("config.yaml"),
                port: None,
                registration: PathBuf::from("discord-registration.yaml"),
            }
        );
    }

    #[test]
    fn short_flags() {
        assert_eq!(
            parse(&["-c", "bridge.yaml", "-p", "9005", "-f", "reg.yaml"]),
            Command::Serve {
                config: PathBuf::from("bridge.yaml"),
                port: Some(9005),
                registration: PathBuf::from("reg.yaml"),
            }
        );
    }

    #[test]
    fn generate_registration_takes_url_and_file() {
        assert_eq!(
            parse(&["-r", "-u", "https://bridge.example:9000", "-f", "reg.yaml"]),
            Command::GenerateRegistration {
                url: "https://bridge.example:9000".to_owned(),
                file: PathBuf::from("reg.yaml"),
            }
        );
        assert_eq!(
            parse(&["--generate-registration"]),
            Command::GenerateRegistration {
                url: String::new(),
                file: PathBuf::from("discord-registration.yaml"),
            }
        );
    }

    #[test]
    fn malformed_usage_exits() {
        assert!(matches!(Cli::invocation(["discord-bridge", "--port", "nope"]), Invocation::Exit));
        assert!(matches!(Cli::invocation(["discord-bridge", "--bogus"]), Invocation::Exit));
    }
}
