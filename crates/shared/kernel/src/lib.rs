//! Bootstrap logic shared by the bridge binary.
//!
//! ## Config loading
//! ```rust,ignore
//! use mxd_kernel::config::ConfigLoader;
//!
//! let validated = ConfigLoader::new("config.yaml").cli_port(Some(9005)).load()?;
//! assert_eq!(validated.port, 9005);
//! ```
//!
//! ## Registration
//! ```rust,ignore
//! use mxd_kernel::registration::generate_registration;
//!
//! let registration =
//!     generate_registration("https://bridge.example:9000", "discord-registration.yaml")?;
//! ```
pub mod config;
pub mod registration;

pub use mxd_domain as domain;
