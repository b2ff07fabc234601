//! Configuration management for the gallery server.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `GALLERY_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use gallery_server::config::Config;
//!
//! // Parse from command line and environment
//! let config = Config::parse();
//! config.validate()?;
//!
//! println!("Listening on {}", config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `GALLERY_HOST` - Server bind address (default: 0.0.0.0)
//! - `GALLERY_PORT` - Server port (default: 3000)
//! - `GALLERY_CSRF_SECRET` - HMAC secret for CSRF tokens (required, 32+ bytes)
//! - `GALLERY_CSRF_TTL` - CSRF token lifetime in seconds (default: 43200)
//! - `GALLERY_IMAGES_DIR` - Directory holding uploaded images (default: images)
//! - `GALLERY_ALLOWED_EXTENSIONS` - Upload allowlist (default: png,gif,jpeg,jpg)
//! - `GALLERY_MAX_UPLOAD_BYTES` - Upload request body limit (default: 5 MiB)
//! - `GALLERY_DEV_SESSIONS` - `TOKEN=EMAIL` pairs seeding the session store

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::server::DEFAULT_MAX_UPLOAD_BYTES;
use crate::upload::UploadPolicy;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default CSRF token lifetime in seconds (12 hours).
pub const DEFAULT_CSRF_TTL: u64 = 12 * 60 * 60;

/// Default image directory.
pub const DEFAULT_IMAGES_DIR: &str = "images";

/// Minimum CSRF secret length in bytes.
pub const MIN_CSRF_SECRET_LEN: usize = 32;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Gallery Server - photo galleries with validated uploads.
#[derive(Parser, Debug, Clone)]
#[command(name = "gallery-server")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "GALLERY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "GALLERY_PORT")]
    pub port: u16,

    // =========================================================================
    // CSRF Configuration
    // =========================================================================
    /// Secret key for HMAC-SHA256 CSRF tokens (at least 32 bytes).
    #[arg(long, env = "GALLERY_CSRF_SECRET", hide_env_values = true)]
    pub csrf_secret: String,

    /// Lifetime of issued CSRF tokens in seconds.
    #[arg(long, default_value_t = DEFAULT_CSRF_TTL, env = "GALLERY_CSRF_TTL")]
    pub csrf_ttl: u64,

    // =========================================================================
    // Upload Configuration
    // =========================================================================
    /// Directory where gallery images are stored.
    #[arg(long, default_value = DEFAULT_IMAGES_DIR, env = "GALLERY_IMAGES_DIR")]
    pub images_dir: PathBuf,

    /// Accepted image extensions (comma-separated).
    #[arg(
        long,
        default_value = "png,gif,jpeg,jpg",
        env = "GALLERY_ALLOWED_EXTENSIONS",
        value_delimiter = ','
    )]
    pub allowed_extensions: Vec<String>,

    /// Largest accepted upload request body in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "GALLERY_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    // =========================================================================
    // Sessions
    // =========================================================================
    /// Seed the in-memory session store with `TOKEN=EMAIL` (repeatable).
    #[arg(
        long = "dev-session",
        env = "GALLERY_DEV_SESSIONS",
        value_delimiter = ','
    )]
    pub dev_sessions: Vec<String>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.csrf_secret.len() < MIN_CSRF_SECRET_LEN {
            return Err(format!(
                "CSRF secret must be at least {} bytes. Set --csrf-secret or GALLERY_CSRF_SECRET",
                MIN_CSRF_SECRET_LEN
            ));
        }

        if self.csrf_ttl == 0 {
            return Err("csrf_ttl must be greater than 0".to_string());
        }

        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }

        if self.images_dir.as_os_str().is_empty() {
            return Err("images_dir must not be empty".to_string());
        }

        self.upload_policy()?;
        self.dev_sessions()?;

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// CSRF token lifetime.
    pub fn csrf_ttl(&self) -> Duration {
        Duration::from_secs(self.csrf_ttl)
    }

    /// Build the upload allowlist.
    pub fn upload_policy(&self) -> Result<UploadPolicy, String> {
        UploadPolicy::new(self.allowed_extensions.iter().map(String::as_str))
    }

    /// Parse the `TOKEN=EMAIL` session seeds.
    pub fn dev_sessions(&self) -> Result<Vec<(String, String)>, String> {
        self.dev_sessions
            .iter()
            .map(|pair| match pair.split_once('=') {
                Some((token, email)) if !token.trim().is_empty() && email.contains('@') => {
                    Ok((token.trim().to_string(), email.trim().to_string()))
                }
                _ => Err(format!(
                    "Invalid dev session {:?}, expected TOKEN=EMAIL",
                    pair
                )),
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
