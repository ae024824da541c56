//! # Runtime Configuration Module
//!
//! Environment-variable overrides for the pipeline's runtime tunables.
//!
//! ## Environment Variables
//!
//! ### `STAGE_ASYNC_STACK_SIZE`
//!
//! Stack size in bytes for async worker coroutines. Accepts decimal
//! (`65536`) or hexadecimal (`0x10000`). Default: `0x10000` (64 KB).
//!
//! ### `STAGE_ASYNC_TIMEOUT_MS`
//!
//! Timeout in milliseconds before a suspended request is failed by the
//! watchdog. Default: `30000`.
//!
//! ### `STAGE_VALIDATE_WHEN_ERRORS`
//!
//! When `true`, Default-state custom validation methods run even when
//! earlier stages already produced validation errors. Default: `false`.
//!
//! ### `STAGE_MANIFEST_SECRET`
//!
//! Secret used to seal and verify the fields-present manifest. Deployments
//! with more than one node must set this to a shared value; the default is
//! only suitable for development.
//!
//! ## Usage
//!
//! ```rust
//! use stagecoach::runtime_config::RuntimeOverrides;
//!
//! let overrides = RuntimeOverrides::from_env();
//! println!("Async stack size: {} bytes", overrides.async_stack_size);
//! ```

use std::env;

/// Runtime overrides loaded from environment variables. The pipeline
/// builder reads these once at startup; explicit builder settings win over
/// them.
#[derive(Debug, Clone)]
pub struct RuntimeOverrides {
    /// Stack size for async worker coroutines (default 64 KB / 0x10000).
    pub async_stack_size: usize,
    /// Watchdog timeout for suspended requests, in milliseconds.
    pub async_timeout_ms: u64,
    /// Run Default-state validation methods even with errors present.
    pub always_invoke_validate: bool,
    /// Secret sealing the fields-present manifest.
    pub manifest_secret: Vec<u8>,
}

impl RuntimeOverrides {
    /// Load overrides from environment variables, falling back to the
    /// documented defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let async_stack_size = env::var("STAGE_ASYNC_STACK_SIZE")
            .ok()
            .and_then(|v| parse_size(&v))
            .unwrap_or(0x10000);

        let async_timeout_ms = env::var("STAGE_ASYNC_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30_000);

        let always_invoke_validate = env::var("STAGE_VALIDATE_WHEN_ERRORS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false);

        let manifest_secret = env::var("STAGE_MANIFEST_SECRET")
            .map(String::into_bytes)
            .unwrap_or_else(|_| b"stagecoach-dev-manifest-secret".to_vec());

        RuntimeOverrides {
            async_stack_size,
            async_timeout_ms,
            always_invoke_validate,
            manifest_secret,
        }
    }
}

fn parse_size(value: &str) -> Option<usize> {
    if let Some(hex) = value.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_parse_in_decimal_and_hex() {
        assert_eq!(parse_size("65536"), Some(65536));
        assert_eq!(parse_size("0x10000"), Some(65536));
        assert_eq!(parse_size("bogus"), None);
    }
}
