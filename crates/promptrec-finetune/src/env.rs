//! Runtime environment knobs
//!
//! Two environment variables tune the numerical runtime and are read once at
//! process start, before any other work:
//!
//! - `PROMPTREC_BACKEND`: numerical backend selector (default `cpu`)
//! - `PROMPTREC_MEM_FRACTION`: fraction of available memory the runtime may
//!   claim, in (0.0, 1.0] (default `1.0`)

use std::env;

pub const BACKEND_VAR: &str = "PROMPTREC_BACKEND";
pub const MEM_FRACTION_VAR: &str = "PROMPTREC_MEM_FRACTION";

/// Snapshot of the runtime environment flags.
#[derive(Debug, Clone)]
pub struct RuntimeEnv {
    pub backend: String,
    pub mem_fraction: f32,
}

impl RuntimeEnv {
    /// Read both knobs from the process environment. Unset or unparsable
    /// values fall back to defaults.
    pub fn from_env() -> Self {
        let backend = env::var(BACKEND_VAR).unwrap_or_else(|_| "cpu".to_string());
        let mem_fraction = env::var(MEM_FRACTION_VAR)
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|f| *f > 0.0 && *f <= 1.0)
            .unwrap_or(1.0);

        Self {
            backend,
            mem_fraction,
        }
    }

    /// Report the active knobs once at startup.
    pub fn report(&self) {
        println!(
            "Runtime: backend={}, mem_fraction={:.2}",
            self.backend, self.mem_fraction
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test because the process environment is shared across threads.
    #[test]
    fn test_env_parsing() {
        env::remove_var(BACKEND_VAR);
        env::remove_var(MEM_FRACTION_VAR);
        let runtime = RuntimeEnv::from_env();
        assert_eq!(runtime.backend, "cpu");
        assert_eq!(runtime.mem_fraction, 1.0);

        env::set_var(BACKEND_VAR, "simd");
        env::set_var(MEM_FRACTION_VAR, "0.5");
        let runtime = RuntimeEnv::from_env();
        assert_eq!(runtime.backend, "simd");
        assert_eq!(runtime.mem_fraction, 0.5);

        // Out-of-range fraction falls back to the default.
        env::set_var(MEM_FRACTION_VAR, "2.5");
        let runtime = RuntimeEnv::from_env();
        assert_eq!(runtime.mem_fraction, 1.0);

        env::remove_var(BACKEND_VAR);
        env::remove_var(MEM_FRACTION_VAR);
    }
}
