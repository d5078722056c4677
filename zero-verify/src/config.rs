use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmtProfile {
    /// Very low timeouts; quantifiers rejected.
    Fast,
    /// CI-friendly medium timeouts; quantifiers rejected.
    Ci,
    /// Higher timeouts; quantifiers allowed.
    Thorough,
}

impl SmtProfile {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Some(SmtProfile::Fast),
            "ci" => Some(SmtProfile::Ci),
            "thorough" => Some(SmtProfile::Thorough),
            _ => None,
        }
    }

    /// (timeout in ms, quantifiers allowed)
    pub fn limits(self) -> (u64, bool) {
        match self {
            SmtProfile::Fast => (50, false),
            SmtProfile::Ci => (250, false),
            SmtProfile::Thorough => (2_000, true),
        }
    }
}

/// How loops are turned into straight-line code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMode {
    /// Repeat the body a bounded number of times. Not a soundness claim.
    Unroll,
    /// Havoc the loop variable and run one pass under a user invariant.
    Invariant,
}

impl LoopMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unroll" => Some(LoopMode::Unroll),
            "invariant" => Some(LoopMode::Invariant),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct VerifyOptions {
    pub profile: SmtProfile,
    pub timeout_ms: u64,
    pub allow_quantifiers: bool,
    pub loop_mode: LoopMode,
    /// Unroll count when the loop condition has no literal bound.
    pub default_unroll: u32,
    pub max_unroll: u32,
    /// Upper bound on `if` statements per function (2^k paths).
    pub max_branches: u32,
    /// Verify the paths of one function on the rayon pool.
    pub parallel: bool,
}

impl VerifyOptions {
    pub fn for_profile(profile: SmtProfile) -> Self {
        let (timeout_ms, allow_quantifiers) = profile.limits();
        Self {
            profile,
            timeout_ms,
            allow_quantifiers,
            loop_mode: LoopMode::Unroll,
            default_unroll: 2,
            max_unroll: 16,
            max_branches: 16,
            parallel: true,
        }
    }

    /// Apply `ZERO_SMT_PROFILE`, `ZERO_SOLVER_TIMEOUT_MS`, `ZERO_LOOP_MODE` and
    /// `ZERO_PARALLEL`. Malformed values are ignored with a warning.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = get("ZERO_SMT_PROFILE") {
            match SmtProfile::parse(&v) {
                Some(profile) => {
                    let (timeout_ms, allow_quantifiers) = profile.limits();
                    self.profile = profile;
                    self.timeout_ms = timeout_ms;
                    self.allow_quantifiers = allow_quantifiers;
                }
                None => warn!(value = %v, "ignoring unknown ZERO_SMT_PROFILE"),
            }
        }
        if let Some(v) = get("ZERO_SOLVER_TIMEOUT_MS") {
            match v.trim().parse() {
                Ok(ms) => self.timeout_ms = ms,
                Err(_) => warn!(value = %v, "ignoring malformed ZERO_SOLVER_TIMEOUT_MS"),
            }
        }
        if let Some(v) = get("ZERO_LOOP_MODE") {
            match LoopMode::parse(&v) {
                Some(mode) => self.loop_mode = mode,
                None => warn!(value = %v, "ignoring unknown ZERO_LOOP_MODE"),
            }
        }
        if let Some(v) = get("ZERO_PARALLEL") {
            self.parallel = v.trim() == "1";
        }
        self
    }
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self::for_profile(SmtProfile::Ci)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_map_to_limits() {
        let fast = VerifyOptions::for_profile(SmtProfile::Fast);
        assert_eq!((fast.timeout_ms, fast.allow_quantifiers), (50, false));
        let thorough = VerifyOptions::for_profile(SmtProfile::Thorough);
        assert_eq!((thorough.timeout_ms, thorough.allow_quantifiers), (2_000, true));
        assert_eq!(thorough.default_unroll, 2);
    }

    #[test]
    fn overrides_apply_in_order() {
        let opts = VerifyOptions::default().with_overrides(|key| match key {
            "ZERO_SMT_PROFILE" => Some("thorough".to_string()),
            "ZERO_SOLVER_TIMEOUT_MS" => Some("75".to_string()),
            "ZERO_LOOP_MODE" => Some("invariant".to_string()),
            "ZERO_PARALLEL" => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(opts.profile, SmtProfile::Thorough);
        assert_eq!(opts.timeout_ms, 75);
        assert!(opts.allow_quantifiers);
        assert_eq!(opts.loop_mode, LoopMode::Invariant);
        assert!(!opts.parallel);
    }

    #[test]
    fn malformed_overrides_are_ignored() {
        let opts = VerifyOptions::default().with_overrides(|key| match key {
            "ZERO_SOLVER_TIMEOUT_MS" => Some("soon".to_string()),
            "ZERO_LOOP_MODE" => Some("forever".to_string()),
            _ => None,
        });
        assert_eq!(opts.timeout_ms, 250);
        assert_eq!(opts.loop_mode, LoopMode::Unroll);
    }
}
