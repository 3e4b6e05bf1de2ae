use std::collections::HashMap;

/// Keys that must be present before any process is started.
pub const REQUIRED_KEYS: [&str; 2] = ["DATABASE_URL", "SESSION_SECRET"];

/// Third-party credentials: reported on, never block startup.
pub const OPTIONAL_KEYS: [&str; 4] = [
    "STRIPE_SECRET_KEY",
    "VITE_STRIPE_PUBLIC_KEY",
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
];

/// Ambient environment captured once at entry and passed explicitly,
/// so components never read process state ad hoc.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Empty-string values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

#[derive(Debug, Clone)]
pub struct PreflightReport {
    pub missing: Vec<String>,
    pub optional_missing: Vec<String>,
}

impl PreflightReport {
    pub fn ok(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Pure check of the snapshot; safe to call repeatedly.
pub fn check(env: &EnvSnapshot) -> PreflightReport {
    let missing = REQUIRED_KEYS
        .iter()
        .filter(|k| !env.is_set(k))
        .map(|k| k.to_string())
        .collect();
    let optional_missing = OPTIONAL_KEYS
        .iter()
        .filter(|k| !env.is_set(k))
        .map(|k| k.to_string())
        .collect();
    PreflightReport {
        missing,
        optional_missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_env() -> EnvSnapshot {
        EnvSnapshot::from_pairs([
            ("DATABASE_URL", "postgres://localhost/app"),
            ("SESSION_SECRET", "sekrit"),
        ])
    }

    #[test]
    fn all_required_present_passes() {
        let report = check(&full_env());
        assert!(report.ok());
        assert!(report.missing.is_empty());
    }

    #[test]
    fn missing_session_secret_is_listed_exactly() {
        let env = EnvSnapshot::from_pairs([("DATABASE_URL", "postgres://localhost/app")]);
        let report = check(&env);
        assert!(!report.ok());
        assert_eq!(report.missing, vec!["SESSION_SECRET".to_string()]);
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let env = EnvSnapshot::from_pairs([
            ("DATABASE_URL", ""),
            ("SESSION_SECRET", "sekrit"),
        ]);
        let report = check(&env);
        assert_eq!(report.missing, vec!["DATABASE_URL".to_string()]);
    }

    #[test]
    fn optional_keys_never_block() {
        let report = check(&full_env());
        assert!(report.ok());
        assert_eq!(report.optional_missing.len(), OPTIONAL_KEYS.len());
    }

    #[test]
    fn check_is_idempotent() {
        let env = full_env();
        let a = check(&env);
        let b = check(&env);
        assert_eq!(a.missing, b.missing);
        assert_eq!(a.optional_missing, b.optional_missing);
    }
}
