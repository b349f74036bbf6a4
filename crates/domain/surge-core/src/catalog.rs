use std::collections::HashMap;

/// Lookup table from short event-type mnemonics to fully qualified,
/// versioned CDEvents type identifiers.
///
/// Built once at startup and shared read-only across all workers. Short
/// names that are not in the table pass through unchanged so callers can
/// inject pre-qualified or experimental types without touching this crate.
#[derive(Debug)]
pub struct EventTypeCatalog {
    entries: HashMap<&'static str, &'static str>,
}

impl EventTypeCatalog {
    /// The built-in deployment-lifecycle catalog.
    pub fn builtin() -> Self {
        let entries = HashMap::from([
            ("service.deployed", "dev.cdevents.service.deployed.0.3.0"),
            ("service.upgraded", "dev.cdevents.service.upgraded.0.3.0"),
            ("service.rolledback", "dev.cdevents.service.rolledback.0.3.0"),
            ("service.removed", "dev.cdevents.service.removed.0.3.0"),
            ("service.published", "dev.cdevents.service.published.0.3.0"),
            ("environment.created", "dev.cdevents.environment.created.0.3.0"),
            ("environment.modified", "dev.cdevents.environment.modified.0.3.0"),
            ("environment.deleted", "dev.cdevents.environment.deleted.0.3.0"),
        ]);
        Self { entries }
    }

    /// Resolve a short name to its qualified type. Unknown names are
    /// returned verbatim, never an error.
    pub fn resolve(&self, short_name: &str) -> String {
        self.entries
            .get(short_name)
            .map(|qualified| (*qualified).to_string())
            .unwrap_or_else(|| short_name.to_string())
    }

    pub fn contains(&self, short_name: &str) -> bool {
        self.entries.contains_key(short_name)
    }
}

impl Default for EventTypeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
