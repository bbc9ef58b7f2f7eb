use crate::limits::{DEFAULT_MAX_QUERY_WINDOW_MS, DEFAULT_MAX_RESOURCE_IDS};
use crate::model::{DAY_MS, Ms, WorkingHours};

/// Engine settings passed explicitly to every component that needs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Default working window used by common-slot searches.
    pub working_hours: WorkingHours,
    pub max_query_window_ms: Ms,
    pub max_resource_ids: usize,
    /// Prometheus listener port. `None` disables the exporter.
    pub metrics_port: Option<u16>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            working_hours: WorkingHours::default(),
            max_query_window_ms: DEFAULT_MAX_QUERY_WINDOW_MS,
            max_resource_ids: DEFAULT_MAX_RESOURCE_IDS,
            metrics_port: None,
        }
    }
}

impl EngineConfig {
    /// Read `CREWTIME_*` environment variables, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse_u32 = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u32>().ok());

        let working_hours = WorkingHours {
            start_hour: parse_u32("CREWTIME_WORK_START")
                .unwrap_or(defaults.working_hours.start_hour),
            end_hour: parse_u32("CREWTIME_WORK_END").unwrap_or(defaults.working_hours.end_hour),
        };
        let max_query_window_ms = lookup("CREWTIME_MAX_WINDOW_DAYS")
            .and_then(|s| s.trim().parse::<Ms>().ok())
            .filter(|days| *days > 0)
            .map_or(defaults.max_query_window_ms, |days| days * DAY_MS);
        let max_resource_ids = lookup("CREWTIME_MAX_RESOURCE_IDS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_resource_ids);
        let metrics_port = lookup("CREWTIME_METRICS_PORT").and_then(|s| s.trim().parse().ok());

        Self {
            working_hours,
            max_query_window_ms,
            max_resource_ids,
            metrics_port,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_env_gives_defaults() {
        assert_eq!(EngineConfig::from_lookup(lookup(&[])), EngineConfig::default());
    }

    #[test]
    fn env_overrides() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            ("CREWTIME_WORK_START", "9"),
            ("CREWTIME_WORK_END", "17"),
            ("CREWTIME_MAX_WINDOW_DAYS", "30"),
            ("CREWTIME_MAX_RESOURCE_IDS", "50"),
            ("CREWTIME_METRICS_PORT", "9100"),
        ]));
        assert_eq!(cfg.working_hours, WorkingHours { start_hour: 9, end_hour: 17 });
        assert_eq!(cfg.max_query_window_ms, 30 * DAY_MS);
        assert_eq!(cfg.max_resource_ids, 50);
        assert_eq!(cfg.metrics_port, Some(9100));
    }

    #[test]
    fn garbage_values_ignored() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            ("CREWTIME_WORK_START", "eight"),
            ("CREWTIME_MAX_WINDOW_DAYS", "-3"),
            ("CREWTIME_METRICS_PORT", "99999"),
        ]));
        assert_eq!(cfg, EngineConfig::default());
    }
}
