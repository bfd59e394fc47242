use serde::Serialize;

/// Emits `value` as pretty JSON at DEBUG, skipping serialization when DEBUG is off.
pub(crate) fn debug_json<T>(label: &str, value: &T)
where
    T: Serialize,
{
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let pretty_json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|error| format!("<pretty serialize failed: {error}>"));
    tracing::debug!(payload = %pretty_json, "{label}");
}
