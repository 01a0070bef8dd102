use std::path::Path;

/// SoC temperature on Raspberry Pi class boards, in millidegrees Celsius.
pub const CPU_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Formats the thermal zone reading as e.g. `54.2°C`.
///
/// Never fails: progress lines are best-effort telemetry.
pub fn read_temperature(path: &Path) -> String {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return "Temp N/A".to_string(),
    };
    match raw.trim().parse::<i64>() {
        Ok(milli) => format!("{:.1}°C", milli as f64 / 1000.0),
        Err(_) => "Temp Read Error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_millidegrees() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("temp");
        std::fs::write(&path, "54200\n")?;
        assert_eq!(read_temperature(&path), "54.2°C");
        Ok(())
    }

    #[test]
    fn missing_zone_is_not_an_error() {
        assert_eq!(read_temperature(Path::new("/nonexistent/thermal")), "Temp N/A");
    }

    #[test]
    fn garbage_reading_is_flagged() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("temp");
        std::fs::write(&path, "hot")?;
        assert_eq!(read_temperature(&path), "Temp Read Error");
        Ok(())
    }
}
