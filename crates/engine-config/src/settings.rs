use crate::error::ConfigError;
use planner::Weights;
use std::str::FromStr;
use std::time::Duration;

/// Every tunable the coordination core needs, loaded from defaults
/// overridable by environment variables and validated once at startup.
/// Threaded through the runtime as `Arc<Settings>` rather than read from
/// globals, the way the teacher threads a validated settings struct into
/// its pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tick_period: Duration,
    /// Simulated-day length: how often the day-tick source advances the
    /// ERP's date and re-polls expected shipments/deliveries.
    pub day_tick_period: Duration,
    pub plc_read_timeout: Duration,
    pub plc_write_timeout: Duration,
    pub scoring_weights: Weights,
    pub leniency: f64,
    pub watchdog_duration: Duration,
    pub supply_line_count: u32,
    pub delivery_line_count: u32,
    pub delivery_line_capacity: u32,
    pub conveyor_length: usize,
    pub intake_poll_cap: u32,
    pub erp_base_url: String,
    pub erp_http_timeout: Duration,
}

const DEFAULT_ERP_BASE_URL: &str = "http://localhost:8080";

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(3),
            day_tick_period: Duration::from_secs(60),
            plc_read_timeout: Duration::from_secs(1),
            plc_write_timeout: Duration::from_secs(10),
            scoring_weights: Weights::new(1.0, 125.0, 100.0),
            leniency: 0.20,
            watchdog_duration: Duration::from_secs(600),
            supply_line_count: 4,
            delivery_line_count: 4,
            delivery_line_capacity: 6,
            conveyor_length: 5,
            intake_poll_cap: 32,
            erp_base_url: DEFAULT_ERP_BASE_URL.to_string(),
            erp_http_timeout: Duration::from_secs(5),
        }
    }
}

fn env_override<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|e| ConfigError::Malformed {
            key,
            value: raw,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn env_secs_override(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    env_override(key, default.as_secs()).map(Duration::from_secs)
}

impl Settings {
    /// Start from defaults, apply any recognised environment overrides,
    /// then validate. Unrecognised environment variables are ignored.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let settings = Settings {
            tick_period: env_secs_override("MES_TICK_PERIOD_SECS", defaults.tick_period)?,
            day_tick_period: env_secs_override("MES_DAY_TICK_PERIOD_SECS", defaults.day_tick_period)?,
            plc_read_timeout: env_secs_override("MES_PLC_READ_TIMEOUT_SECS", defaults.plc_read_timeout)?,
            plc_write_timeout: env_secs_override("MES_PLC_WRITE_TIMEOUT_SECS", defaults.plc_write_timeout)?,
            scoring_weights: Weights::new(
                env_override("MES_WEIGHT_TIME", defaults.scoring_weights.time)?,
                env_override("MES_WEIGHT_QUEUE", defaults.scoring_weights.queue)?,
                env_override("MES_WEIGHT_STEP", defaults.scoring_weights.step)?,
            ),
            leniency: env_override("MES_LENIENCY", defaults.leniency)?,
            watchdog_duration: env_secs_override("MES_WATCHDOG_SECS", defaults.watchdog_duration)?,
            supply_line_count: env_override("MES_SUPPLY_LINE_COUNT", defaults.supply_line_count)?,
            delivery_line_count: env_override("MES_DELIVERY_LINE_COUNT", defaults.delivery_line_count)?,
            delivery_line_capacity: env_override(
                "MES_DELIVERY_LINE_CAPACITY",
                defaults.delivery_line_capacity,
            )?,
            conveyor_length: env_override("MES_CONVEYOR_LENGTH", defaults.conveyor_length)?,
            intake_poll_cap: env_override("MES_INTAKE_POLL_CAP", defaults.intake_poll_cap)?,
            erp_base_url: env_override("MES_ERP_BASE_URL", defaults.erp_base_url)?,
            erp_http_timeout: env_secs_override("MES_ERP_HTTP_TIMEOUT_SECS", defaults.erp_http_timeout)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.leniency) {
            return Err(ConfigError::NotPositive {
                field: "leniency",
                value: self.leniency,
            });
        }
        for (field, value) in [
            ("scoring_weights.time", self.scoring_weights.time),
            ("scoring_weights.queue", self.scoring_weights.queue),
            ("scoring_weights.step", self.scoring_weights.step),
        ] {
            if value < 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        if self.supply_line_count == 0 {
            return Err(ConfigError::NotPositive {
                field: "supply_line_count",
                value: 0.0,
            });
        }
        if self.conveyor_length == 0 {
            return Err(ConfigError::NotPositive {
                field: "conveyor_length",
                value: 0.0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn leniency_out_of_range_is_rejected() {
        let mut s = Settings::default();
        s.leniency = 1.2;
        assert!(s.validate().is_err());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut s = Settings::default();
        s.scoring_weights = Weights::new(-1.0, 125.0, 100.0);
        assert!(s.validate().is_err());
    }
}
