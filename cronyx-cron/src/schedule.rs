use chrono::{DateTime, Utc};
use cron::Schedule as CronExpr;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const EVERY_PREFIX: &str = "@every ";
const CRON_PREFIX: &str = "@cron ";

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid schedule expression '{expr}': {source}")]
    InvalidCron {
        expr: String,
        #[source]
        source: cron::error::Error,
    },
    #[error("invalid @every duration in '{expr}': {source}")]
    InvalidDuration {
        expr: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("unsupported schedule expression: '{0}'")]
    Unsupported(String),
}

/// A schedule that has been parsed and validated at registration time.
///
/// Accepts standard (7-field, seconds-first) cron expressions, `@every
/// <duration>`, `@cron <expr>`, and the usual named macros (`@hourly`,
/// `@daily`, `@weekly`, `@monthly`, `@yearly`).
#[derive(Debug, Clone)]
pub struct ValidatedSchedule {
    source: String,
    kind: ScheduleKind,
}

#[derive(Debug, Clone)]
enum ScheduleKind {
    Cron(CronExpr),
    Every(Duration),
}

impl ValidatedSchedule {
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let trimmed = expr.trim();
        let kind = if let Some(rest) = trimmed.strip_prefix(EVERY_PREFIX) {
            let dur = humantime::parse_duration(rest).map_err(|source| {
                ScheduleError::InvalidDuration {
                    expr: expr.to_string(),
                    source,
                }
            })?;
            ScheduleKind::Every(dur)
        } else if let Some(rest) = trimmed.strip_prefix(CRON_PREFIX) {
            ScheduleKind::Cron(parse_cron(rest, expr)?)
        } else {
            match trimmed {
                "@hourly" => ScheduleKind::Every(Duration::from_secs(3600)),
                "@daily" | "@midnight" => ScheduleKind::Every(Duration::from_secs(24 * 3600)),
                "@weekly" => ScheduleKind::Every(Duration::from_secs(7 * 24 * 3600)),
                "@monthly" => ScheduleKind::Every(Duration::from_secs(30 * 24 * 3600)),
                "@yearly" | "@annually" => ScheduleKind::Every(Duration::from_secs(365 * 24 * 3600)),
                "" => return Err(ScheduleError::Unsupported(expr.to_string())),
                _ => ScheduleKind::Cron(parse_cron(trimmed, expr)?),
            }
        };

        Ok(Self {
            source: expr.to_string(),
            kind,
        })
    }

    /// Computes the next occurrence strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.kind {
            ScheduleKind::Cron(schedule) => schedule.after(&after).next(),
            ScheduleKind::Every(dur) => {
                let dur = chrono::Duration::from_std(*dur).ok()?;
                Some(after + dur)
            }
        }
    }

    /// Computes the next occurrence from the current time.
    pub fn upcoming(&self) -> Option<DateTime<Utc>> {
        self.next_after(Utc::now())
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

fn parse_cron(expr: &str, original: &str) -> Result<CronExpr, ScheduleError> {
    CronExpr::from_str(expr).map_err(|source| ScheduleError::InvalidCron {
        expr: original.to_string(),
        source,
    })
}

impl Display for ValidatedSchedule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for ValidatedSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}
