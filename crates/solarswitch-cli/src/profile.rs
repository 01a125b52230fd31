//! Scripted signal profiles: `VALUE:DURATION[,VALUE:DURATION...]`,
//! e.g. `500:5m,1100:6m,500:5m`.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub value: f64,
    pub duration: Duration,
}

/// `250ms`, `30s`, `5m`, `2h`; a bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    let n: u64 = num
        .parse()
        .with_context(|| format!("invalid duration {s:?}"))?;
    let d = match unit {
        "ms" => Duration::from_millis(n),
        "" | "s" => Duration::from_secs(n),
        "m" => Duration::from_secs(n.checked_mul(60).with_context(|| format!("duration {s:?} too large"))?),
        "h" => Duration::from_secs(n.checked_mul(3600).with_context(|| format!("duration {s:?} too large"))?),
        other => bail!("unknown duration unit {other:?} in {s:?}"),
    };
    Ok(d)
}

pub fn parse_profile(s: &str) -> Result<Vec<Segment>> {
    let segments = s
        .split(',')
        .filter(|p| !p.trim().is_empty())
        .map(|part| -> Result<Segment> {
            let (value, duration) = part
                .split_once(':')
                .ok_or_else(|| anyhow!("segment {part:?} is not VALUE:DURATION"))?;
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("invalid value in segment {part:?}"))?;
            if !value.is_finite() {
                bail!("value in segment {part:?} is not finite");
            }
            Ok(Segment {
                value,
                duration: parse_duration(duration)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if segments.is_empty() {
        bail!("profile is empty");
    }
    let total = segments
        .iter()
        .try_fold(Duration::ZERO, |acc, seg| acc.checked_add(seg.duration))
        .context("profile too long")?;
    if u64::try_from(total.as_millis()).is_err() {
        bail!("profile too long");
    }
    Ok(segments)
}

/// Profile value at `t`; `None` past the end.
pub fn value_at(segments: &[Segment], t: Duration) -> Option<f64> {
    let mut end = Duration::ZERO;
    for seg in segments {
        end += seg.duration;
        if t < end {
            return Some(seg.value);
        }
    }
    None
}

pub fn total_duration(segments: &[Segment]) -> Duration {
    segments.iter().map(|s| s.duration).sum()
}
