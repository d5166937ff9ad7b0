//! Cpu usage meter drawn across a row of keys

use std::error::Error;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use das_core::{CancelToken, KeyboardError, ReportDevice};
use dkb4q::{KeyState, Keyboard, Rgb};
use tracing::{debug, info};

/// Number of counters on the aggregate `cpu` line that are accounted for
const COUNTERS: usize = 9;

const USER: usize = 0;
const NICE: usize = 1;
const IDLE: usize = 3;

/// Cpu time spent per category during one sampling interval, in ticks
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CpuRates {
    pub system: f64,
    pub user: f64,
    pub idle: f64,
}

impl CpuRates {
    /// Deltas between two counter snapshots. Counters that went backwards count as zero.
    pub fn between(prev: &[u64; COUNTERS], cur: &[u64; COUNTERS]) -> Self {
        let mut rates = Self::default();
        for (i, (p, c)) in prev.iter().zip(cur).enumerate() {
            let delta = c.saturating_sub(*p) as f64;
            match i {
                USER | NICE => rates.user += delta,
                IDLE => rates.idle += delta,
                _ => rates.system += delta,
            }
        }
        rates
    }

    pub fn total(&self) -> f64 {
        self.system + self.user + self.idle
    }
}

/// Parse the aggregate counters out of `/proc/stat` contents
pub fn parse_proc_stat(contents: &str) -> Option<[u64; COUNTERS]> {
    let line = contents
        .lines()
        .find(|l| l.split_whitespace().next() == Some("cpu"))?;

    let mut counters = [0u64; COUNTERS];
    let mut fields = line.split_whitespace().skip(1);
    for counter in counters.iter_mut() {
        *counter = fields.next()?.parse().ok()?;
    }
    Some(counters)
}

/// Samples cpu usage from procfs
pub struct CpuSampler {
    path: PathBuf,
    last: Option<[u64; COUNTERS]>,
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new("/proc/stat")
    }
}

impl CpuSampler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last: None,
        }
    }

    /// Take a snapshot. Returns the usage since the previous snapshot, or
    /// none on the first call.
    pub fn sample(&mut self) -> io::Result<Option<CpuRates>> {
        let contents = fs::read_to_string(&self.path)?;
        let counters = parse_proc_stat(&contents).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "no aggregate cpu line found")
        })?;
        let rates = self.last.map(|prev| CpuRates::between(&prev, &counters));
        self.last = Some(counters);
        Ok(rates)
    }
}

/// Map cpu usage onto `n` keys.
///
/// Keys fill up with the system color first, then the user color. The key
/// where the two meet mixes both by weight, the last lit key is dimmed by its
/// fractional share, and idle keys stay black.
pub fn meter_colors(rates: &CpuRates, n: usize, system: Rgb, user: Rgb) -> Vec<Rgb> {
    let total = rates.total();
    if total <= 0.0 {
        return vec![Rgb::BLACK; n];
    }

    let system_keys = n as f64 * rates.system / total;
    let user_keys = n as f64 * rates.user / total;
    let lit_keys = system_keys + user_keys;

    (0..n)
        .map(|i| {
            let (lo, hi) = (i as f64, (i + 1) as f64);
            if hi <= system_keys {
                system
            } else if lo < system_keys {
                let weight_system = system_keys.fract();
                let weight_user = (1.0 - weight_system).min(user_keys);
                let value = weight_system + weight_user;
                let (s, u) = if weight_system < weight_user {
                    (value * weight_system / weight_user, value)
                } else {
                    (value, value * weight_user / weight_system)
                };
                system.scale(s).mix(user.scale(u))
            } else if hi <= lit_keys {
                user
            } else if lo < lit_keys {
                user.scale(lit_keys.fract())
            } else {
                Rgb::BLACK
            }
        })
        .collect()
}

/// Redraw the meter every `interval` until cancelled
pub fn run_meter<D: ReportDevice>(
    keyboard: &mut Keyboard<D>,
    keys: &[u8],
    (system, user): (Rgb, Rgb),
    interval: Duration,
    cancel: &CancelToken,
) -> Result<(), Box<dyn Error>> {
    let mut sampler = CpuSampler::default();
    sampler.sample()?;
    info!("drawing cpu meter on {} keys every {interval:?}", keys.len());

    while !cancel.wait(interval) {
        let Some(rates) = sampler.sample()? else {
            continue;
        };
        debug!(?rates, "sampled cpu");

        let states: Vec<_> = meter_colors(&rates, keys.len(), system, user)
            .into_iter()
            .zip(keys)
            .map(|(color, &id)| KeyState::solid(id, color))
            .collect();

        match keyboard.set_state(&states, cancel) {
            Err(e) if matches!(e.root(), KeyboardError::Cancelled) => break,
            res => res?,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb::new(0xFF, 0, 0);
    const BLUE: Rgb = Rgb::new(0, 0, 0xFF);

    const STAT: &str = "\
cpu  10132153 290696 3084719 46828483 16683 0 25195 0 175628 0
cpu0 1393280 32966 572056 13343292 6130 0 17875 0 23933 0
intr 199292 0 0
";

    #[test]
    fn parses_aggregate_line() {
        assert_eq!(
            parse_proc_stat(STAT).unwrap(),
            [10132153, 290696, 3084719, 46828483, 16683, 0, 25195, 0, 175628]
        );
        assert_eq!(parse_proc_stat("cpu0 1 2 3\n"), None);
        assert_eq!(parse_proc_stat("cpu 1 2 3\n"), None);
    }

    #[test]
    fn rates_split_by_category() {
        let prev = [100, 10, 50, 1000, 5, 0, 5, 0, 0];
        let cur = [130, 20, 70, 1100, 10, 0, 10, 0, 0];
        let rates = CpuRates::between(&prev, &cur);
        assert_eq!(rates.user, 40.0);
        assert_eq!(rates.idle, 100.0);
        assert_eq!(rates.system, 30.0);
    }

    #[test]
    fn sampler_reports_deltas() {
        let dir = std::env::temp_dir().join(format!("das-keys-stat-{}", std::process::id()));
        fs::write(&dir, "cpu 1 0 1 2 0 0 0 0 0\n").unwrap();
        let mut sampler = CpuSampler::new(&dir);
        assert_eq!(sampler.sample().unwrap(), None);

        fs::write(&dir, "cpu 2 1 2 6 0 0 0 0 0\n").unwrap();
        let rates = sampler.sample().unwrap().unwrap();
        assert_eq!(rates, CpuRates { system: 1.0, user: 2.0, idle: 4.0 });
        fs::remove_file(&dir).unwrap();
    }

    #[test]
    fn whole_keys() {
        let rates = CpuRates { system: 3.0, user: 3.0, idle: 6.0 };
        let colors = meter_colors(&rates, 12, RED, BLUE);
        assert_eq!(&colors[..3], [RED; 3]);
        assert_eq!(&colors[3..6], [BLUE; 3]);
        assert_eq!(&colors[6..], [Rgb::BLACK; 6]);
    }

    #[test]
    fn boundary_keys_are_mixed() {
        let rates = CpuRates { system: 1.0, user: 2.0, idle: 1.0 };
        let colors = meter_colors(&rates, 2, RED, BLUE);
        assert_eq!(colors, [Rgb::new(0xFF, 0, 0xFF), Rgb::new(0, 0, 0x80)]);
    }

    #[test]
    fn idle_machine_is_dark() {
        let colors = meter_colors(&CpuRates::default(), 4, RED, BLUE);
        assert_eq!(colors, [Rgb::BLACK; 4]);
        let colors = meter_colors(&CpuRates { idle: 5.0, ..Default::default() }, 4, RED, BLUE);
        assert_eq!(colors, [Rgb::BLACK; 4]);
    }
}
