use std::{env, fmt, io, num::NonZeroUsize, str::FromStr, thread};

use log::info;
use rank::{
    RankSpec,
    config::{DEFAULT_BASE_PORT, DEFAULT_HOST},
};
use wavefront::{FarmConfig, Partition};

const DEFAULT_LEN: usize = 1 << 14;
const DEFAULT_RANKS: usize = 4;
const FALLBACK_WORKERS: usize = 4;

/// What the node computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Farm,
    Sequential,
    /// One rank of a distributed run over TCP.
    Rank,
    /// Every rank of a distributed run inside this process.
    Mesh,
}

impl FromStr for Mode {
    type Err = io::Error;

    fn from_str(s: &str) -> io::Result<Self> {
        match s {
            "farm" => Ok(Mode::Farm),
            "sequential" => Ok(Mode::Sequential),
            "rank" => Ok(Mode::Rank),
            "mesh" => Ok(Mode::Mesh),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unknown mode {other}, expected farm, sequential, rank or mesh"),
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Farm => "farm",
            Mode::Sequential => "sequential",
            Mode::Rank => "rank",
            Mode::Mesh => "mesh",
        };

        f.write_str(name)
    }
}

/// Loads the run description.
///
/// The JSON document at `WAVEFRONT_SPEC` wins when set, otherwise the run is
/// built from `N`, `WORKERS`, `MAX_CHUNK`, `RANK`, `RANKS`, `HOST` and
/// `BASE_PORT`.
pub async fn load() -> io::Result<RankSpec> {
    if let Ok(path) = env::var("WAVEFRONT_SPEC") {
        info!("reading run spec from {path}");
        let raw = tokio::fs::read(&path).await?;
        return Ok(serde_json::from_slice(&raw)?);
    }

    from_vars(|key| env::var(key).ok())
}

/// Builds the run description out of a variable lookup.
///
/// A `MAX_CHUNK` of `0` leaves static units uncapped.
fn from_vars(get: impl Fn(&str) -> Option<String>) -> io::Result<RankSpec> {
    let workers = var(&get, "WORKERS", default_workers())?;
    let max_chunk = var(&get, "MAX_CHUNK", 0)?;

    let farm = FarmConfig::new(NonZeroUsize::new(workers).unwrap_or(NonZeroUsize::MIN))
        .with_partition(Partition::Static {
            max_chunk: NonZeroUsize::new(max_chunk),
        });

    Ok(RankSpec {
        len: var(&get, "N", DEFAULT_LEN)?,
        ranks: var(&get, "RANKS", DEFAULT_RANKS)?,
        rank: var(&get, "RANK", 0)?,
        host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        base_port: var(&get, "BASE_PORT", DEFAULT_BASE_PORT)?,
        farm,
    })
}

/// One worker per hardware thread, minus the one the emitter runs on.
fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(FALLBACK_WORKERS)
}

fn var<T>(get: impl Fn(&str) -> Option<String>, key: &str, default: T) -> io::Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("invalid {key}={raw}: {e}"))
        }),
        None => Ok(default),
    }
}
