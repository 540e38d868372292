use serde::{Deserialize, Serialize};
use wavefront::{FarmConfig, FarmSpec};

use crate::layout::Layout;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_BASE_PORT: u16 = 47000;

/// A whole distributed run, as read from a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankSpec {
    pub len: usize,
    pub ranks: usize,
    /// The rank of the process reading the spec, unused when every rank runs in process.
    #[serde(default)]
    pub rank: usize,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    pub farm: FarmConfig,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_base_port() -> u16 {
    DEFAULT_BASE_PORT
}

impl RankSpec {
    /// The clamped layout of this run.
    pub fn layout(&self) -> Layout {
        Layout::new(self.len, self.ranks)
    }

    /// The same run on a single farm.
    pub fn farm_spec(&self) -> FarmSpec {
        FarmSpec {
            len: self.len,
            farm: self.farm,
        }
        .clamped()
    }
}

#[cfg(test)]
mod tests {
    use wavefront::Partition;

    use super::*;

    #[test]
    fn spec_reads_with_network_defaults() {
        let json = r#"{
            "len": 64,
            "ranks": 4,
            "farm": { "workers": 2, "partition": { "kind": "static", "max_chunk": 64 } }
        }"#;
        let spec: RankSpec = serde_json::from_str(json).unwrap();

        assert_eq!(spec.host, DEFAULT_HOST);
        assert_eq!(spec.base_port, DEFAULT_BASE_PORT);
        assert_eq!(spec.rank, 0);
        assert_eq!(spec.layout().ranks(), 4);
        assert!(matches!(
            spec.farm.partition,
            Partition::Static { max_chunk: Some(c) } if c.get() == 64
        ));
    }

    #[test]
    fn farm_spec_is_clamped() {
        let json = r#"{ "len": 2, "ranks": 1, "farm": { "workers": 8 } }"#;
        let spec: RankSpec = serde_json::from_str(json).unwrap();

        assert_eq!(spec.farm_spec().farm.workers.get(), 2);
    }
}
