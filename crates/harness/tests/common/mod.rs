//! Common test utilities

#![allow(dead_code)]

use harness::{HarnessConfig, ListenerConfig, NodeCommand, NodeConfig, NodeHarness};
use std::path::Path;
use std::time::Duration;

/// Shell script standing in for the node: startup banner, then heartbeats,
/// then the miners start after a few beats
pub const NODE_SCRIPT: &str = r#"
echo "Worker Thread Count: 2"
i=0
while true; do
  echo "p2p-status heartbeat $i"
  if [ $i -eq 3 ]; then echo "sealing new block #1"; fi
  if [ -n "$TX_HASH" ] && [ $i -eq 2 ]; then
    echo "Transaction: $TX_HASH was sealed into block #1"
  fi
  i=$((i+1))
  sleep 0.1
done
"#;

pub fn config(dir: &Path) -> HarnessConfig {
    harness::logging::init_logging("debug");
    let node = NodeConfig::new(
        NodeCommand::new("sh").arg("-c").arg(NODE_SCRIPT).env("TX_HASH", "0xabc123"),
        dir.join("log"),
    )
    .with_data_dir(dir.join("database"))
    .with_shutdown_timeout(Duration::from_secs(2));
    let listener = ListenerConfig {
        poll_interval_ms: 10,
        rotation_grace_ms: 50,
        ..ListenerConfig::default()
    };
    HarnessConfig::new(node, listener)
}

pub fn harness(dir: &Path) -> NodeHarness {
    NodeHarness::new(config(dir)).expect("valid harness config")
}
