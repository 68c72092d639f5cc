//! Shared application state (C7 wiring), injected into C6 handlers the same
//! way the teacher's `RpcContext` is injected via `Extension`.

use std::sync::Arc;
use std::time::Duration;

use utxoledger_gate::SerializationGate;
use utxoledger_store::UtxoStore;

/// Default Serialization Gate acquire timeout when a request does not send
/// `x-block-ttl`.
pub const DEFAULT_GATE_TTL: Duration = Duration::from_millis(5000);

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UtxoStore>,
    pub gate: Arc<SerializationGate>,
}

impl AppState {
    pub fn new(store: Arc<dyn UtxoStore>) -> Self {
        AppState {
            store,
            gate: Arc::new(SerializationGate::new()),
        }
    }
}
