//! `tracelot-service` — the facade the API/UI layers talk to.
//!
//! Wires the operation executor and the lineage builder over one injected
//! store/ledger pair and exposes the whole surface as a handful of calls:
//! `execute` for state-changing operations, `upstream`/`downstream`/`graph`
//! for lineage reads, `get_batch` as a read passthrough. Wire formats,
//! HTTP status codes and authentication live with the callers.

pub mod service;


pub use service::{OperationRequest, TraceService};
