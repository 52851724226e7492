pub mod decode_orchestrator;

pub use decode_orchestrator::DecodeOrchestrator;
