pub mod assignment;
pub mod checkout;
pub mod loyalty;
pub mod materializer;
pub mod orchestrator;
pub mod queue;
pub mod selector;
