//! # gestion-inference
//!
//! Vision model backends and the invoker that bounds and sanitises calls
//! to them.

pub mod invoker;
pub mod vertex;
pub mod vision;

pub use invoker::AiInvoker;
pub use vertex::VertexVisionBackend;
pub use vision::{OllamaVisionBackend, VisionBackend};
