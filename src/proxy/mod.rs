pub mod context;

pub use context::{BoxBody, RequestContext};
