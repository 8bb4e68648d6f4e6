//! Message processing pipeline.
//!
//! Every inbound message flows through:
//! 1. `MessageLifecycle`: persisted status transitions
//! 2. `ToneAnalyzer::analyze()`: tone classification
//! 3. `should_auto_reply()`: reply decision
//! 4. `TemplateSelector::select()` + `render()`: reply body
//! 5. `ReplyTransport::send_reply()`: delivery

pub mod lifecycle;
pub mod policy;
pub mod processor;

pub use lifecycle::{MessageLifecycle, MessageStatus};
pub use policy::should_auto_reply;
pub use processor::{ProcessingOutcome, ReplyDecision, ReplyPipeline};
