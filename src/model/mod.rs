//! Domain records: messages, tone analyses and sender history.

pub mod email;
pub mod history;
pub mod tone;

pub use email::{EmailMessage, NewEmail};
pub use history::SenderHistory;
pub use tone::{Emotion, Formality, Sentiment, ToneAnalysis, Urgency};
