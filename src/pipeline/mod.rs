//! The analysis pipeline, leaves first.
//!
//! ```text
//! source ──▶ orchestrator ──▶ analysis (× 10, one at a time)
//!   │
//!   └─ extract (PDF text / transcription)
//! ```
//!
//! 1. [`source`]: pick the one active input and reduce it to text
//! 2. [`extract`]: remote and pdfium collaborators used by `source`
//! 3. [`analysis`]: one prompt, one transcript, one remote call
//! 4. [`orchestrator`]: per-stage state, the sequence runner, manual retry

pub mod analysis;
pub mod extract;
pub mod orchestrator;
pub mod source;
