/*!
 * Subtitle translation jobs.
 *
 * - `job`: job status and the snapshot observers see
 * - `batch`: numbered blocks and response alignment
 * - `backend`: the translation backend seam and its Ollama implementation
 * - `manager`: the single-job engine with preemption and incremental saves
 */

// Re-export main types for easier usage
pub use self::backend::{OllamaBackend, TranslationBackend};
pub use self::job::{JobSnapshot, JobStatus};
pub use self::manager::{Claim, JobManager, JobOptions, JobOutcome, JobTicket};

// Submodules
pub mod backend;
pub mod batch;
pub mod job;
pub mod manager;
