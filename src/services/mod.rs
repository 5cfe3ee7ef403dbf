pub mod archiver;
pub mod ledger;
pub mod portal;
pub mod progress;

pub use archiver::{ArchiveReport, Archiver};
pub use ledger::{compute_resume_set, read_ledger, LedgerRow, ResultLedger};
pub use portal::{CertificatePortal, SessionDriver};
pub use progress::{LogProgress, ProgressSink};
