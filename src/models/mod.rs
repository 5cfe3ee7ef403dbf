pub mod certificate;
pub mod ledger_entry;
pub mod loaders;
pub mod summary;

pub use certificate::{CertificateId, Credentials};
pub use ledger_entry::{EntryStatus, LedgerEntry};
pub use loaders::{apply_duplicate_policy, load_certificate_list};
pub use summary::RunSummary;
