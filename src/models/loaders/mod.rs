pub mod csv_loader;

pub use csv_loader::{apply_duplicate_policy, load_certificate_list, parse_certificate_list};
