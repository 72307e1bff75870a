mod credentials;

pub use credentials::{CredentialCache, MANAGEMENT_FILE};
