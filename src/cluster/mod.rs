pub mod secrets;

pub use secrets::{KubectlSecretStore, SecretStore};
