mod types;

pub use types::{ClusterAddresses, Configuration};
