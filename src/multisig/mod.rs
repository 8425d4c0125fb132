pub mod aggregator;
pub mod policy;

pub use aggregator::{CombinedAuthorization, MultiSigAggregator, WeightedSignature, combine};
pub use policy::{MAX_SIGNERS, MULTISIG_FLAG, MultiSigPolicy, WeightedKey};
