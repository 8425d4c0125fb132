pub mod address;
pub mod object;

pub use address::{ADDRESS_LENGTH, ObjectId, SuiAddress};
pub use object::{Coin, CoinType, ObjectDigest, ObjectRef, SUI_COIN_TYPE};

/// 系统状态共享对象 `0x5`。
pub const SUI_SYSTEM_STATE_OBJECT_ID: ObjectId = ObjectId::from_low_u64(5);
pub const SUI_SYSTEM_STATE_INITIAL_VERSION: u64 = 1;
/// 系统包 `0x3`。
pub const SUI_SYSTEM_PACKAGE_ID: ObjectId = ObjectId::from_low_u64(3);
pub const SUI_FRAMEWORK_PACKAGE_ID: ObjectId = ObjectId::from_low_u64(2);
