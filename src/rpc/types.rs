use serde::{Deserialize, Serialize};

use crate::crypto::SuiSignature;
use crate::types::{Coin, CoinType, ObjectDigest, ObjectId, ObjectRef, SuiAddress};

use super::serde_helpers::{field_as_string, option_field_as_string};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub coin_type: CoinType,
    #[serde(with = "field_as_string")]
    pub coin_object_count: u64,
    #[serde(with = "field_as_string")]
    pub total_balance: u128,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcCoin {
    pub coin_type: CoinType,
    pub coin_object_id: ObjectId,
    #[serde(with = "field_as_string")]
    pub version: u64,
    pub digest: ObjectDigest,
    #[serde(with = "field_as_string")]
    pub balance: u64,
}

impl From<RpcCoin> for Coin {
    fn from(raw: RpcCoin) -> Self {
        Coin {
            object_ref: ObjectRef::new(raw.coin_object_id, raw.version, raw.digest),
            coin_type: raw.coin_type,
            balance: raw.balance,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinPage {
    #[serde(default)]
    pub data: Vec<RpcCoin>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_next_page: bool,
}

/// 交易字节与其签名，提交前的最终形态。
#[derive(Clone, Debug)]
pub struct SignedTransaction {
    pub tx_bytes: Vec<u8>,
    pub signatures: Vec<SuiSignature>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RequestType {
    WaitForEffectsCert,
    WaitForLocalExecution,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteOptions {
    pub show_effects: bool,
    pub show_object_changes: bool,
    pub show_balance_changes: bool,
    pub show_events: bool,
    #[serde(skip)]
    pub request_type: RequestType,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            show_effects: true,
            show_object_changes: true,
            show_balance_changes: true,
            show_events: false,
            request_type: RequestType::WaitForLocalExecution,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Owner {
    AddressOwner(SuiAddress),
    ObjectOwner(SuiAddress),
    Shared { initial_shared_version: u64 },
    Immutable,
}

impl Owner {
    pub fn address(&self) -> Option<SuiAddress> {
        match self {
            Owner::AddressOwner(address) => Some(*address),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiObjectRef {
    pub object_id: ObjectId,
    pub version: u64,
    pub digest: ObjectDigest,
}

impl From<SuiObjectRef> for ObjectRef {
    fn from(raw: SuiObjectRef) -> Self {
        ObjectRef::new(raw.object_id, raw.version, raw.digest)
    }
}

impl From<ObjectRef> for SuiObjectRef {
    fn from(reference: ObjectRef) -> Self {
        SuiObjectRef {
            object_id: reference.object_id,
            version: reference.version,
            digest: reference.digest,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedObjectRef {
    pub owner: Owner,
    pub reference: SuiObjectRef,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ExecutionStatus {
    Success,
    Failure { error: String },
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasCostSummary {
    #[serde(with = "field_as_string")]
    pub computation_cost: u64,
    #[serde(with = "field_as_string")]
    pub storage_cost: u64,
    #[serde(with = "field_as_string")]
    pub storage_rebate: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEffects {
    pub status: ExecutionStatus,
    pub transaction_digest: String,
    #[serde(default)]
    pub gas_used: GasCostSummary,
    #[serde(default)]
    pub created: Vec<OwnedObjectRef>,
    #[serde(default)]
    pub mutated: Vec<OwnedObjectRef>,
    #[serde(default)]
    pub deleted: Vec<SuiObjectRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ObjectChange {
    #[serde(rename_all = "camelCase")]
    Published {
        package_id: ObjectId,
        #[serde(with = "field_as_string")]
        version: u64,
        digest: ObjectDigest,
        #[serde(default)]
        modules: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Created {
        sender: SuiAddress,
        owner: Owner,
        object_type: String,
        object_id: ObjectId,
        #[serde(with = "field_as_string")]
        version: u64,
        digest: ObjectDigest,
    },
    #[serde(rename_all = "camelCase")]
    Mutated {
        sender: SuiAddress,
        owner: Owner,
        object_type: String,
        object_id: ObjectId,
        #[serde(with = "field_as_string")]
        version: u64,
        digest: ObjectDigest,
    },
    #[serde(rename_all = "camelCase")]
    Deleted {
        sender: SuiAddress,
        object_type: String,
        object_id: ObjectId,
        #[serde(with = "field_as_string")]
        version: u64,
    },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChange {
    pub owner: Owner,
    pub coin_type: CoinType,
    #[serde(with = "field_as_string")]
    pub amount: i128,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub digest: String,
    #[serde(default)]
    pub effects: Option<TransactionEffects>,
    #[serde(default)]
    pub object_changes: Option<Vec<ObjectChange>>,
    #[serde(default)]
    pub balance_changes: Option<Vec<BalanceChange>>,
    #[serde(default, with = "option_field_as_string")]
    pub checkpoint: Option<u64>,
}

impl TransactionResponse {
    pub fn status(&self) -> Option<&ExecutionStatus> {
        self.effects.as_ref().map(|effects| &effects.status)
    }

    pub fn object_changes(&self) -> &[ObjectChange] {
        self.object_changes.as_deref().unwrap_or_default()
    }

    pub fn published_package(&self) -> Option<ObjectId> {
        self.object_changes().iter().find_map(|change| match change {
            ObjectChange::Published { package_id, .. } => Some(*package_id),
            _ => None,
        })
    }

    /// 按类型后缀查找新建对象，例如 `::package::UpgradeCap`。
    pub fn created_of_type(&self, suffix: &str) -> Option<ObjectId> {
        self.object_changes().iter().find_map(|change| match change {
            ObjectChange::Created {
                object_type,
                object_id,
                ..
            } if object_type.ends_with(suffix) => Some(*object_id),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevInspectResults {
    pub effects: TransactionEffects,
    #[serde(default)]
    pub error: Option<String>,
}
