use super::builder::TransactionBuilder;
use super::error::EngineResult;
use super::payload::TransactionPayload;

/// 签名入口接受的交易形态：已序列化字节或尚未定稿的构建器。
#[derive(Debug)]
pub enum TransactionInput {
    Bytes(Vec<u8>),
    Builder(TransactionBuilder),
}

impl TransactionInput {
    pub fn is_builder(&self) -> bool {
        matches!(self, TransactionInput::Builder(_))
    }

    /// 统一归一为待签名字节；构建器在此处定稿。
    pub fn into_bytes(self) -> EngineResult<Vec<u8>> {
        match self {
            TransactionInput::Bytes(bytes) => {
                TransactionPayload::from_bytes(&bytes)?.validate()?;
                Ok(bytes)
            }
            TransactionInput::Builder(mut builder) => builder.finalize(),
        }
    }
}

impl From<Vec<u8>> for TransactionInput {
    fn from(bytes: Vec<u8>) -> Self {
        TransactionInput::Bytes(bytes)
    }
}

impl From<TransactionBuilder> for TransactionInput {
    fn from(builder: TransactionBuilder) -> Self {
        TransactionInput::Builder(builder)
    }
}
