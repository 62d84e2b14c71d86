use super::{ClientId, ServerId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 署名の添付先。親レコードがまだ端末内にしかない場合は `Client`、
/// 既にリモートに存在する場合は `Server` を指す。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SignatureTarget {
    Client(ClientId),
    Server(ServerId),
}

impl SignatureTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            SignatureTarget::Client(_) => "client",
            SignatureTarget::Server(_) => "server",
        }
    }

    pub fn id_str(&self) -> &str {
        match self {
            SignatureTarget::Client(id) => id.as_str(),
            SignatureTarget::Server(id) => id.as_str(),
        }
    }

    pub fn from_parts(kind: &str, id: String) -> Result<Self, String> {
        match kind {
            "client" => Ok(SignatureTarget::Client(ClientId::new(id)?)),
            "server" => Ok(SignatureTarget::Server(ServerId::new(id)?)),
            other => Err(format!("Unknown signature target kind: {other}")),
        }
    }
}

impl fmt::Display for SignatureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id_str())
    }
}
