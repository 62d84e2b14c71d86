use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

const MAX_SIGNATURE_BYTES: usize = 2 * 1024 * 1024;
const ALLOWED_MIME_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

/// 署名キャンバスから取り込んだ画像。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureImage {
    mime_type: String,
    bytes: Vec<u8>,
}

impl SignatureImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Result<Self, String> {
        let mime_type = mime_type.into().to_ascii_lowercase();
        if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err(format!("Unsupported signature image type: {mime_type}"));
        }
        if bytes.is_empty() {
            return Err("Signature image cannot be empty".to_string());
        }
        if bytes.len() > MAX_SIGNATURE_BYTES {
            return Err(format!(
                "Signature image exceeds {MAX_SIGNATURE_BYTES} bytes ({})",
                bytes.len()
            ));
        }
        Ok(Self { mime_type, bytes })
    }

    /// `data:image/png;base64,...` 形式を読み込む
    pub fn from_data_url(data_url: &str) -> Result<Self, String> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| "Signature data URL must start with 'data:'".to_string())?;
        let (header, encoded) = rest
            .split_once(',')
            .ok_or_else(|| "Signature data URL is missing ','".to_string())?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| "Signature data URL must be base64 encoded".to_string())?;
        let bytes = BASE64_STANDARD
            .decode(encoded.trim())
            .map_err(|e| format!("Invalid base64 in signature data URL: {e}"))?;
        Self::new(mime_type, bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            BASE64_STANDARD.encode(&self.bytes)
        )
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}
