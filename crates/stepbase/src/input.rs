//! Request decoding at the engine boundary.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use stepbase_kernel::ModelSource;

use crate::error::{EngineError, Result};

/// A model as requested by a caller: a file path or inline STEP content,
/// never both.
///
/// Inline content is raw bytes; in JSON it travels as standard base64.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Path of a STEP file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Inline STEP content.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_content")]
    pub content: Option<Vec<u8>>,
}

impl ModelRequest {
    /// Request a file.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            content: None,
        }
    }

    /// Request inline content.
    pub fn from_content(content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: None,
            content: Some(content.into()),
        }
    }

    /// Resolve into a [`ModelSource`].
    pub fn into_source(self) -> Result<ModelSource> {
        match (self.path, self.content) {
            (Some(path), None) => {
                if path.as_os_str().is_empty() {
                    return Err(EngineError::config("empty model path"));
                }
                Ok(ModelSource::Path(path))
            }
            (None, Some(content)) => Ok(ModelSource::Bytes(content)),
            (Some(_), Some(_)) => Err(EngineError::config(
                "provide either a model path or model content, not both",
            )),
            (None, None) => Err(EngineError::config("provide a model path or model content")),
        }
    }
}

mod base64_content {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(content: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match content {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| STANDARD.decode(text).map_err(de::Error::custom))
            .transpose()
    }
}

impl TryFrom<ModelRequest> for ModelSource {
    type Error = EngineError;

    fn try_from(request: ModelRequest) -> Result<Self> {
        request.into_source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_input() {
        assert_eq!(
            ModelRequest::from_path("a.step").into_source().unwrap(),
            ModelSource::Path("a.step".into())
        );
        assert_eq!(
            ModelRequest::from_content("ISO-10303-21;").into_source().unwrap(),
            ModelSource::Bytes(b"ISO-10303-21;".to_vec())
        );

        let both = ModelRequest {
            path: Some("a.step".into()),
            content: Some("x".into()),
        };
        assert!(matches!(both.into_source(), Err(EngineError::Configuration(_))));
        assert!(matches!(
            ModelRequest::default().into_source(),
            Err(EngineError::Configuration(_))
        ));
        assert!(matches!(
            ModelRequest::from_path("").into_source(),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_request_from_json() {
        let request: ModelRequest = serde_json::from_str(r#"{"path": "bracket.step"}"#).unwrap();
        let source = ModelSource::try_from(request).unwrap();
        assert_eq!(source.label().as_deref(), Some("bracket.step"));
    }

    #[test]
    fn test_binary_content_as_base64() {
        let request = ModelRequest::from_content(vec![0x49, 0x53, 0xff, 0x00]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["content"], "SVP/AA==");
        assert!(json.get("path").is_none());

        let back: ModelRequest = serde_json::from_value(json).unwrap();
        assert_eq!(
            back.into_source().unwrap(),
            ModelSource::Bytes(vec![0x49, 0x53, 0xff, 0x00])
        );

        let bad = serde_json::from_str::<ModelRequest>(r#"{"content": "not base64!"}"#);
        assert!(bad.is_err());
    }
}
