use serde::Serialize;

/// How an artifact payload is encoded in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactEncoding {
    Base64,
}

/// A fetched visual resource, encoded once and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub encoding: ArtifactEncoding,
    pub data: String,
    pub media_type: String,
    /// Size of the decoded payload.
    pub size_bytes: usize,
}

impl Artifact {
    /// `data:` URL form, as attached to model requests.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}
