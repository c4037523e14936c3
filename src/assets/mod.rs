pub mod preview;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbaImage};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to decode image '{file_name}': {source}")]
    Decode {
        file_name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode PNG: {0}")]
    Encode(#[source] image::ImageError),
    #[error("malformed data URL: {0}")]
    DataUrl(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, AssetError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

/// A decoded texture. Cheap to share: the pixels sit behind an `Arc`.
#[derive(Debug, Clone)]
pub struct TextureAsset {
    pub key: String,
    pub pixels: Arc<RgbaImage>,
    pub wrap: WrapMode,
}

impl TextureAsset {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Session-lifetime texture cache. Entries are never evicted.
#[derive(Debug, Default, Clone)]
pub struct TextureCache {
    entries: HashMap<String, Arc<TextureAsset>>,
    decode_count: usize,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<TextureAsset>> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of times an image was actually decoded into this cache.
    pub fn decode_count(&self) -> usize {
        self.decode_count
    }

    pub fn insert(&mut self, asset: TextureAsset) -> Arc<TextureAsset> {
        let asset = Arc::new(asset);
        self.entries.insert(asset.key.clone(), asset.clone());
        asset
    }

    /// Returns the cached texture for `key`, decoding `bytes` only on a miss.
    pub fn get_or_decode(
        &mut self,
        key: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Arc<TextureAsset>> {
        if let Some(hit) = self.get(key) {
            log::debug!("Texture cache hit for '{}'", key);
            return Ok(hit);
        }
        let image = decode_image(file_name, bytes)?;
        self.decode_count += 1;
        log::info!(
            "Decoded texture '{}' ({}x{})",
            key,
            image.width(),
            image.height()
        );
        Ok(self.insert(TextureAsset {
            key: key.to_string(),
            pixels: Arc::new(image.to_rgba8()),
            wrap: WrapMode::Repeat,
        }))
    }
}

/// Produces cache keys for textures whose file name alone may collide with
/// another slot (normal maps, heightmap sources).
pub trait CacheKeyGenerator: Send {
    fn key(&mut self, prefix: &str, file_name: &str, bytes: &[u8]) -> String;
}

/// `prefix_<n>_<file>`, with `n` counting up per generator.
#[derive(Debug, Default)]
pub struct MonotonicKeys {
    next: u64,
}

impl CacheKeyGenerator for MonotonicKeys {
    fn key(&mut self, prefix: &str, file_name: &str, _bytes: &[u8]) -> String {
        let n = self.next;
        self.next += 1;
        format!("{prefix}_{n}_{file_name}")
    }
}

/// `prefix_<first 16 hex digits of sha256>_<file>`; identical payloads share a key.
#[derive(Debug, Default)]
pub struct ContentKeys;

impl CacheKeyGenerator for ContentKeys {
    fn key(&mut self, prefix: &str, file_name: &str, bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        let hex: String = digest
            .iter()
            .take(8)
            .map(|byte| format!("{byte:02x}"))
            .collect();
        format!("{prefix}_{hex}_{file_name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    #[default]
    Monotonic,
    Content,
}

impl KeyStrategy {
    pub fn generator(self) -> Box<dyn CacheKeyGenerator> {
        match self {
            Self::Monotonic => Box::new(MonotonicKeys::default()),
            Self::Content => Box::new(ContentKeys),
        }
    }
}

pub fn decode_image(file_name: &str, bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|source| AssetError::Decode {
        file_name: file_name.to_string(),
        source,
    })
}

pub fn mime_type_for(file_name: &str) -> &'static str {
    ImageFormat::from_path(file_name)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

pub fn to_data_url(file_name: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type_for(file_name),
        STANDARD.encode(bytes)
    )
}

/// Accepts `data:<mime>;base64,<payload>` and returns the payload bytes.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let payload = url
        .strip_prefix("data:")
        .and_then(|rest| rest.find(";base64,").map(|pos| &rest[pos + 8..]))
        .ok_or_else(|| AssetError::DataUrl(truncate(url, 32)))?;
    Ok(STANDARD.decode(payload)?)
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(AssetError::Encode)?;
    Ok(out.into_inner())
}

pub fn read_file(path: &std::path::Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| AssetError::Read {
        path: path.display().to_string(),
        source,
    })
}
