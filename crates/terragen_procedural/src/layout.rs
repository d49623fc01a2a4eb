//! # Terrain Layout Persistence
//!
//! A layout is the set of height-field parameters a session was generated
//! with. It is stored as a small TOML blob under a named slot so the same
//! terrain can be regenerated later.
//!
//! ```toml
//! [params]
//! p_balance = [52311.7, 901233.25]
//! mountain_height = 4000.0
//! mountain_scale = 50000.0
//! land_height = 2000.0
//! land_scale = 60000.0
//!
//! [player_position]
//! x = 120.0
//! y = -45.0
//! z = 350.0
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use terragen_shared::Vec3;

use crate::error::{ProceduralError, ProceduralResult};
use crate::height_field::HeightFieldParams;

/// Slot the terrain layout is stored under.
pub const LAYOUT_SLOT: &str = "TerrainLayoutSaveSlot";

/// Where a session's height-field parameters come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutSource {
    /// Built-in parameters.
    #[default]
    Default,
    /// Parameters supplied by configuration.
    Custom,
    /// Configured parameters, randomised.
    Randomized,
    /// Parameters loaded from the layout store.
    Saved,
}

/// Persisted layout blob.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedLayout {
    /// Height-field parameters.
    pub params: HeightFieldParams,
    /// Player position at save time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_position: Option<Vec3>,
}

impl SavedLayout {
    /// Layout without a recorded player position.
    #[must_use]
    pub fn new(params: HeightFieldParams) -> Self {
        Self {
            params,
            player_position: None,
        }
    }

    /// Encodes to the stored blob.
    ///
    /// # Errors
    ///
    /// Returns `LayoutEncode` if serialisation fails.
    pub fn encode(&self) -> ProceduralResult<Vec<u8>> {
        toml::to_string(self)
            .map(String::into_bytes)
            .map_err(|e| ProceduralError::LayoutEncode(e.to_string()))
    }

    /// Decodes a stored blob.
    ///
    /// # Errors
    ///
    /// Returns `LayoutDecode` for non-UTF-8, malformed or invalid blobs.
    pub fn decode(blob: &[u8]) -> ProceduralResult<Self> {
        let text = std::str::from_utf8(blob).map_err(|e| ProceduralError::LayoutDecode(e.to_string()))?;
        let layout: Self = toml::from_str(text).map_err(|e| ProceduralError::LayoutDecode(e.to_string()))?;
        layout
            .params
            .validate()
            .map_err(|e| ProceduralError::LayoutDecode(e.to_string()))?;
        Ok(layout)
    }
}

/// Opaque key-value persistence for layout blobs.
pub trait LayoutStore {
    /// Stores `blob` under `slot`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Backend-specific storage failures.
    fn save(&self, slot: &str, blob: &[u8]) -> ProceduralResult<()>;

    /// Reads the blob stored under `slot`, if any.
    ///
    /// # Errors
    ///
    /// Backend-specific storage failures.
    fn load(&self, slot: &str) -> ProceduralResult<Option<Vec<u8>>>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryLayoutStore {
    slots: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryLayoutStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayoutStore for MemoryLayoutStore {
    fn save(&self, slot: &str, blob: &[u8]) -> ProceduralResult<()> {
        self.slots.lock().insert(slot.to_string(), blob.to_vec());
        Ok(())
    }

    fn load(&self, slot: &str) -> ProceduralResult<Option<Vec<u8>>> {
        Ok(self.slots.lock().get(slot).cloned())
    }
}

/// One file per slot inside a directory.
#[derive(Clone, Debug)]
pub struct FileLayoutStore {
    dir: PathBuf,
}

impl FileLayoutStore {
    /// Store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.toml"))
    }
}

impl LayoutStore for FileLayoutStore {
    fn save(&self, slot: &str, blob: &[u8]) -> ProceduralResult<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.slot_path(slot), blob)?;
        Ok(())
    }

    fn load(&self, slot: &str) -> ProceduralResult<Option<Vec<u8>>> {
        match fs::read(self.slot_path(slot)) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Writes `layout` to [`LAYOUT_SLOT`].
///
/// # Errors
///
/// Encoding or storage failures.
pub fn save_layout(store: &dyn LayoutStore, layout: &SavedLayout) -> ProceduralResult<()> {
    store.save(LAYOUT_SLOT, &layout.encode()?)?;
    tracing::info!("Terrain layout saved to slot {}", LAYOUT_SLOT);
    Ok(())
}

/// Reads the layout in [`LAYOUT_SLOT`], if one was saved.
///
/// # Errors
///
/// Storage failures or a malformed blob.
pub fn load_layout(store: &dyn LayoutStore) -> ProceduralResult<Option<SavedLayout>> {
    store.load(LAYOUT_SLOT)?.map(|blob| SavedLayout::decode(&blob)).transpose()
}

/// Picks the session layout.
///
/// `configured` is the parameter set from configuration: returned as-is
/// for `Custom`, randomised for `Randomized`, and used when `Saved` finds
/// nothing in the store.
///
/// # Errors
///
/// Storage failures or a malformed saved blob.
pub fn resolve_layout<R: Rng + ?Sized>(
    source: LayoutSource,
    configured: &HeightFieldParams,
    store: &dyn LayoutStore,
    rng: &mut R,
) -> ProceduralResult<SavedLayout> {
    let layout = match source {
        LayoutSource::Default => SavedLayout::new(HeightFieldParams::default()),
        LayoutSource::Custom => SavedLayout::new(*configured),
        LayoutSource::Randomized => SavedLayout::new(configured.randomized(rng)),
        LayoutSource::Saved => {
            if let Some(saved) = load_layout(store)? {
                saved
            } else {
                tracing::warn!("No saved terrain layout, using configured parameters");
                SavedLayout::new(*configured)
            }
        }
    };
    tracing::debug!("Terrain layout resolved from {:?}: {:?}", source, layout.params);
    Ok(layout)
}
