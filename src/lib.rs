//! # monospec
//!
//! Tagged asset catalog viewer. Items from a JSON catalog are browsed by
//! collection and filter, and the selected item's asset is previewed live:
//! still images, looping video, numbered frame sequences and interactive STL
//! models.
//!
//! ## Modules
//!
//! - [`util`] - Errors and math helpers
//! - [`catalog`] - Catalog model, normalization and data sources
//! - [`token`] - Selection tokens and staleness guards
//! - [`selection`] - Collection, filter and index state
//! - [`session`] - Asset session lifecycle, strategies and the model viewer
//! - [`settings`] - User configuration
//! - [`viewer`] - Desktop host (feature `viewer`)
//!
//! ## Example
//!
//! ```ignore
//! use monospec::prelude::*;
//!
//! let loaded = load_catalog(Path::new("."), &DEFAULT_SOURCES);
//! let generation = Generation::new();
//! let mut selection = SelectionController::new(loaded.catalog.clone(), generation.clone());
//! let mut sessions = SessionManager::new(env, generation, SurfaceSize::new(800, 600));
//! let change = selection.select(0, &mut NullSink);
//! sessions.apply(&change);
//! ```

pub mod catalog;
pub mod selection;
pub mod session;
pub mod settings;
pub mod token;
pub mod util;

// Desktop viewer (optional, enabled with "viewer" feature)
#[cfg(feature = "viewer")]
pub mod viewer;

pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::catalog::{load_catalog, AssetRef, Catalog, Collection, Item, LoadedCatalog, DEFAULT_SOURCES};
    pub use crate::selection::{NullSink, Selection, SelectionChange, SelectionController, SelectionSink};
    pub use crate::session::{
        AssetSession, FrameRequest, FsSource, KitCell, MountNode, MountSurface, SessionEnv, SessionManager,
        SurfaceEvent, SurfaceSize,
    };
    pub use crate::settings::Settings;
    pub use crate::token::{Cancelable, Generation, SelectionToken, TokenWatch};
    pub use crate::util::{Error, Result};
}
