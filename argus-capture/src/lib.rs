//! # Coordinateur de capture du banc multi-caméras Argus
//!
//! Ce module est le coeur du banc de capture: il valide et parcourt une plage
//! de luminosité, synchronise la stabilisation de l'éclairage avec la prise
//! de vue, et enregistre les images sous une arborescence déterministe avec
//! un compteur de prises auto-incrémenté.
//!
//! Les collaborateurs matériels restent à l'extérieur: les caméras poussent
//! leurs trames dans un [`argus_frames::FrameStore`], les bancs de LED sont
//! pilotés via [`argus_lighting::LightBank`], et les interfaces (GUI, web)
//! se réduisent à des adaptateurs appelant [`CaptureSystem`].
//!
//! ## Exemple d'utilisation
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use argus_capture::{CaptureSystem, SequenceRange, SettingsStore, SharedSettings};
//! use argus_frames::FrameStore;
//! use argus_lighting::{LightBank, DEFAULT_BAUD_RATE, DEFAULT_LIGHT_PORTS};
//! use parking_lot::Mutex;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Réglages persistés, cache de trames et bancs de LED
//!     let settings = SharedSettings::load(SettingsStore::new("config/config.json"));
//!     let frames = Arc::new(FrameStore::new());
//!     let lights = Arc::new(Mutex::new(LightBank::connect(
//!         &DEFAULT_LIGHT_PORTS,
//!         DEFAULT_BAUD_RATE,
//!     )));
//!
//!     let system = CaptureSystem::new(frames, lights, settings);
//!     system.set_cameras_available(true);
//!
//!     // Balayage de luminosité 30 → 120 par pas de 10
//!     let mut events = system.start_sequence(SequenceRange::new(30, 120, 10))?;
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

use thiserror::Error;

pub mod coordinator;
pub mod sequence;
pub mod settings;
pub mod writer;

// Re-exports
pub use coordinator::{
    CaptureSystem, SequenceEvent, SequenceState, SequenceStatus, SequenceTiming,
};
pub use sequence::SequenceRange;
pub use settings::{CaptureSettings, SaveMode, SettingsStore, SharedSettings};
pub use writer::SnapshotWriter;

/// Erreur du coordinateur de capture
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Plage de séquence rejetée avant toute action matérielle
    #[error("Plage de séquence invalide: {0}")]
    InvalidRange(String),

    /// Une séquence automatique est déjà en cours d'exécution
    #[error("Une séquence automatique est déjà en cours")]
    SequenceActive,

    /// Erreur d'entrée/sortie (création d'un répertoire de sauvegarde)
    #[error("Erreur d'entrée/sortie: {0}")]
    IoError(#[from] std::io::Error),
}
