//! # Modèle d'image et cache de trames pour le banc de capture Argus
//!
//! Ce module fournit la représentation des images acquises par les caméras
//! industrielles du banc, le cache thread-safe de dernières trames
//! ([`FrameStore`]) ainsi que l'interface de collaborateur caméra et une
//! caméra simulée pour les tests.
//!
//! Le collaborateur caméra pousse les trames à son propre rythme; le cache ne
//! conserve que la trame la plus récente par caméra. Les trames perdues sont
//! acceptables, seule compte la cohérence d'un instantané au moment de la
//! capture.

use std::collections::HashMap;
use std::time::SystemTime;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod simulator;
pub mod store;

// Re-exports
pub use simulator::{run_acquisition, SimulatedCamera};
pub use store::FrameStore;

/// Identifiants des caméras cibles du banc (1 à 4)
pub const TARGET_CAMERAS: [u32; 4] = [1, 2, 3, 4];

/// Erreur liée à l'acquisition de trames
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Erreur d'initialisation de la caméra: {0}")]
    InitError(String),

    #[error("Erreur d'acquisition d'image: {0}")]
    AcquisitionError(String),

    #[error("Erreur de configuration de la caméra: {0}")]
    ConfigError(String),

    #[error("Données d'image invalides: {0}")]
    InvalidData(String),
}

/// Format de pixel supporté par le banc
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Niveaux de gris, 8 bits par pixel
    Mono8,

    /// Couleur RGB entrelacée, 8 bits par canal
    Rgb8,

    /// Couleur BGR entrelacée, 8 bits par canal (sortie du convertisseur Basler)
    Bgr8,
}

impl PixelFormat {
    /// Nombre de canaux par pixel
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Mono8 => 1,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
        }
    }
}

/// Image acquise par une caméra
///
/// La trame possède son propre tampon de pixels: un `clone()` est une copie
/// profonde, ce qui garantit l'isolation des instantanés du [`FrameStore`].
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Données brutes de l'image (entrelacées, ligne par ligne)
    pub data: Vec<u8>,

    /// Largeur de l'image
    pub width: u32,

    /// Hauteur de l'image
    pub height: u32,

    /// Format de pixel
    pub pixel_format: PixelFormat,

    /// Horodatage de l'acquisition
    pub timestamp: SystemTime,

    /// Numéro de trame attribué par la caméra
    pub frame_id: u64,
}

impl CameraFrame {
    /// Crée une trame en vérifiant la cohérence du tampon
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        frame_id: u64,
    ) -> Result<Self, FrameError> {
        let expected = (width as usize) * (height as usize) * pixel_format.channels();
        if data.len() != expected {
            return Err(FrameError::InvalidData(format!(
                "Taille de tampon incohérente: {} octets reçus, {} attendus ({}x{} {:?})",
                data.len(),
                expected,
                width,
                height,
                pixel_format
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            pixel_format,
            timestamp: SystemTime::now(),
            frame_id,
        })
    }

    /// Taille attendue du tampon de pixels en octets
    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * self.pixel_format.channels()
    }
}

/// Configuration d'une caméra du banc
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Identifiant de la caméra (1 à 4 sur le banc)
    pub id: u32,

    /// Format de pixel
    pub pixel_format: PixelFormat,

    /// Largeur de l'image
    pub width: u32,

    /// Hauteur de l'image
    pub height: u32,

    /// Fréquence d'acquisition (images par seconde)
    pub frame_rate: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            id: 1,
            pixel_format: PixelFormat::Bgr8,
            width: 640,
            height: 480,
            frame_rate: 30.0,
        }
    }
}

/// Interface de collaborateur caméra
///
/// Le coeur du système ne connaît les caméras qu'à travers cette interface:
/// le pilote réel (Basler, GigE, ...) vit en dehors du dépôt et pousse ses
/// trames dans le [`FrameStore`] via [`run_acquisition`].
#[async_trait]
pub trait Camera: Send + Sync {
    /// Initialise la caméra avec la configuration spécifiée
    async fn initialize(&mut self, config: CameraConfig) -> Result<(), FrameError>;

    /// Démarre l'acquisition d'images
    async fn start_acquisition(&mut self) -> Result<(), FrameError>;

    /// Arrête l'acquisition d'images
    async fn stop_acquisition(&mut self) -> Result<(), FrameError>;

    /// Acquiert une image (bloquant jusqu'à la prochaine trame)
    async fn acquire_frame(&mut self) -> Result<CameraFrame, FrameError>;

    /// Obtient la configuration actuelle
    fn get_config(&self) -> CameraConfig;
}

/// Instantané de trames: une copie profonde par caméra présente dans le cache
pub type FrameSnapshot = HashMap<u32, CameraFrame>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_buffer_coherence() {
        // Tampon cohérent
        let frame = CameraFrame::new(vec![0u8; 12], 2, 2, PixelFormat::Bgr8, 0);
        assert!(frame.is_ok());

        // Tampon trop court
        let frame = CameraFrame::new(vec![0u8; 11], 2, 2, PixelFormat::Bgr8, 0);
        assert!(frame.is_err());

        // Mono8: un octet par pixel
        let frame = CameraFrame::new(vec![0u8; 4], 2, 2, PixelFormat::Mono8, 0);
        assert!(frame.is_ok());
    }

    #[test]
    fn test_pixel_format_channels() {
        assert_eq!(PixelFormat::Mono8.channels(), 1);
        assert_eq!(PixelFormat::Rgb8.channels(), 3);
        assert_eq!(PixelFormat::Bgr8.channels(), 3);
    }
}
