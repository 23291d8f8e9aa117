//! Caméra simulée pour les tests et le fonctionnement sans matériel
//!
//! Le banc réel dégrade en affichage noir quand aucune caméra Basler n'est
//! détectée; la caméra simulée permet d'exercer le coordinateur de capture et
//! le cache de trames sans matériel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::time::sleep;

use crate::{Camera, CameraConfig, CameraFrame, FrameError, FrameStore, PixelFormat};

/// Caméra simulée produisant un damier déterministe
pub struct SimulatedCamera {
    /// Configuration actuelle
    config: CameraConfig,

    /// État d'acquisition
    is_acquiring: bool,

    /// Compteur de trames
    frame_counter: u64,
}

impl SimulatedCamera {
    /// Crée une nouvelle caméra simulée
    pub fn new(id: u32) -> Self {
        info!("Création d'une caméra simulée: {}", id);

        Self {
            config: CameraConfig {
                id,
                ..CameraConfig::default()
            },
            is_acquiring: false,
            frame_counter: 0,
        }
    }

    /// Génère une image simulée (damier 32x32 teinté par l'identifiant)
    fn generate_image(&mut self) -> CameraFrame {
        let channels = self.config.pixel_format.channels();
        let size = (self.config.width * self.config.height) as usize * channels;
        let mut data = vec![0u8; size];

        let block_size = 32;
        for y in 0..self.config.height {
            for x in 0..self.config.width {
                let block_x = x / block_size;
                let block_y = y / block_size;
                let is_white = (block_x + block_y) % 2 == 0;

                let value = if is_white { 200 } else { 50 };
                // Teinte propre à la caméra pour distinguer les fichiers produits
                let tint = (self.config.id * 20) as u8;

                let index = ((y * self.config.width + x) as usize) * channels;
                match self.config.pixel_format {
                    PixelFormat::Mono8 => {
                        data[index] = value;
                    }
                    PixelFormat::Rgb8 | PixelFormat::Bgr8 => {
                        data[index] = value;
                        data[index + 1] = value.saturating_sub(tint);
                        data[index + 2] = value.saturating_add(tint);
                    }
                }
            }
        }

        let frame = CameraFrame {
            data,
            width: self.config.width,
            height: self.config.height,
            pixel_format: self.config.pixel_format,
            timestamp: std::time::SystemTime::now(),
            frame_id: self.frame_counter,
        };

        self.frame_counter += 1;

        frame
    }
}

#[async_trait]
impl Camera for SimulatedCamera {
    async fn initialize(&mut self, config: CameraConfig) -> Result<(), FrameError> {
        info!(
            "Initialisation de la caméra simulée {} ({}x{} {:?})",
            config.id, config.width, config.height, config.pixel_format
        );

        self.config = config;

        Ok(())
    }

    async fn start_acquisition(&mut self) -> Result<(), FrameError> {
        if self.is_acquiring {
            warn!(
                "La caméra simulée {} est déjà en cours d'acquisition",
                self.config.id
            );
            return Ok(());
        }

        info!(
            "Démarrage de l'acquisition pour la caméra simulée {}",
            self.config.id
        );
        self.is_acquiring = true;

        Ok(())
    }

    async fn stop_acquisition(&mut self) -> Result<(), FrameError> {
        if !self.is_acquiring {
            warn!(
                "La caméra simulée {} n'est pas en cours d'acquisition",
                self.config.id
            );
            return Ok(());
        }

        info!(
            "Arrêt de l'acquisition pour la caméra simulée {}",
            self.config.id
        );
        self.is_acquiring = false;

        Ok(())
    }

    async fn acquire_frame(&mut self) -> Result<CameraFrame, FrameError> {
        if !self.is_acquiring {
            return Err(FrameError::AcquisitionError(
                "La caméra n'est pas en cours d'acquisition".to_string(),
            ));
        }

        // Simuler la cadence d'acquisition
        if self.config.frame_rate > 0.0 {
            let frame_time_ms = (1000.0 / self.config.frame_rate) as u64;
            sleep(Duration::from_millis(frame_time_ms)).await;
        }

        debug!(
            "Acquisition d'une image depuis la caméra simulée {}",
            self.config.id
        );

        Ok(self.generate_image())
    }

    fn get_config(&self) -> CameraConfig {
        self.config.clone()
    }
}

/// Tâche de rafraîchissement du cache de trames
///
/// Boucle d'acquisition d'un collaborateur caméra: chaque trame acquise
/// remplace la précédente dans le [`FrameStore`]. La tâche s'arrête quand le
/// drapeau `running` passe à `false`. Les erreurs d'acquisition ponctuelles
/// sont journalisées et la boucle continue (trames perdues acceptables).
pub fn run_acquisition(
    mut camera: Box<dyn Camera>,
    store: Arc<FrameStore>,
    running: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let camera_id = camera.get_config().id;

        if let Err(e) = camera.start_acquisition().await {
            warn!(
                "Impossible de démarrer l'acquisition de la caméra {}: {}",
                camera_id, e
            );
            return;
        }

        while running.load(Ordering::SeqCst) {
            match camera.acquire_frame().await {
                Ok(frame) => store.update(camera_id, frame),
                Err(e) => {
                    warn!("Erreur d'acquisition sur la caméra {}: {}", camera_id, e);
                    sleep(Duration::from_millis(100)).await;
                }
            }
        }

        if let Err(e) = camera.stop_acquisition().await {
            warn!(
                "Erreur lors de l'arrêt de la caméra {}: {}",
                camera_id, e
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_camera_acquisition() {
        let mut camera = SimulatedCamera::new(2);
        camera
            .initialize(CameraConfig {
                id: 2,
                pixel_format: PixelFormat::Bgr8,
                width: 64,
                height: 48,
                frame_rate: 0.0,
            })
            .await
            .unwrap();

        // Acquisition sans démarrage: erreur
        assert!(camera.acquire_frame().await.is_err());

        camera.start_acquisition().await.unwrap();

        let first = camera.acquire_frame().await.unwrap();
        let second = camera.acquire_frame().await.unwrap();

        assert_eq!(first.frame_id, 0);
        assert_eq!(second.frame_id, 1);
        assert_eq!(first.data.len(), 64 * 48 * 3);

        camera.stop_acquisition().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_acquisition_feeds_store() {
        let store = Arc::new(FrameStore::new());
        let running = Arc::new(AtomicBool::new(true));

        let mut camera = SimulatedCamera::new(1);
        camera
            .initialize(CameraConfig {
                id: 1,
                pixel_format: PixelFormat::Mono8,
                width: 32,
                height: 32,
                frame_rate: 200.0,
            })
            .await
            .unwrap();

        let handle = run_acquisition(Box::new(camera), Arc::clone(&store), Arc::clone(&running));

        // Laisser quelques trames arriver
        sleep(Duration::from_millis(100)).await;

        running.store(false, Ordering::SeqCst);
        handle.await.unwrap();

        let frame = store.latest(1).expect("aucune trame en cache");
        assert_eq!(frame.pixel_format, PixelFormat::Mono8);
        assert_eq!(frame.data.len(), 32 * 32);
    }
}
