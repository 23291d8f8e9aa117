//! Cache thread-safe de dernières trames
//!
//! Le cache conserve la trame la plus récente par caméra. Un unique verrou
//! sérialise les mises à jour et les instantanés: toutes les entrées d'un
//! instantané sont donc cohérentes entre elles au même instant.

use std::collections::HashMap;

use log::debug;
use parking_lot::Mutex;

use crate::{CameraFrame, FrameSnapshot};

/// Cache de dernières trames par caméra
///
/// - `update` remplace la trame d'une caméra, appelé par le collaborateur
///   caméra à son propre rythme;
/// - `snapshot` retourne une copie profonde des trames demandées, les caméras
///   absentes du cache sont simplement omises (capture partielle autorisée).
#[derive(Debug, Default)]
pub struct FrameStore {
    /// Dernière trame décodée par caméra
    frames: Mutex<HashMap<u32, CameraFrame>>,
}

impl FrameStore {
    /// Crée un cache vide
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(HashMap::new()),
        }
    }

    /// Remplace la trame en cache pour la caméra spécifiée
    pub fn update(&self, camera_id: u32, frame: CameraFrame) {
        let mut frames = self.frames.lock();
        frames.insert(camera_id, frame);
    }

    /// Retourne une copie profonde des trames des caméras demandées
    ///
    /// Les caméras sans trame en cache sont omises du résultat: une caméra
    /// qui ne diffuse pas encore n'est pas une erreur.
    pub fn snapshot(&self, camera_ids: &[u32]) -> FrameSnapshot {
        let frames = self.frames.lock();
        let mut result = HashMap::new();

        for &camera_id in camera_ids {
            if let Some(frame) = frames.get(&camera_id) {
                result.insert(camera_id, frame.clone());
            }
        }

        debug!(
            "Instantané: {} trame(s) sur {} caméra(s) demandée(s)",
            result.len(),
            camera_ids.len()
        );

        result
    }

    /// Retourne une copie de la dernière trame d'une caméra
    pub fn latest(&self, camera_id: u32) -> Option<CameraFrame> {
        self.frames.lock().get(&camera_id).cloned()
    }

    /// Identifiants des caméras ayant au moins une trame en cache
    pub fn camera_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.frames.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Nombre de caméras présentes dans le cache
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    /// Indique si le cache est vide
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Vide le cache
    pub fn clear(&self) {
        self.frames.lock().clear();
    }
}
