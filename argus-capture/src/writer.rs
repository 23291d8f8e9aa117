//! Écriture des instantanés sur disque
//!
//! L'arborescence et les noms de fichiers sont figés pour rester compatibles
//! avec les jeux d'images existants du banc:
//!
//! ```text
//! {racine}/{produit}/{condition}/Light_{lum:03}/
//!     {produit}_{condition}_Light_{lum:03}_{prise:03}_Cam{id}_{AAAAmmjj_HHMMSS}.png
//! ```
//!
//! Les fichiers de la caméra 3 sont enracinés dans le miroir
//! `{racine}/cam3/...` quand sa sortie est activée.

use std::fs;
use std::path::{Path, PathBuf};

use argus_frames::{CameraFrame, FrameSnapshot, PixelFormat};
use chrono::Local;
use image::ColorType;
use log::{debug, error, info, warn};

use crate::settings::{CaptureSettings, SaveMode};
use crate::CaptureError;

/// Identifiant de la caméra à arborescence miroir
pub const CAM3_ID: u32 = 3;

/// Écrivain d'instantanés
///
/// Sans état: toutes les informations viennent des réglages et de
/// l'instantané de trames passés à chaque appel.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotWriter;

impl SnapshotWriter {
    /// Crée un écrivain d'instantanés
    pub fn new() -> Self {
        Self
    }

    /// Nom du répertoire de luminosité (`Light_{lum:03}`)
    fn light_dir_name(brightness: u8) -> String {
        format!("Light_{:03}", brightness)
    }

    /// Enregistre un instantané de trames sous l'étiquette de luminosité
    ///
    /// Retourne le nombre de fichiers effectivement écrits. Un produit ou une
    /// condition vides, comme un instantané vide, rendent 0 sans créer de
    /// répertoire. Les échecs d'écriture par fichier sont journalisés et
    /// exclus du compte sans interrompre les fichiers restants; seule
    /// l'impossibilité de créer un répertoire est une erreur dure.
    pub fn save(
        &self,
        settings: &CaptureSettings,
        brightness: u8,
        snapshot: &FrameSnapshot,
    ) -> Result<usize, CaptureError> {
        let product = settings.product.trim();
        let condition = settings.condition.trim();

        if product.is_empty() || condition.is_empty() {
            warn!("Produit ou condition vide, aucune sauvegarde");
            return Ok(0);
        }

        if snapshot.is_empty() {
            debug!("Instantané vide, aucune sauvegarde");
            return Ok(0);
        }

        let light_dir = Self::light_dir_name(brightness);
        let path_std = settings
            .save_path
            .join(product)
            .join(condition)
            .join(&light_dir);
        let path_cam3 = settings
            .save_path
            .join("cam3")
            .join(product)
            .join(condition)
            .join(&light_dir);

        // Création des répertoires selon la politique de sauvegarde
        if matches!(settings.save_mode, SaveMode::StandardOnly | SaveMode::All) {
            Self::ensure_dir(&path_std)?;
        }
        if matches!(settings.save_mode, SaveMode::All | SaveMode::Cam3Only) {
            Self::ensure_dir(&path_cam3)?;
        }

        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

        // Ordre déterministe pour les journaux et les tests
        let mut camera_ids: Vec<u32> = snapshot.keys().copied().collect();
        camera_ids.sort_unstable();

        let mut saved = 0;
        for camera_id in camera_ids {
            match settings.save_mode {
                SaveMode::StandardOnly if camera_id == CAM3_ID => continue,
                SaveMode::Cam3Only if camera_id != CAM3_ID => continue,
                _ => {}
            }

            let filename = format!(
                "{}_{}_{}_{:03}_Cam{}_{}.png",
                product, condition, light_dir, settings.shot_no, camera_id, timestamp
            );
            let dir = if camera_id == CAM3_ID {
                &path_cam3
            } else {
                &path_std
            };
            let path = Self::disambiguated(dir.join(filename));

            match write_frame(&path, &snapshot[&camera_id]) {
                Ok(()) => {
                    info!("saved: {}", path.display());
                    saved += 1;
                }
                Err(e) => {
                    warn!("Échec d'écriture de {}: {}", path.display(), e);
                }
            }
        }

        Ok(saved)
    }

    /// Crée un répertoire et ses parents, erreur dure en cas d'échec
    fn ensure_dir(path: &Path) -> Result<(), CaptureError> {
        fs::create_dir_all(path).map_err(|e| {
            error!("Impossible de créer le répertoire {}: {}", path.display(), e);
            CaptureError::from(e)
        })
    }

    /// Résout une collision de nom par un suffixe `_{n}`
    ///
    /// Deux captures dans la même seconde avec le même compteur de prises
    /// produiraient le même nom; l'écrasement silencieux du banc historique
    /// est remplacé par un suffixe de désambiguïsation.
    fn disambiguated(path: PathBuf) -> PathBuf {
        if !path.exists() {
            return path;
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();

        for n in 1.. {
            let candidate = parent.join(format!("{}_{}.png", stem, n));
            if !candidate.exists() {
                debug!(
                    "Collision de nom sur {}, repli sur {}",
                    path.display(),
                    candidate.display()
                );
                return candidate;
            }
        }

        unreachable!()
    }
}

/// Écrit une trame au format PNG
fn write_frame(path: &Path, frame: &CameraFrame) -> Result<(), image::ImageError> {
    match frame.pixel_format {
        PixelFormat::Mono8 => image::save_buffer(
            path,
            &frame.data,
            frame.width,
            frame.height,
            ColorType::L8,
        ),
        PixelFormat::Rgb8 => image::save_buffer(
            path,
            &frame.data,
            frame.width,
            frame.height,
            ColorType::Rgb8,
        ),
        PixelFormat::Bgr8 => {
            // L'encodeur PNG attend du RGB: inverser les canaux B et R
            let mut rgb = frame.data.clone();
            for pixel in rgb.chunks_exact_mut(3) {
                pixel.swap(0, 2);
            }
            image::save_buffer(path, &rgb, frame.width, frame.height, ColorType::Rgb8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn frame(camera_id: u32) -> CameraFrame {
        CameraFrame::new(vec![camera_id as u8; 4 * 4 * 3], 4, 4, PixelFormat::Bgr8, 0).unwrap()
    }

    fn snapshot_of(ids: &[u32]) -> FrameSnapshot {
        ids.iter().map(|&id| (id, frame(id))).collect()
    }

    fn settings_in(dir: &TempDir, mode: SaveMode) -> CaptureSettings {
        CaptureSettings {
            save_path: dir.path().to_path_buf(),
            save_mode: mode,
            ..CaptureSettings::default()
        }
    }

    fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        if !dir.exists() {
            return files;
        }
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            for entry in fs::read_dir(&current).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    files.push(path);
                }
            }
        }
        files.sort();
        files
    }

    #[test]
    fn test_empty_product_rejected_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_in(&dir, SaveMode::All);
        settings.product = "  ".to_string();

        let saved = SnapshotWriter::new()
            .save(&settings, 100, &snapshot_of(&[1, 2, 3, 4]))
            .unwrap();

        assert_eq!(saved, 0);
        // Aucun répertoire ne doit avoir été créé
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_snapshot_rejected_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir, SaveMode::All);

        let saved = SnapshotWriter::new()
            .save(&settings, 100, &HashMap::new())
            .unwrap();

        assert_eq!(saved, 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_all_mode_writes_four_files_split_across_trees() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir, SaveMode::All);

        let saved = SnapshotWriter::new()
            .save(&settings, 100, &snapshot_of(&[1, 2, 3, 4]))
            .unwrap();
        assert_eq!(saved, 4);

        let std_tree = files_under(&dir.path().join("ModelA"));
        let cam3_tree = files_under(&dir.path().join("cam3"));
        assert_eq!(std_tree.len(), 3);
        assert_eq!(cam3_tree.len(), 1);

        // La caméra 3 va dans le miroir cam3, les autres dans l'arbre standard
        assert!(cam3_tree[0]
            .to_string_lossy()
            .contains("cam3/ModelA/Test_A/Light_100"));
        for file in &std_tree {
            assert!(!file.file_name().unwrap().to_string_lossy().contains("Cam3_"));
        }
    }

    #[test]
    fn test_cam3_only_mode_writes_single_file() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir, SaveMode::Cam3Only);

        let saved = SnapshotWriter::new()
            .save(&settings, 55, &snapshot_of(&[1, 2, 3, 4]))
            .unwrap();
        assert_eq!(saved, 1);

        // Seul l'arbre cam3 doit exister
        assert!(!dir.path().join("ModelA").exists());
        let cam3_tree = files_under(&dir.path().join("cam3"));
        assert_eq!(cam3_tree.len(), 1);
        assert!(cam3_tree[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains("Cam3_"));
    }

    #[test]
    fn test_standard_only_mode_skips_cam3() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir, SaveMode::StandardOnly);

        let saved = SnapshotWriter::new()
            .save(&settings, 100, &snapshot_of(&[1, 2, 3, 4]))
            .unwrap();
        assert_eq!(saved, 3);
        assert!(!dir.path().join("cam3").exists());
    }

    #[test]
    fn test_partial_snapshot_saves_present_cameras() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir, SaveMode::All);

        // Seules les caméras 2 et 4 diffusent
        let saved = SnapshotWriter::new()
            .save(&settings, 100, &snapshot_of(&[2, 4]))
            .unwrap();
        assert_eq!(saved, 2);
    }

    #[test]
    fn test_filename_scheme() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_in(&dir, SaveMode::StandardOnly);
        settings.shot_no = 7;

        SnapshotWriter::new()
            .save(&settings, 5, &snapshot_of(&[1]))
            .unwrap();

        let files = files_under(dir.path());
        assert_eq!(files.len(), 1);

        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(
            name.starts_with("ModelA_Test_A_Light_005_007_Cam1_"),
            "nom inattendu: {}",
            name
        );
        assert!(name.ends_with(".png"));
        // Horodatage AAAAmmjj_HHMMSS: 15 caractères + extension
        let timestamp = name
            .trim_start_matches("ModelA_Test_A_Light_005_007_Cam1_")
            .trim_end_matches(".png");
        assert_eq!(timestamp.len(), 15);
        assert_eq!(files[0].parent().unwrap(),
            dir.path().join("ModelA").join("Test_A").join("Light_005"));
    }

    #[test]
    fn test_collision_gets_disambiguating_suffix() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir, SaveMode::StandardOnly);
        let writer = SnapshotWriter::new();
        let snapshot = snapshot_of(&[1]);

        // Deux sauvegardes dans la même seconde avec le même compteur
        let first = writer.save(&settings, 100, &snapshot).unwrap();
        let second = writer.save(&settings, 100, &snapshot).unwrap();
        assert_eq!(first + second, 2);

        let files = files_under(dir.path());
        assert_eq!(files.len(), 2, "l'écrasement silencieux est interdit");
    }
}
