//! Réglages de capture partagés et persistance JSON
//!
//! Les réglages sont chargés au démarrage, mutés par les actions des
//! interfaces et par le coordinateur lui-même (compteur de prises), et
//! réécrits sur disque à chaque mutation. Le format JSON et les noms de
//! champs sont figés pour rester compatibles avec les fichiers `config.json`
//! existants du banc (`save_mode` encodé 1/2/3).
//!
//! Toute mutation passe par [`SharedSettings`], l'unique propriétaire des
//! réglages: un seul verrou sérialise les écritures concurrentes des
//! interfaces et du balayage automatique.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::sequence::SequenceRange;

/// Politique de sélection des caméras à enregistrer
///
/// La caméra 3 observe le banc sous un angle particulier et possède sa propre
/// arborescence miroir `cam3/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SaveMode {
    /// Caméras 1, 2 et 4 seulement (code 1)
    StandardOnly,

    /// Toutes les caméras, la 3 dans son arborescence miroir (code 2)
    All,

    /// Caméra 3 seulement (code 3)
    Cam3Only,
}

impl From<SaveMode> for u8 {
    fn from(mode: SaveMode) -> Self {
        match mode {
            SaveMode::StandardOnly => 1,
            SaveMode::All => 2,
            SaveMode::Cam3Only => 3,
        }
    }
}

impl TryFrom<u8> for SaveMode {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(SaveMode::StandardOnly),
            2 => Ok(SaveMode::All),
            3 => Ok(SaveMode::Cam3Only),
            _ => Err(format!("Mode de sauvegarde inconnu: {}", code)),
        }
    }
}

/// Réglages de capture du banc
///
/// Les noms de champs correspondent un pour un au `config.json` historique.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Nom du produit inspecté (obligatoire pour sauvegarder)
    pub product: String,

    /// Condition d'inspection (obligatoire pour sauvegarder)
    pub condition: String,

    /// Compteur de prises, incrémenté après chaque capture réussie
    pub shot_no: u32,

    /// Racine de l'arborescence de sauvegarde
    pub save_path: PathBuf,

    /// Politique de sélection des caméras
    pub save_mode: SaveMode,

    /// Dernière luminosité appliquée [0, 255]
    pub light_value: u8,

    /// Début de la plage de séquence automatique
    pub sequence_start: i32,

    /// Fin de la plage de séquence automatique
    pub sequence_end: i32,

    /// Pas de la plage de séquence automatique (non nul)
    pub sequence_step: i32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            product: "ModelA".to_string(),
            condition: "Test_A".to_string(),
            shot_no: 1,
            save_path: PathBuf::from("./captured_images"),
            save_mode: SaveMode::All,
            light_value: 100,
            sequence_start: 30,
            sequence_end: 120,
            sequence_step: 10,
        }
    }
}

impl CaptureSettings {
    /// Plage de séquence courante
    pub fn sequence_range(&self) -> SequenceRange {
        SequenceRange::new(self.sequence_start, self.sequence_end, self.sequence_step)
    }
}

/// Magasin de persistance des réglages
///
/// Les échecs de lecture comme d'écriture sont journalisés et non fatals: un
/// fichier absent ou corrompu rend les valeurs par défaut, une écriture
/// impossible laisse le banc fonctionner avec les réglages en mémoire.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    /// Chemin du fichier de réglages
    path: PathBuf,
}

impl SettingsStore {
    /// Crée un magasin pointant sur le fichier spécifié
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Chemin du fichier de réglages
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Charge les réglages, en repli sur les valeurs par défaut
    pub fn load(&self) -> CaptureSettings {
        if !self.path.exists() {
            info!(
                "Fichier de réglages absent ({}), valeurs par défaut",
                self.path.display()
            );
            return CaptureSettings::default();
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => {
                    info!("Réglages chargés depuis {}", self.path.display());
                    settings
                }
                Err(e) => {
                    warn!(
                        "Fichier de réglages illisible ({}): {}, valeurs par défaut",
                        self.path.display(),
                        e
                    );
                    CaptureSettings::default()
                }
            },
            Err(e) => {
                warn!(
                    "Échec de lecture des réglages ({}): {}, valeurs par défaut",
                    self.path.display(),
                    e
                );
                CaptureSettings::default()
            }
        }
    }

    /// Enregistre les réglages, retourne `false` en cas d'échec
    pub fn save(&self, settings: &CaptureSettings) -> bool {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent) {
                    warn!(
                        "Impossible de créer le répertoire de réglages {}: {}",
                        parent.display(),
                        e
                    );
                    return false;
                }
            }
        }

        let json = match serde_json::to_string_pretty(settings) {
            Ok(json) => json,
            Err(e) => {
                warn!("Échec de sérialisation des réglages: {}", e);
                return false;
            }
        };

        match fs::write(&self.path, json) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Échec d'écriture des réglages ({}): {}",
                    self.path.display(),
                    e
                );
                false
            }
        }
    }
}

/// Propriétaire unique des réglages partagés
///
/// Chaque mutation est appliquée sous verrou puis persistée immédiatement.
/// Les lectures rendent une copie: aucun appelant ne conserve de référence
/// sur l'état interne.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    /// Réglages courants
    inner: Arc<Mutex<CaptureSettings>>,

    /// Magasin de persistance
    store: Arc<SettingsStore>,
}

impl SharedSettings {
    /// Charge les réglages depuis le magasin spécifié
    pub fn load(store: SettingsStore) -> Self {
        let settings = store.load();
        Self {
            inner: Arc::new(Mutex::new(settings)),
            store: Arc::new(store),
        }
    }

    /// Copie des réglages courants
    pub fn get(&self) -> CaptureSettings {
        self.inner.lock().clone()
    }

    /// Applique une mutation puis persiste les réglages
    pub fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut CaptureSettings),
    {
        let snapshot = {
            let mut settings = self.inner.lock();
            mutate(&mut settings);
            settings.clone()
        };

        // Persistance hors verrou, échec journalisé par le magasin
        self.store.save(&snapshot);
    }

    /// Enregistre la dernière luminosité appliquée
    pub fn set_light_value(&self, value: u8) {
        self.update(|s| s.light_value = value);
    }

    /// Enregistre la plage de séquence demandée
    pub fn set_sequence(&self, range: SequenceRange) {
        self.update(|s| {
            s.sequence_start = range.start;
            s.sequence_end = range.end;
            s.sequence_step = range.step;
        });
    }

    /// Incrémente le compteur de prises et retourne la nouvelle valeur
    pub fn increment_shot_no(&self) -> u32 {
        let new_value = {
            let mut settings = self.inner.lock();
            settings.shot_no += 1;
            settings.shot_no
        };

        self.store.save(&self.get());

        new_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = CaptureSettings::default();
        assert_eq!(settings.product, "ModelA");
        assert_eq!(settings.condition, "Test_A");
        assert_eq!(settings.shot_no, 1);
        assert_eq!(settings.save_mode, SaveMode::All);
        assert_eq!(settings.light_value, 100);
        assert_eq!(settings.sequence_range(), SequenceRange::new(30, 120, 10));
    }

    #[test]
    fn test_save_mode_codes() {
        // Les codes 1/2/3 sont figés par les fichiers config.json existants
        assert_eq!(u8::from(SaveMode::StandardOnly), 1);
        assert_eq!(u8::from(SaveMode::All), 2);
        assert_eq!(u8::from(SaveMode::Cam3Only), 3);
        assert_eq!(SaveMode::try_from(3).unwrap(), SaveMode::Cam3Only);
        assert!(SaveMode::try_from(0).is_err());
    }

    #[test]
    fn test_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("config").join("config.json"));

        let mut settings = CaptureSettings::default();
        settings.product = "ModelB".to_string();
        settings.shot_no = 42;
        settings.save_mode = SaveMode::Cam3Only;

        assert!(store.save(&settings));

        let loaded = store.load();
        assert_eq!(loaded.product, "ModelB");
        assert_eq!(loaded.shot_no, 42);
        assert_eq!(loaded.save_mode, SaveMode::Cam3Only);
    }

    #[test]
    fn test_load_merges_partial_file_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"product": "ModelC", "save_mode": 1}"#).unwrap();

        let loaded = SettingsStore::new(&path).load();
        assert_eq!(loaded.product, "ModelC");
        assert_eq!(loaded.save_mode, SaveMode::StandardOnly);
        // Les champs absents gardent leur valeur par défaut
        assert_eq!(loaded.condition, "Test_A");
        assert_eq!(loaded.shot_no, 1);
    }

    #[test]
    fn test_load_falls_back_on_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "pas du json").unwrap();

        let loaded = SettingsStore::new(&path).load();
        assert_eq!(loaded.product, "ModelA");
    }

    #[test]
    fn test_shared_settings_persist_on_mutation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let shared = SharedSettings::load(SettingsStore::new(&path));

        shared.set_light_value(77);
        assert_eq!(shared.increment_shot_no(), 2);

        // Chaque mutation doit avoir été réécrite sur disque
        let reloaded = SettingsStore::new(&path).load();
        assert_eq!(reloaded.light_value, 77);
        assert_eq!(reloaded.shot_no, 2);
    }

    #[test]
    fn test_json_field_names_stay_compatible() {
        let json = serde_json::to_string(&CaptureSettings::default()).unwrap();
        for field in [
            "product",
            "condition",
            "shot_no",
            "save_path",
            "save_mode",
            "light_value",
            "sequence_start",
            "sequence_end",
            "sequence_step",
        ] {
            assert!(json.contains(field), "champ manquant: {}", field);
        }
        // save_mode doit rester un entier
        assert!(json.contains("\"save_mode\":2") || json.contains("\"save_mode\": 2"));
    }
}
