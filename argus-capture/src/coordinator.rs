//! Coordinateur de séquences et de captures unitaires
//!
//! Machine à états d'un balayage: `Idle → Running → (Completed | Failed |
//! Idle après interruption)`. La validation de la plage est synchrone, avant
//! toute action matérielle. Le balayage lui-même s'exécute sur une tâche
//! tokio dédiée pour ne bloquer ni les interfaces ni le rafraîchissement du
//! cache de trames; la progression est publiée sur un canal d'événements.
//!
//! Politique de concurrence: une seule séquence à la fois, et les actions
//! manuelles (capture unitaire, changement de luminosité) sont rejetées tant
//! qu'un balayage est en cours plutôt que de laisser courir la course.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use argus_frames::{FrameSnapshot, FrameStore, TARGET_CAMERAS};
use argus_lighting::LightBank;
use log::{error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;

use crate::sequence::SequenceRange;
use crate::settings::SharedSettings;
use crate::writer::SnapshotWriter;
use crate::CaptureError;

/// Délai de stabilisation de l'éclairage avant la prise de vue
pub const SETTLING_DELAY: Duration = Duration::from_millis(500);

/// Délai entre deux pas du balayage
pub const INTER_STEP_DELAY: Duration = Duration::from_millis(200);

/// Temporisation d'un balayage
///
/// Injectable pour accélérer les tests; les valeurs par défaut sont celles
/// du banc réel.
#[derive(Debug, Clone, Copy)]
pub struct SequenceTiming {
    /// Stabilisation éclairage/exposition après changement de luminosité
    pub settling: Duration,

    /// Pause entre deux pas
    pub inter_step: Duration,
}

impl Default for SequenceTiming {
    fn default() -> Self {
        Self {
            settling: SETTLING_DELAY,
            inter_step: INTER_STEP_DELAY,
        }
    }
}

/// État de la machine de séquence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SequenceState {
    /// Aucun balayage en cours
    Idle,

    /// Balayage en cours d'exécution
    Running,

    /// Dernier balayage terminé normalement
    Completed,

    /// Dernier balayage interrompu par une erreur
    Failed,
}

/// État observable du coordinateur, interrogeable par les interfaces
#[derive(Debug, Clone, Serialize)]
pub struct SequenceStatus {
    /// État de la machine de séquence
    pub state: SequenceState,

    /// Luminosité du pas en cours, si un balayage est actif
    pub current_value: Option<i32>,
}

impl SequenceStatus {
    fn idle() -> Self {
        Self {
            state: SequenceState::Idle,
            current_value: None,
        }
    }
}

/// Événement publié par la tâche de balayage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceEvent {
    /// Un pas du balayage est terminé
    Progress {
        /// Luminosité appliquée pour ce pas
        value: i32,

        /// Index du pas (0..total)
        index: usize,

        /// Nombre total de pas du balayage
        total: usize,

        /// Nombre de fichiers écrits pour ce pas
        saved: usize,
    },

    /// Balayage terminé normalement
    Completed {
        /// Nouvelle valeur du compteur de prises
        shot_no: u32,
    },

    /// Balayage interrompu sur demande, entre deux pas
    Aborted {
        /// Dernière luminosité appliquée avant l'interruption
        last_value: Option<i32>,
    },

    /// Balayage interrompu par une erreur
    Failed {
        /// Cause de l'échec
        reason: String,
    },
}

/// Coordinateur de capture du banc
///
/// Regroupe le cas général (balayage automatique) et son cas dégénéré à un
/// pas (capture unitaire, sans changement de luminosité ni temporisation).
pub struct CaptureSystem {
    /// Cache de dernières trames alimenté par les caméras
    frames: Arc<FrameStore>,

    /// Façade des bancs de LED
    lights: Arc<Mutex<LightBank>>,

    /// Réglages partagés, persistés à chaque mutation
    settings: SharedSettings,

    /// Écrivain d'instantanés
    writer: SnapshotWriter,

    /// Caméras cibles du banc
    target_cameras: Vec<u32>,

    /// Présence d'au moins une caméra opérationnelle
    cameras_available: Arc<AtomicBool>,

    /// Garde de réentrance: une seule séquence à la fois
    sequence_active: Arc<AtomicBool>,

    /// Demande d'interruption coopérative, relevée entre deux pas
    abort_requested: Arc<AtomicBool>,

    /// État observable du coordinateur
    status: Arc<Mutex<SequenceStatus>>,

    /// Temporisation du balayage
    timing: SequenceTiming,
}

impl CaptureSystem {
    /// Crée un coordinateur pour les caméras cibles standard (1 à 4)
    pub fn new(
        frames: Arc<FrameStore>,
        lights: Arc<Mutex<LightBank>>,
        settings: SharedSettings,
    ) -> Self {
        Self {
            frames,
            lights,
            settings,
            writer: SnapshotWriter::new(),
            target_cameras: TARGET_CAMERAS.to_vec(),
            cameras_available: Arc::new(AtomicBool::new(false)),
            sequence_active: Arc::new(AtomicBool::new(false)),
            abort_requested: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(SequenceStatus::idle())),
            timing: SequenceTiming::default(),
        }
    }

    /// Remplace la temporisation du balayage
    pub fn with_timing(mut self, timing: SequenceTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Remplace la liste des caméras cibles
    pub fn with_target_cameras(mut self, cameras: Vec<u32>) -> Self {
        self.target_cameras = cameras;
        self
    }

    /// Déclare la présence (ou l'absence) de caméras opérationnelles
    pub fn set_cameras_available(&self, available: bool) {
        self.cameras_available.store(available, Ordering::SeqCst);
    }

    /// État observable du coordinateur
    pub fn get_status(&self) -> SequenceStatus {
        self.status.lock().clone()
    }

    /// Indique si un balayage est en cours
    pub fn is_sequence_active(&self) -> bool {
        self.sequence_active.load(Ordering::SeqCst)
    }

    /// Applique une luminosité manuelle
    ///
    /// Rejetée pendant un balayage. La valeur est bornée dans [0, 255] par la
    /// façade puis enregistrée dans les réglages partagés.
    pub fn set_brightness(&self, value: i32) -> Result<u8, CaptureError> {
        if self.is_sequence_active() {
            return Err(CaptureError::SequenceActive);
        }

        let applied = self.lights.lock().set_brightness(value);
        self.settings.set_light_value(applied);

        Ok(applied)
    }

    /// Capture unitaire avec la luminosité courante
    ///
    /// Cas dégénéré du balayage à un seul pas: pas de changement de
    /// luminosité, pas de temporisation. Le compteur de prises n'est
    /// incrémenté que si au moins un fichier a été écrit. Rejetée pendant un
    /// balayage.
    pub fn capture_once(&self) -> Result<usize, CaptureError> {
        if self.is_sequence_active() {
            return Err(CaptureError::SequenceActive);
        }

        let settings = self.settings.get();

        if !self.cameras_available.load(Ordering::SeqCst) {
            warn!("Aucune caméra disponible, capture ignorée");
            return Ok(0);
        }

        let snapshot = self.frames.snapshot(&self.target_cameras);
        let saved = self
            .writer
            .save(&settings, settings.light_value, &snapshot)?;

        if saved > 0 {
            let shot_no = self.settings.increment_shot_no();
            info!(
                "Capture unitaire: {} fichier(s), prochaine prise n°{}",
                saved, shot_no
            );
        }

        Ok(saved)
    }

    /// Démarre un balayage de luminosité
    ///
    /// La plage est validée de façon synchrone avant toute action matérielle:
    /// une plage invalide est rejetée sans toucher l'éclairage ni créer de
    /// fichier. Une seule séquence peut être active à la fois. Retourne le
    /// récepteur d'événements de progression; le canal se ferme à la fin du
    /// balayage.
    pub fn start_sequence(
        &self,
        range: SequenceRange,
    ) -> Result<UnboundedReceiver<SequenceEvent>, CaptureError> {
        range.validate()?;

        // Garde de réentrance: un seul balayage à la fois
        if self
            .sequence_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Démarrage de séquence rejeté: un balayage est déjà actif");
            return Err(CaptureError::SequenceActive);
        }

        self.abort_requested.store(false, Ordering::SeqCst);
        self.settings.set_sequence(range);
        *self.status.lock() = SequenceStatus {
            state: SequenceState::Running,
            current_value: None,
        };

        info!("Démarrage du balayage {}", range);

        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = SweepContext {
            frames: Arc::clone(&self.frames),
            lights: Arc::clone(&self.lights),
            settings: self.settings.clone(),
            writer: self.writer,
            target_cameras: self.target_cameras.clone(),
            cameras_available: Arc::clone(&self.cameras_available),
            sequence_active: Arc::clone(&self.sequence_active),
            abort_requested: Arc::clone(&self.abort_requested),
            status: Arc::clone(&self.status),
            timing: self.timing,
        };

        tokio::spawn(run_sweep(ctx, range, tx));

        Ok(rx)
    }

    /// Demande l'interruption coopérative du balayage en cours
    ///
    /// La demande est relevée entre deux pas: la latence d'interruption est
    /// bornée par la durée d'un pas. Sans balayage actif, l'appel est ignoré.
    pub fn abort_sequence(&self) {
        if self.is_sequence_active() {
            info!("Interruption du balayage demandée");
            self.abort_requested.store(true, Ordering::SeqCst);
        }
    }
}

/// État partagé cloné dans la tâche de balayage
struct SweepContext {
    frames: Arc<FrameStore>,
    lights: Arc<Mutex<LightBank>>,
    settings: SharedSettings,
    writer: SnapshotWriter,
    target_cameras: Vec<u32>,
    cameras_available: Arc<AtomicBool>,
    sequence_active: Arc<AtomicBool>,
    abort_requested: Arc<AtomicBool>,
    status: Arc<Mutex<SequenceStatus>>,
    timing: SequenceTiming,
}

/// Tâche de balayage
///
/// Pour chaque valeur de la plage, dans l'ordre: appliquer la luminosité,
/// attendre la stabilisation, prendre l'instantané, sauvegarder, publier la
/// progression, puis attendre le délai inter-pas. Le compteur de prises est
/// incrémenté une seule fois, à l'épuisement normal de la plage.
async fn run_sweep(
    ctx: SweepContext,
    range: SequenceRange,
    tx: UnboundedSender<SequenceEvent>,
) {
    let total = range.step_count();
    let mut last_value: Option<i32> = None;

    for (index, value) in range.values().enumerate() {
        // Interruption coopérative, relevée entre deux pas
        if ctx.abort_requested.load(Ordering::SeqCst) {
            warn!("Balayage interrompu après {} pas", index);
            *ctx.status.lock() = SequenceStatus::idle();
            let _ = tx.send(SequenceEvent::Aborted { last_value });
            ctx.sequence_active.store(false, Ordering::SeqCst);
            return;
        }

        // (a) appliquer la luminosité, puis l'enregistrer dans les réglages
        let applied = ctx.lights.lock().set_brightness(value);
        ctx.settings.set_light_value(applied);
        ctx.status.lock().current_value = Some(value);
        info!("--- Luminosité {} ({}/{}) ---", value, index + 1, total);

        // (b) stabilisation éclairage/exposition
        sleep(ctx.timing.settling).await;

        // (c) instantané cohérent puis sauvegarde
        let snapshot = if ctx.cameras_available.load(Ordering::SeqCst) {
            ctx.frames.snapshot(&ctx.target_cameras)
        } else {
            FrameSnapshot::new()
        };

        let settings = ctx.settings.get();
        match ctx.writer.save(&settings, applied, &snapshot) {
            Ok(saved) => {
                let _ = tx.send(SequenceEvent::Progress {
                    value,
                    index,
                    total,
                    saved,
                });
            }
            Err(e) => {
                error!("Échec du balayage au pas {}: {}", value, e);
                *ctx.status.lock() = SequenceStatus {
                    state: SequenceState::Failed,
                    current_value: Some(value),
                };
                let _ = tx.send(SequenceEvent::Failed {
                    reason: e.to_string(),
                });
                ctx.sequence_active.store(false, Ordering::SeqCst);
                return;
            }
        }

        last_value = Some(value);

        // (d) pause inter-pas
        sleep(ctx.timing.inter_step).await;
    }

    // Épuisement normal: une seule incrémentation pour tout le balayage
    let shot_no = ctx.settings.increment_shot_no();
    *ctx.status.lock() = SequenceStatus {
        state: SequenceState::Completed,
        current_value: None,
    };
    info!(
        "Balayage terminé ({} pas), prochaine prise n°{}",
        total, shot_no
    );
    let _ = tx.send(SequenceEvent::Completed { shot_no });
    ctx.sequence_active.store(false, Ordering::SeqCst);
}
