//! # Pilotage des bancs de LED du banc de capture Argus
//!
//! Ce module construit la commande de luminosité des contrôleurs de LED et la
//! diffuse sur l'ensemble des canaux série connectés. La transmission est en
//! mode "fire and forget": aucune réponse n'est attendue, aucun réessai n'est
//! tenté, et la défaillance d'un canal ne doit jamais interrompre une
//! séquence de capture — les bancs sont redondants.
//!
//! ## Trame de commande
//!
//! Une commande adresse les quatre sorties d'un contrôleur avec la même
//! valeur, encodée en ASCII sur trois chiffres:
//!
//! ```text
//! STX 'A' ddd ',' ddd ',' ddd ',' ddd ETX
//! ```
//!
//! soit par exemple pour la valeur 100: `02 41 31 30 30 2C 31 30 30 2C 31 30
//! 30 2C 31 30 30 03` en hexadécimal.

use log::{info, warn};
use thiserror::Error;

pub mod channels;

// Re-exports
pub use channels::serial::SerialLightChannel;
pub use channels::simulator::SimulatedLightChannel;

/// Ports série des contrôleurs de LED du banc
pub const DEFAULT_LIGHT_PORTS: [&str; 4] = ["COM2", "COM8", "COM9", "COM10"];

/// Vitesse de communication des contrôleurs
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Erreur liée au système d'éclairage
#[derive(Error, Debug)]
pub enum LightingError {
    #[error("Erreur d'initialisation du contrôleur d'éclairage: {0}")]
    InitError(String),

    #[error("Erreur de communication avec le contrôleur: {0}")]
    CommunicationError(String),

    #[error("Canal d'éclairage déconnecté: {0}")]
    Disconnected(String),
}

/// Construit la trame de luminosité adressée aux quatre sorties
///
/// Le format est figé par le matériel: STX, 'A', quatre champs ASCII de trois
/// chiffres séparés par des virgules, ETX.
pub fn build_brightness_packet(value: u8) -> Vec<u8> {
    let field = format!("{:03}", value);
    let field = field.as_bytes();

    let mut packet = Vec::with_capacity(18);
    packet.push(0x02); // STX
    packet.push(b'A');
    for _ in 0..3 {
        packet.extend_from_slice(field);
        packet.push(b',');
    }
    packet.extend_from_slice(field);
    packet.push(0x03); // ETX

    packet
}

/// Borne une valeur de luminosité dans [0, 255]
pub fn clamp_brightness(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Canal de transmission vers un contrôleur de LED
pub trait LightChannel: Send {
    /// Nom du canal (port série, identifiant de simulation, ...)
    fn name(&self) -> &str;

    /// Indique si le canal est actuellement connecté
    fn is_connected(&self) -> bool;

    /// Transmet une trame brute au contrôleur
    fn transmit(&mut self, packet: &[u8]) -> Result<(), LightingError>;
}

/// Façade de pilotage de l'ensemble des bancs de LED
///
/// La façade est sans état: elle ne retient pas la dernière valeur appliquée,
/// c'est le propriétaire des réglages partagés qui enregistre `light_value`
/// à partir de la valeur bornée retournée.
pub struct LightBank {
    /// Canaux connectés
    channels: Vec<Box<dyn LightChannel>>,
}

impl LightBank {
    /// Crée une façade à partir de canaux déjà ouverts
    pub fn from_channels(channels: Vec<Box<dyn LightChannel>>) -> Self {
        Self { channels }
    }

    /// Ouvre les ports série spécifiés, en conservant ceux qui répondent
    ///
    /// L'ouverture est "best effort": un port absent est journalisé et
    /// ignoré, le banc fonctionne avec les canaux restants.
    pub fn connect(ports: &[&str], baud_rate: u32) -> Self {
        info!("=== Connexion des contrôleurs d'éclairage ===");

        let mut channels: Vec<Box<dyn LightChannel>> = Vec::new();
        for port in ports {
            match SerialLightChannel::open(port, baud_rate) {
                Ok(channel) => {
                    info!("[{}] connexion réussie", port);
                    channels.push(Box::new(channel));
                }
                Err(e) => {
                    warn!("[{}] connexion échouée: {}", port, e);
                }
            }
        }

        info!(
            "{} contrôleur(s) d'éclairage connecté(s) sur {}",
            channels.len(),
            ports.len()
        );

        Self { channels }
    }

    /// Applique une valeur de luminosité à tous les canaux connectés
    ///
    /// La valeur est bornée dans [0, 255] puis diffusée en une seule trame
    /// par canal. Les échecs de transmission sont journalisés et avalés: la
    /// défaillance d'un banc redondant ne doit pas interrompre une séquence.
    /// Retourne la valeur effectivement appliquée.
    pub fn set_brightness(&mut self, value: i32) -> u8 {
        let clamped = clamp_brightness(value);
        let packet = build_brightness_packet(clamped);

        for channel in &mut self.channels {
            if !channel.is_connected() {
                continue;
            }
            if let Err(e) = channel.transmit(&packet) {
                warn!("[{}] erreur de transmission: {}", channel.name(), e);
            }
        }

        clamped
    }

    /// Nombre de canaux détenus par la façade
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Nombre de canaux actuellement connectés
    pub fn connected_count(&self) -> usize {
        self.channels.iter().filter(|c| c.is_connected()).count()
    }
}
