//! Canal d'éclairage simulé pour les tests
//!
//! Le canal enregistre les trames transmises et peut simuler un canal
//! déconnecté ou systématiquement en échec pour vérifier la dégradation
//! silencieuse de la façade.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{LightChannel, LightingError};

/// Canal d'éclairage simulé
pub struct SimulatedLightChannel {
    /// Nom du canal
    name: String,

    /// État de connexion simulé
    connected: bool,

    /// Si vrai, chaque transmission échoue
    fail_transmit: bool,

    /// Trames transmises, partagées avec le test
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl SimulatedLightChannel {
    /// Crée un canal simulé connecté et fonctionnel
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            connected: true,
            fail_transmit: false,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Crée un canal simulé dont chaque transmission échoue
    pub fn failing(name: &str) -> Self {
        Self {
            fail_transmit: true,
            ..Self::new(name)
        }
    }

    /// Crée un canal simulé déconnecté
    pub fn disconnected(name: &str) -> Self {
        Self {
            connected: false,
            ..Self::new(name)
        }
    }

    /// Poignée partagée sur les trames transmises
    pub fn sent_packets(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.sent)
    }
}

impl LightChannel for SimulatedLightChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn transmit(&mut self, packet: &[u8]) -> Result<(), LightingError> {
        if self.fail_transmit {
            return Err(LightingError::CommunicationError(format!(
                "Échec simulé sur le canal {}",
                self.name
            )));
        }

        self.sent.lock().push(packet.to_vec());

        Ok(())
    }
}
