//! Canal série vers un contrôleur de LED
//!
//! Les contrôleurs du banc dialoguent en 9600 bauds, 8 bits, sans parité, un
//! bit d'arrêt. La communication est unidirectionnelle: la trame est écrite
//! sur le port, aucune réponse n'est lue.

use std::io::Write;
use std::time::Duration;

use log::{debug, error};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::{LightChannel, LightingError};

/// Canal d'éclairage sur port série
pub struct SerialLightChannel {
    /// Nom du port (COM2, /dev/ttyUSB0, ...)
    port_name: String,

    /// Port série ouvert
    port: Box<dyn SerialPort>,
}

impl SerialLightChannel {
    /// Ouvre le port série spécifié
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, LightingError> {
        debug!("Ouverture du port série {} à {} bauds", port_name, baud_rate);

        let port = serialport::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| {
                LightingError::InitError(format!(
                    "Erreur lors de l'ouverture du port série {}: {}",
                    port_name, e
                ))
            })?;

        Ok(Self {
            port_name: port_name.to_string(),
            port,
        })
    }
}

impl LightChannel for SerialLightChannel {
    fn name(&self) -> &str {
        &self.port_name
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn transmit(&mut self, packet: &[u8]) -> Result<(), LightingError> {
        self.port.write_all(packet).map_err(|e| {
            error!("[{}] erreur d'écriture: {}", self.port_name, e);
            LightingError::CommunicationError(format!(
                "Erreur d'écriture sur {}: {}",
                self.port_name, e
            ))
        })?;

        debug!(
            "[{}] trame transmise ({} octets)",
            self.port_name,
            packet.len()
        );

        Ok(())
    }
}
