//! Admission checks for submitted and stale messages.

use std::sync::Arc;

use ledgerline_types::{Envelope, HeaderType};

use crate::resources::{ConfigResources, ConsenterConfigUpdate};
use crate::ProcessError;

/// Validates messages against the configuration currently in effect.
///
/// Called at submission, and again at consumption for any message whose
/// recorded sequence has since been superseded.
pub trait MessageProcessor: Send + Sync {
    /// Check a normal message, returning the sequence it was checked at.
    fn process_normal_msg(&self, envelope: &Envelope) -> Result<u64, ProcessError>;

    /// Check a configuration message, returning the configuration envelope
    /// to order and the sequence it was checked at.
    fn process_config_msg(&self, envelope: &Envelope) -> Result<(Envelope, u64), ProcessError>;
}

/// The standard checks: channel, payload presence, size, and for
/// configuration messages a well-formed update.
pub struct StandardMessageProcessor {
    resources: Arc<dyn ConfigResources>,
}

impl StandardMessageProcessor {
    pub fn new(resources: Arc<dyn ConfigResources>) -> Self {
        Self { resources }
    }

    fn check_common(&self, envelope: &Envelope) -> Result<(), ProcessError> {
        let channel = self.resources.channel_id();
        if envelope.header.channel_id != channel {
            return Err(ProcessError::WrongChannel {
                expected: channel.to_string(),
                actual: envelope.header.channel_id.clone(),
            });
        }
        if envelope.payload.is_empty() {
            return Err(ProcessError::EmptyPayload);
        }
        let max = self.resources.batch_size().absolute_max_bytes;
        let size = envelope.encoded_len();
        if size > max {
            return Err(ProcessError::TooLarge { size, max });
        }
        Ok(())
    }
}

impl MessageProcessor for StandardMessageProcessor {
    fn process_normal_msg(&self, envelope: &Envelope) -> Result<u64, ProcessError> {
        if envelope.is_config() {
            return Err(ProcessError::NotNormal(envelope.header_type()));
        }
        self.check_common(envelope)?;
        Ok(self.resources.sequence())
    }

    fn process_config_msg(&self, envelope: &Envelope) -> Result<(Envelope, u64), ProcessError> {
        if !envelope.is_config() {
            return Err(ProcessError::NotConfig(envelope.header_type()));
        }
        self.check_common(envelope)?;
        ConsenterConfigUpdate::decode(&envelope.payload)?;

        // An update request is ordered as the configuration it produces.
        let config = if envelope.header_type() == HeaderType::ConfigUpdate {
            let mut config = envelope.clone();
            config.header.header_type = HeaderType::Config;
            config
        } else {
            envelope.clone()
        };
        Ok((config, self.resources.sequence()))
    }
}
