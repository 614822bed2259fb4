//! Per-connection state and inbound frame correlation.
//!
//! [`Session::handle_frame`] is the synchronous core of the read loop:
//! it completes the head-of-queue request, routes status events and
//! pushes the resulting property updates through the power gate.
//! Nothing in here touches the socket.

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::codec::Frame;
use crate::error::EscvpError;
use crate::event;
use crate::listener::PropertyUpdate;
use crate::property::{self, PropertyCodec, PropertyValue};
use crate::state::connection::ConnectionPhase;
use crate::state::power::{PowerGate, PowerUpdate};
use crate::state::queue::RequestQueue;

#[derive(Debug, Default)]
pub struct Session {
    pub phase: ConnectionPhase,
    /// Bumped each time a session opens; stale read loops compare it.
    pub generation: u64,
    pub queue: RequestQueue,
    pub power: PowerGate,
    pub read_task: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tear down the logical session: mark it closed, reject every
    /// queued request and forget power state. Returns `true` if the
    /// session was open.
    pub fn close(&mut self) -> bool {
        let was_open = self.phase.disconnect();
        let rejected = self.queue.reject_all();
        if rejected > 0 {
            debug!(rejected, "rejected queued requests");
        }
        self.power.reset();
        was_open
    }

    /// Process one inbound frame and return the property updates it
    /// produced, in order.
    pub fn handle_frame(&mut self, frame: Frame, codec: &PropertyCodec) -> Vec<PropertyUpdate> {
        let mut updates = Vec::new();
        match frame {
            Frame::Ack => self.handle_ack(&mut updates),
            Frame::Error => self.handle_error(),
            Frame::Event(value) => self.handle_event(&value, &mut updates),
            Frame::Property { key, value } => {
                self.handle_property(codec, key, &value, &mut updates)
            }
            Frame::Unhandled(body) => warn!(body, "unhandled response"),
        }
        updates
    }

    fn handle_ack(&mut self, updates: &mut Vec<PropertyUpdate>) {
        let Some(request) = self.queue.dequeue_head() else {
            return;
        };
        debug!(command = %request.command, "received ack");
        if let Some(transition) = self.power.on_ack(&request.command) {
            self.update(property::POWER, PropertyValue::Power(transition), updates);
        }
        request.acknowledge();
    }

    fn handle_error(&mut self) {
        let Some(request) = self.queue.dequeue_head() else {
            return;
        };
        warn!(command = %request.command, "received error response");
        request.completion.reject(EscvpError::DeviceError {
            command: request.command,
        });
    }

    fn handle_property(
        &mut self,
        codec: &PropertyCodec,
        key: String,
        raw: &str,
        updates: &mut Vec<PropertyUpdate>,
    ) {
        debug!(property = %key, raw, "received property");
        let request = self.queue.dequeue_head();
        let decoded = codec.decode(&key, raw);
        if let Some(anomaly) = &decoded.anomaly {
            error!(property = %key, raw, %anomaly, "could not decode property");
        }
        if let Some(request) = request {
            request.completion.resolve(decoded.value.clone());
        }
        self.update(&key, decoded.value, updates);
    }

    fn handle_event(&mut self, value: &str, updates: &mut Vec<PropertyUpdate>) {
        debug!(value, "received status event");
        let event = match event::decode(value) {
            Ok(event) => event,
            Err(e) => {
                warn!(value, error = %e, "ignoring malformed status event");
                return;
            }
        };
        if let Some(alarms) = event.alarm_text() {
            self.power.latch_error();
            self.update(property::ERROR, PropertyValue::Text(alarms), updates);
        }
        if let Some(power) = event.power {
            self.update(property::POWER, PropertyValue::Power(power), updates);
        }
    }

    fn update(&mut self, property: &str, value: PropertyValue, updates: &mut Vec<PropertyUpdate>) {
        if property == property::POWER {
            match self.power.observe(&value) {
                PowerUpdate::Discarded => return,
                PowerUpdate::Applied { cleared_error } => {
                    updates.push(PropertyUpdate::new(property, value));
                    if cleared_error {
                        updates.push(PropertyUpdate::new(property::ERROR, PropertyValue::Empty));
                    }
                    return;
                }
            }
        }
        updates.push(PropertyUpdate::new(property, value));
    }
}
