use serde::Deserialize;

use crate::codec::{OscArg, OscMessage, OscPacket};

/// Linear remap of one numeric argument.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MapValue {
    /// Position of the argument in the message.
    pub index: usize,
    pub input_min: f64,
    pub input_max: f64,
    pub output_min: f64,
    pub output_max: f64,
    #[serde(default)]
    pub clamp: bool,
}

impl MapValue {
    pub fn map(&self, value: f64) -> f64 {
        let span = self.input_max - self.input_min;
        if span == 0.0 {
            return self.output_min;
        }
        let t = (value - self.input_min) / span;
        let t = if self.clamp { t.clamp(0.0, 1.0) } else { t };
        self.output_min + t * (self.output_max - self.output_min)
    }

    fn apply(&self, args: &mut [OscArg]) {
        let Some(arg) = args.get_mut(self.index) else {
            return;
        };
        match arg {
            OscArg::Int(v) => *v = self.map(*v as f64).round() as i32,
            OscArg::Float(v) => *v = self.map(*v as f64) as f32,
            _ => {}
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MapMessage {
    pub address: String,
    #[serde(default)]
    pub values: Vec<MapValue>,
}

/// Rules applied to outgoing messages, keyed by exact address.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct MapBundle {
    #[serde(default)]
    pub messages: Vec<MapMessage>,
}

impl MapBundle {
    pub fn apply(&self, message: &mut OscMessage) {
        for rule in self.messages.iter().filter(|m| m.address == message.address) {
            for value in &rule.values {
                value.apply(&mut message.args);
            }
        }
    }

    /// Applies to every message, including those nested in bundles.
    pub fn apply_packet(&self, packet: &mut OscPacket) {
        match packet {
            OscPacket::Message(message) => self.apply(message),
            OscPacket::Bundle(bundle) => {
                for element in &mut bundle.elements {
                    self.apply_packet(element);
                }
            }
        }
    }
}
